//! Background signal relay.
//!
//! Stateless fan-out from background events to pages and the platform:
//!
//! - `sync` with the recognized tag posts `BACKGROUND_SYNC` to every open page.
//! - `push` becomes a system notification.
//! - `notificationclick` focuses or opens the page the notification points at.
//! - `message` answers `GET_VERSION` and forwards `SKIP_WAITING` to the lifecycle.

pub mod clients;
pub mod message;
pub mod push;

use std::sync::Arc;

use async_trait::async_trait;
use swcache_core::Error;
use swcache_core::config::NotificationConfig;

pub use clients::{ClientId, ClientInfo, ClientRegistry, WorkerMessage};
pub use message::{ControlMessage, MessageOutcome, ReplyPort, VersionReply};
pub use push::{Notification, NotificationData, PushPayload};

/// Host services the relay cannot perform itself.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Display a system notification.
    async fn show_notification(&self, notification: &Notification) -> Result<(), Error>;

    /// Dismiss a notification the user interacted with.
    async fn close_notification(&self, notification: &Notification) -> Result<(), Error>;

    /// Bring an open page to the foreground.
    async fn focus_client(&self, client: &ClientInfo) -> Result<(), Error>;

    /// Open a new page at `url`.
    async fn open_window(&self, url: &str) -> Result<(), Error>;
}

/// Result of a notification click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowAction {
    Focused(ClientId),
    Opened(String),
}

/// Delivers background signals to pages and the platform.
#[derive(Clone)]
pub struct SignalRelay {
    clients: ClientRegistry,
    platform: Arc<dyn Platform>,
    sync_tag: String,
    notification: NotificationConfig,
    version: String,
}

impl SignalRelay {
    pub fn new(
        clients: ClientRegistry, platform: Arc<dyn Platform>, sync_tag: impl Into<String>,
        notification: NotificationConfig, version: impl Into<String>,
    ) -> Self {
        Self { clients, platform, sync_tag: sync_tag.into(), notification, version: version.into() }
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Wake every open page for a recognized sync tag.
    ///
    /// Returns how many pages were notified; unrecognized tags reach none.
    pub async fn on_sync(&self, tag: &str) -> usize {
        if tag != self.sync_tag {
            tracing::debug!(%tag, "ignoring unrecognized sync tag");
            return 0;
        }
        let delivered = self.clients.post_all(&WorkerMessage::BackgroundSync).await;
        tracing::info!(%tag, delivered, "background sync relayed");
        delivered
    }

    /// Show a notification for a push payload.
    ///
    /// Missing or unparseable payloads are dropped and yield `None`.
    pub async fn on_push(&self, data: Option<&[u8]>) -> Result<Option<Notification>, Error> {
        let Some(notification) = Notification::from_push(data, &self.notification) else {
            return Ok(None);
        };
        self.platform.show_notification(&notification).await?;
        Ok(Some(notification))
    }

    /// Close the notification, then focus a page already showing its URL or open one.
    pub async fn on_notification_click(&self, notification: &Notification) -> Result<WindowAction, Error> {
        self.platform.close_notification(notification).await?;
        let url = if notification.data.url.is_empty() { "/" } else { notification.data.url.as_str() };

        if let Some(client) = self.clients.find_by_url(url).await {
            self.platform.focus_client(&client).await?;
            return Ok(WindowAction::Focused(client.id));
        }

        self.platform.open_window(url).await?;
        Ok(WindowAction::Opened(url.to_string()))
    }

    /// Handle a page message, replying on `reply` where one is expected.
    pub fn on_message(&self, data: &serde_json::Value, reply: Option<ReplyPort>) -> MessageOutcome {
        match ControlMessage::parse(data) {
            Some(ControlMessage::SkipWaiting) => MessageOutcome::SkipWaiting,
            Some(ControlMessage::GetVersion) => {
                let answer = VersionReply { version: self.version.clone() };
                match reply {
                    Some(port) => {
                        if port.send(answer.clone()).is_err() {
                            tracing::debug!("version requester went away");
                        }
                        MessageOutcome::Replied(answer)
                    }
                    None => {
                        tracing::warn!("GET_VERSION without a reply port");
                        MessageOutcome::Ignored
                    }
                }
            }
            None => {
                tracing::debug!(message = %data, "ignoring unknown message");
                MessageOutcome::Ignored
            }
        }
    }
}
