//! Registry of open page instances.
//!
//! Each page holds the receiving end of an unbounded channel; messages to a
//! single page arrive in the order they were posted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};

/// Identifier of an open page.
pub type ClientId = u64;

/// Messages the worker posts to pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// The page should re-synchronize its application data.
    BackgroundSync,
    /// A new generation took control of the page.
    ControllerChange { version: String },
}

/// Snapshot of an open page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: String,
    /// Generation currently controlling the page, if any.
    pub controller: Option<String>,
}

struct ClientSlot {
    info: ClientInfo,
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

/// Shared set of open pages.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<ClientId, ClientSlot>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page and return its handle plus the channel it reads messages from.
    pub async fn register(
        &self, url: impl Into<String>, controller: Option<String>,
    ) -> (ClientInfo, mpsc::UnboundedReceiver<WorkerMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let info = ClientInfo { id, url: url.into(), controller };
        self.clients
            .write()
            .await
            .insert(id, ClientSlot { info: info.clone(), tx });
        tracing::debug!(client = id, url = %info.url, "page registered");
        (info, rx)
    }

    /// Remove a page. Returns false if it was not registered.
    pub async fn unregister(&self, id: ClientId) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }

    pub async fn get(&self, id: ClientId) -> Option<ClientInfo> {
        self.clients.read().await.get(&id).map(|slot| slot.info.clone())
    }

    /// All open pages, ordered by id.
    pub async fn match_all(&self) -> Vec<ClientInfo> {
        let mut all: Vec<ClientInfo> = self
            .clients
            .read()
            .await
            .values()
            .map(|slot| slot.info.clone())
            .collect();
        all.sort_by_key(|c| c.id);
        all
    }

    /// First open page showing exactly `url`.
    pub async fn find_by_url(&self, url: &str) -> Option<ClientInfo> {
        self.match_all().await.into_iter().find(|c| c.url == url)
    }

    /// Post to one page. Returns false if the page is gone.
    pub async fn post(&self, id: ClientId, message: WorkerMessage) -> bool {
        let delivered = match self.clients.read().await.get(&id) {
            Some(slot) => slot.tx.send(message).is_ok(),
            None => return false,
        };
        if !delivered {
            self.unregister(id).await;
        }
        delivered
    }

    /// Post to every open page; pages whose receiver was dropped are pruned.
    ///
    /// Returns the number of pages reached.
    pub async fn post_all(&self, message: &WorkerMessage) -> usize {
        let mut clients = self.clients.write().await;
        clients.retain(|id, slot| {
            let alive = slot.tx.send(message.clone()).is_ok();
            if !alive {
                tracing::debug!(client = id, "pruning closed page");
            }
            alive
        });
        clients.len()
    }

    /// Make `version` the controller of every open page.
    ///
    /// Pages that change controller are told so. Returns the number of pages claimed.
    pub async fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.write().await;
        for slot in clients.values_mut() {
            if slot.info.controller.as_deref() != Some(version) {
                slot.info.controller = Some(version.to_string());
                let _ = slot.tx.send(WorkerMessage::ControllerChange { version: version.to_string() });
            }
        }
        clients.len()
    }

    /// Whether any open page is still controlled by a generation other than `version`.
    pub async fn controlled_by_other(&self, version: &str) -> bool {
        self.clients
            .read()
            .await
            .values()
            .any(|slot| slot.info.controller.as_deref().is_some_and(|c| c != version))
    }
}
