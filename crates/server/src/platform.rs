//! Headless stand-in for the browser's notification and window services.
//!
//! There is no display to draw on, so notifications and window requests only
//! show up in the log.

use async_trait::async_trait;
use swcache_core::Error;
use swcache_worker::{ClientInfo, Notification, Platform};

#[derive(Debug, Default, Clone)]
pub struct LoggingPlatform;

#[async_trait]
impl Platform for LoggingPlatform {
    async fn show_notification(&self, notification: &Notification) -> Result<(), Error> {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            url = %notification.data.url,
            "notification shown"
        );
        Ok(())
    }

    async fn close_notification(&self, notification: &Notification) -> Result<(), Error> {
        tracing::info!(title = %notification.title, "notification closed");
        Ok(())
    }

    async fn focus_client(&self, client: &ClientInfo) -> Result<(), Error> {
        tracing::info!(client = client.id, url = %client.url, "focusing page");
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), Error> {
        tracing::info!(%url, "opening page");
        Ok(())
    }
}
