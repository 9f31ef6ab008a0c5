//! Scripted network and platform doubles for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use swcache_client::Network;
use swcache_core::{CachedResponse, Error, FetchRequest};

use crate::signal::{ClientInfo, Notification, Platform};

/// Network that answers from a URL → response table and fails for anything else.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, CachedResponse>>,
    offline: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: CachedResponse) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    /// Hold every response back for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.offline.lock().unwrap() {
            return Err(Error::Network("offline".into()));
        }
        self.routes
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| Error::Network(format!("no route to {}", request.url)))
    }
}

/// Platform that records every request made of it.
#[derive(Default)]
pub struct RecordingPlatform {
    pub shown: Mutex<Vec<Notification>>,
    pub closed: Mutex<Vec<Notification>>,
    pub focused: Mutex<Vec<u64>>,
    pub opened: Mutex<Vec<String>>,
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn show_notification(&self, notification: &Notification) -> Result<(), Error> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn close_notification(&self, notification: &Notification) -> Result<(), Error> {
        self.closed.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn focus_client(&self, client: &ClientInfo) -> Result<(), Error> {
        self.focused.lock().unwrap().push(client.id);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), Error> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
