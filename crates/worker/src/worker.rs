//! Event dispatch for one worker generation.
//!
//! Each external event name maps to exactly one handler. Work that must
//! outlive the call delivering it goes through [`Worker::wait_until`], and
//! [`Worker::shutdown`] waits for all of it before the host tears down.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use swcache_client::Network;
use swcache_core::config::NotificationConfig;
use swcache_core::{AppConfig, CacheDb, CachedResponse, ConfigError, Error, FetchRequest};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use url::Url;

use crate::lifecycle::{ActivateReport, InstallReport, Lifecycle, LifecycleState};
use crate::router::{Route, RouteRules};
use crate::signal::{ClientRegistry, MessageOutcome, Notification, Platform, ReplyPort, SignalRelay, WindowAction};
use crate::strategy::StrategyExecutor;

/// Construction-time settings for a worker generation.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Generation id; also the cache name.
    pub version: String,
    pub manifest: Vec<Url>,
    pub offline_url: Url,
    pub rules: RouteRules,
    pub sync_tag: String,
    pub skip_waiting_on_install: bool,
    pub notification: NotificationConfig,
}

impl TryFrom<&AppConfig> for WorkerConfig {
    type Error = ConfigError;

    fn try_from(config: &AppConfig) -> Result<Self, Self::Error> {
        let manifest = config
            .precache
            .iter()
            .map(|entry| config.resolve(entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: config.version.clone(),
            manifest,
            offline_url: config.resolve(&config.offline_url)?,
            rules: RouteRules::from(config),
            sync_tag: config.sync_tag.clone(),
            skip_waiting_on_install: config.skip_waiting_on_install,
            notification: config.notification.clone(),
        })
    }
}

/// Names of the events a worker handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Install,
    Activate,
    Fetch,
    Sync,
    Push,
    NotificationClick,
    Message,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Install => "install",
            EventName::Activate => "activate",
            EventName::Fetch => "fetch",
            EventName::Sync => "sync",
            EventName::Push => "push",
            EventName::NotificationClick => "notificationclick",
            EventName::Message => "message",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(EventName::Install),
            "activate" => Ok(EventName::Activate),
            "fetch" => Ok(EventName::Fetch),
            "sync" => Ok(EventName::Sync),
            "push" => Ok(EventName::Push),
            "notificationclick" => Ok(EventName::NotificationClick),
            "message" => Ok(EventName::Message),
            other => Err(Error::InvalidInput(format!("unknown event: {other}"))),
        }
    }
}

/// An event delivered to the worker.
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(FetchRequest),
    Sync { tag: String },
    Push { data: Option<Bytes> },
    NotificationClick(Notification),
    Message { data: serde_json::Value, reply: Option<ReplyPort> },
}

impl WorkerEvent {
    pub fn name(&self) -> EventName {
        match self {
            WorkerEvent::Install => EventName::Install,
            WorkerEvent::Activate => EventName::Activate,
            WorkerEvent::Fetch(_) => EventName::Fetch,
            WorkerEvent::Sync { .. } => EventName::Sync,
            WorkerEvent::Push { .. } => EventName::Push,
            WorkerEvent::NotificationClick(_) => EventName::NotificationClick,
            WorkerEvent::Message { .. } => EventName::Message,
        }
    }
}

/// What handling an event produced.
#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    /// The worker answered the request.
    Respond(CachedResponse),
    /// The request is not intercepted; the host sends it to the network as-is.
    Passthrough,
    Synced(usize),
    Notified(Option<Notification>),
    Window(WindowAction),
    Message(MessageOutcome),
}

/// One worker generation: lifecycle, routing, strategies and signals.
pub struct Worker {
    store: CacheDb,
    network: Arc<dyn Network>,
    lifecycle: Lifecycle,
    rules: RouteRules,
    executor: StrategyExecutor,
    relay: SignalRelay,
    tasks: TaskTracker,
}

impl Worker {
    pub fn new(
        config: WorkerConfig, store: CacheDb, network: Arc<dyn Network>, platform: Arc<dyn Platform>,
        clients: ClientRegistry,
    ) -> Self {
        let executor = StrategyExecutor::new(store.clone(), config.version.clone(), config.offline_url, network.clone());
        let relay = SignalRelay::new(clients, platform, config.sync_tag, config.notification, config.version.clone());
        let lifecycle = Lifecycle::new(config.version, config.manifest, config.skip_waiting_on_install);

        Self { store, network, lifecycle, rules: config.rules, executor, relay, tasks: TaskTracker::new() }
    }

    pub fn version(&self) -> &str {
        self.lifecycle.version()
    }

    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.state().await
    }

    pub fn clients(&self) -> &ClientRegistry {
        self.relay.clients()
    }

    /// The network used for intercepted and bypassed requests alike.
    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// Route a single event to its handler.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        tracing::debug!(event = %event.name(), "dispatching");
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => Ok(match self.handle_fetch(&request).await {
                Some(response) => EventOutcome::Respond(response),
                None => EventOutcome::Passthrough,
            }),
            WorkerEvent::Sync { tag } => Ok(EventOutcome::Synced(self.relay.on_sync(&tag).await)),
            WorkerEvent::Push { data } => self.relay.on_push(data.as_deref()).await.map(EventOutcome::Notified),
            WorkerEvent::NotificationClick(notification) => {
                self.relay.on_notification_click(&notification).await.map(EventOutcome::Window)
            }
            WorkerEvent::Message { data, reply } => Ok(EventOutcome::Message(self.handle_message(&data, reply).await?)),
        }
    }

    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.lifecycle.install(&self.store, self.network.as_ref()).await
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.lifecycle.activate(&self.store, self.clients()).await
    }

    /// Install, then activate unless pages of an older generation are still open
    /// and nobody asked to skip waiting.
    pub async fn start(&self) -> Result<(InstallReport, Option<ActivateReport>), Error> {
        let installed = self.install().await?;
        let activated = self.activate_if_ready().await?;
        Ok((installed, activated))
    }

    /// Activate a waiting generation once nothing holds it back.
    pub async fn activate_if_ready(&self) -> Result<Option<ActivateReport>, Error> {
        if self.lifecycle.state().await != LifecycleState::Installed {
            return Ok(None);
        }
        let blocked = self.clients().controlled_by_other(self.version()).await;
        if blocked && !self.lifecycle.skip_waiting_requested() {
            tracing::info!(version = %self.version(), "waiting for older pages to close");
            return Ok(None);
        }
        self.activate().await.map(Some)
    }

    /// Serve an intercepted request.
    ///
    /// `None` means the request is not intercepted: the worker is not active
    /// yet, or the route is a bypass.
    ///
    /// The strategy runs as an extended task, so a caller that goes away
    /// mid-fetch does not cancel the network fetch or the cache write.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Option<CachedResponse> {
        if !self.lifecycle.is_active().await {
            return None;
        }
        let route = self.rules.classify(request);
        tracing::debug!(%request, ?route, "classified");
        if route == Route::Bypass {
            return None;
        }

        let executor = self.executor.clone();
        let owned = request.clone();
        let task = self.wait_until(async move { executor.execute(route, &owned).await });
        match task.await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%request, error = %e, "fetch task failed");
                Some(CachedResponse::service_unavailable("Offline"))
            }
        }
    }

    /// The route a request would take, regardless of lifecycle state.
    pub fn classify(&self, request: &FetchRequest) -> Route {
        self.rules.classify(request)
    }

    async fn handle_message(&self, data: &serde_json::Value, reply: Option<ReplyPort>) -> Result<MessageOutcome, Error> {
        let outcome = self.relay.on_message(data, reply);
        if outcome == MessageOutcome::SkipWaiting {
            self.lifecycle.skip_waiting();
            self.activate_if_ready().await?;
        }
        Ok(outcome)
    }

    /// Keep the worker alive until `task` finishes.
    pub fn wait_until<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tasks.spawn(task)
    }

    /// Number of extended tasks still running.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Stop accepting extensions and wait for every registered task.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        tracing::info!(version = %self.version(), "worker drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{VersionReply, WorkerMessage};
    use crate::testing::{RecordingPlatform, ScriptedNetwork};
    use serde_json::json;
    use swcache_core::ResponseKind;
    use tokio::sync::oneshot;

    const ORIGIN: &str = "http://localhost:8080/";

    fn config() -> AppConfig {
        AppConfig { app_origin: ORIGIN.into(), ..Default::default() }
    }

    fn network_for(config: &AppConfig) -> Arc<ScriptedNetwork> {
        let network = Arc::new(ScriptedNetwork::new());
        for entry in &config.precache {
            let url = config.resolve(entry).unwrap();
            network.respond(
                url.as_str(),
                CachedResponse::new(200, format!("precached {url}")).with_kind(ResponseKind::Basic),
            );
        }
        network
    }

    async fn worker(network: Arc<ScriptedNetwork>) -> (CacheDb, Worker) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = WorkerConfig::try_from(&config()).unwrap();
        let worker =
            Worker::new(config, db.clone(), network, Arc::new(RecordingPlatform::default()), ClientRegistry::new());
        (db, worker)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_event_names_round_trip_known_names() {
        for name in ["install", "activate", "fetch", "sync", "push", "notificationclick", "message"] {
            assert_eq!(name.parse::<EventName>().unwrap().as_str(), name);
        }
        assert!("beforeinstallprompt".parse::<EventName>().is_err());
    }

    #[test]
    fn test_worker_config_resolves_manifest() {
        let config = WorkerConfig::try_from(&config()).unwrap();
        assert_eq!(config.version, "rangeen-notes-v2");
        assert_eq!(config.manifest[1].as_str(), "http://localhost:8080/index.html");
        assert_eq!(config.offline_url.as_str(), "http://localhost:8080/index.html");
    }

    #[tokio::test]
    async fn test_fetch_passes_through_until_active() {
        let network = network_for(&config());
        let (_db, worker) = worker(network).await;
        let request = FetchRequest::get(url("http://localhost:8080/index.html"));

        let outcome = worker.dispatch(WorkerEvent::Fetch(request.clone())).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Passthrough));

        worker.dispatch(WorkerEvent::Install).await.unwrap();
        assert!(worker.handle_fetch(&request).await.is_none());

        worker.dispatch(WorkerEvent::Activate).await.unwrap();
        assert!(worker.handle_fetch(&request).await.is_some());
    }

    #[tokio::test]
    async fn test_start_leaves_one_generation() {
        let network = network_for(&config());
        let (db, worker) = worker(network).await;
        db.open_generation("rangeen-notes-v1").await.unwrap();

        let (installed, activated) = worker.start().await.unwrap();
        assert_eq!(installed.cached.len(), 5);
        assert_eq!(activated.unwrap().deleted, vec!["rangeen-notes-v1".to_string()]);
        assert_eq!(db.generation_names().await.unwrap(), vec![worker.version().to_string()]);
        assert_eq!(worker.state().await, LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_offline_navigation_serves_precached_shell() {
        let network = network_for(&config());
        let (_db, worker) = worker(network.clone()).await;
        worker.start().await.unwrap();
        network.set_offline(true);

        let response = worker
            .handle_fetch(&FetchRequest::navigate(url("http://localhost:8080/notes/7")))
            .await
            .unwrap();
        assert_eq!(&response.body[..], b"precached http://localhost:8080/index.html");
    }

    #[tokio::test]
    async fn test_bypass_requests_are_not_intercepted() {
        let network = network_for(&config());
        let (_db, worker) = worker(network.clone()).await;
        worker.start().await.unwrap();
        let calls = network.calls();

        let post = FetchRequest::get(url("http://localhost:8080/api/notes")).with_method("POST");
        assert!(worker.handle_fetch(&post).await.is_none());
        let api = FetchRequest::get(url("https://www.zohoapis.in/workdrive/api/v1/files"));
        assert!(worker.handle_fetch(&api).await.is_none());
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_get_version_reports_active_generation() {
        let network = network_for(&config());
        let (_db, worker) = worker(network).await;
        worker.start().await.unwrap();
        let (tx, rx) = oneshot::channel();

        worker
            .dispatch(WorkerEvent::Message { data: json!("GET_VERSION"), reply: Some(tx) })
            .await
            .unwrap();
        assert_eq!(rx.await.unwrap(), VersionReply { version: worker.version().to_string() });
    }

    #[tokio::test]
    async fn test_waiting_generation_activates_on_skip_waiting() {
        let network = network_for(&config());
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut settings = WorkerConfig::try_from(&config()).unwrap();
        settings.skip_waiting_on_install = false;
        let clients = ClientRegistry::new();
        let (_old_page, mut rx) = clients.register(ORIGIN, Some("rangeen-notes-v1".into())).await;
        let worker = Worker::new(settings, db, network, Arc::new(RecordingPlatform::default()), clients);

        let (_, activated) = worker.start().await.unwrap();
        assert!(activated.is_none());
        assert_eq!(worker.state().await, LifecycleState::Installed);

        worker
            .dispatch(WorkerEvent::Message { data: json!("SKIP_WAITING"), reply: None })
            .await
            .unwrap();
        assert_eq!(worker.state().await, LifecycleState::Active);
        assert_eq!(
            rx.recv().await,
            Some(WorkerMessage::ControllerChange { version: "rangeen-notes-v2".into() })
        );
    }

    #[tokio::test]
    async fn test_sync_event_wakes_pages() {
        let network = network_for(&config());
        let (_db, worker) = worker(network).await;
        let (_page, mut rx) = worker.clients().register(ORIGIN, None).await;

        let outcome = worker.dispatch(WorkerEvent::Sync { tag: "sync-notes".into() }).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Synced(1)));
        assert_eq!(rx.recv().await, Some(WorkerMessage::BackgroundSync));
    }

    #[tokio::test]
    async fn test_push_event_without_valid_payload_is_ignored() {
        let network = network_for(&config());
        let (_db, worker) = worker(network).await;

        let outcome = worker
            .dispatch(WorkerEvent::Push { data: Some(Bytes::from_static(b"{oops")) })
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Notified(None)));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_extended_tasks() {
        let network = network_for(&config());
        let (_db, worker) = worker(network).await;
        let (tx, rx) = oneshot::channel::<()>();
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = done.clone();

        worker.wait_until(async move {
            let _ = rx.await;
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        assert_eq!(worker.pending_tasks(), 1);

        tx.send(()).unwrap();
        worker.shutdown().await;
        assert!(done.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_dropped_fetch_still_stores_on_shutdown() {
        let network = network_for(&config());
        let (db, worker) = worker(network.clone()).await;
        worker.start().await.unwrap();
        network.respond(
            "http://localhost:8080/app.js",
            CachedResponse::new(200, "console.log(1)").with_kind(ResponseKind::Basic),
        );
        network.set_delay(std::time::Duration::from_millis(50));
        let request = FetchRequest::get(url("http://localhost:8080/app.js"));

        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(10), worker.handle_fetch(&request)).await;
        assert!(abandoned.is_err());
        assert_eq!(worker.pending_tasks(), 1);

        worker.shutdown().await;
        assert_eq!(worker.pending_tasks(), 0);
        let stored = db.open_generation("rangeen-notes-v2").await.unwrap().match_request(&request).await.unwrap();
        assert_eq!(&stored.unwrap().body[..], b"console.log(1)");
    }
}
