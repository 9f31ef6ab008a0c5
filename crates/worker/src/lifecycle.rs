//! Install/activate state machine for one cache generation.
//!
//! ```text
//! Parsed ─install─▶ Installing ─▶ Installed ─activate─▶ Activating ─▶ Active
//!                        │
//!                        └─ cache open failed ─▶ Redundant
//! ```
//!
//! Install precaches the manifest with a fan-out/fan-in barrier: every entry
//! is fetched independently and install returns once all of them settled.
//! Failed entries are logged and reported, never fatal.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use serde::Serialize;
use swcache_client::Network;
use swcache_core::{CacheDb, Error, FetchRequest, Generation};
use tokio::sync::RwLock;
use url::Url;

use crate::signal::ClientRegistry;

/// Lifecycle states of a worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    Active,
    /// Installation failed; this generation never activates.
    Redundant,
}

/// Outcome of precaching.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub cached: Vec<Url>,
    pub failed: Vec<(Url, String)>,
}

/// Outcome of activation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    /// Stale generations removed.
    pub deleted: Vec<String>,
    /// Pages now controlled by this generation.
    pub claimed: usize,
}

/// Lifecycle controller for the generation named by `version`.
pub struct Lifecycle {
    version: String,
    manifest: Vec<Url>,
    skip_waiting_on_install: bool,
    state: RwLock<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl Lifecycle {
    pub fn new(version: impl Into<String>, manifest: Vec<Url>, skip_waiting_on_install: bool) -> Self {
        Self {
            version: version.into(),
            manifest,
            skip_waiting_on_install,
            state: RwLock::new(LifecycleState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub async fn is_active(&self) -> bool {
        self.state().await == LifecycleState::Active
    }

    async fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.write().await;
        tracing::info!(version = %self.version, from = ?*state, to = ?next, "lifecycle transition");
        *state = next;
    }

    /// Ask for activation without waiting for older generations' pages to close.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Create this generation and precache the manifest.
    ///
    /// # Errors
    ///
    /// Fails only if the generation cannot be opened; the controller is then
    /// `Redundant`. Individual manifest failures land in the report.
    pub async fn install(&self, store: &CacheDb, network: &dyn Network) -> Result<InstallReport, Error> {
        {
            let state = self.state().await;
            if state != LifecycleState::Parsed {
                return Err(Error::InvalidState(format!("cannot install from {state:?}")));
            }
        }
        self.set_state(LifecycleState::Installing).await;

        let generation = match store.open_generation(&self.version).await {
            Ok(generation) => generation,
            Err(e) => {
                tracing::error!(version = %self.version, error = %e, "install failed: cache unavailable");
                self.set_state(LifecycleState::Redundant).await;
                return Err(e);
            }
        };

        tracing::info!(version = %self.version, entries = self.manifest.len(), "precaching");
        let generation = &generation;
        let settled = join_all(
            self.manifest
                .iter()
                .map(|url| async move { (url.clone(), precache_entry(generation, network, url).await) }),
        )
        .await;

        let mut report = InstallReport::default();
        for (url, result) in settled {
            match result {
                Ok(()) => report.cached.push(url),
                Err(e) => {
                    tracing::warn!(%url, error = %e, "precache failed");
                    report.failed.push((url, e.to_string()));
                }
            }
        }

        self.set_state(LifecycleState::Installed).await;
        tracing::info!(cached = report.cached.len(), failed = report.failed.len(), "install complete");

        if self.skip_waiting_on_install {
            self.skip_waiting();
        }

        Ok(report)
    }

    /// Retire every other generation, then take control of open pages.
    ///
    /// Re-activating an active generation repeats the sweep and the claim.
    pub async fn activate(&self, store: &CacheDb, clients: &ClientRegistry) -> Result<ActivateReport, Error> {
        let state = self.state().await;
        if state != LifecycleState::Installed && state != LifecycleState::Active {
            return Err(Error::InvalidState(format!("cannot activate from {state:?}")));
        }
        self.set_state(LifecycleState::Activating).await;

        let mut report = ActivateReport::default();
        let names = match store.generation_names().await {
            Ok(names) => names,
            Err(e) => {
                self.set_state(state).await;
                return Err(e);
            }
        };
        for name in names.into_iter().filter(|n| *n != self.version) {
            tracing::info!(generation = %name, "deleting stale cache generation");
            match store.delete_generation(&name).await {
                Ok(_) => report.deleted.push(name),
                Err(e) => {
                    self.set_state(state).await;
                    return Err(e);
                }
            }
        }

        report.claimed = clients.claim(&self.version).await;
        self.set_state(LifecycleState::Active).await;
        tracing::info!(version = %self.version, claimed = report.claimed, "active and controlling");

        Ok(report)
    }
}

/// Fetch one manifest entry and store it.
async fn precache_entry(generation: &Generation, network: &dyn Network, url: &Url) -> Result<(), Error> {
    let request = FetchRequest::get(url.clone());
    let response = network.fetch(&request).await?;
    if !response.is_cacheable() {
        return Err(Error::BadResponse(format!("status {} ({})", response.status, response.kind.as_str())));
    }
    generation.put(&request, &response).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedNetwork;
    use swcache_core::CachedResponse;

    const MANIFEST: &[&str] = &[
        "http://localhost:8080/",
        "http://localhost:8080/index.html",
        "http://localhost:8080/manifest.json",
        "http://localhost:8080/oauth_callback.html",
        "https://fonts.googleapis.com/css2?family=Baloo+2",
    ];

    fn manifest() -> Vec<Url> {
        MANIFEST.iter().map(|u| Url::parse(u).unwrap()).collect()
    }

    fn network_serving(urls: &[&str]) -> ScriptedNetwork {
        let network = ScriptedNetwork::new();
        for url in urls {
            network.respond(url, CachedResponse::new(200, format!("body of {url}")));
        }
        network
    }

    #[tokio::test]
    async fn test_install_precaches_everything() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = network_serving(MANIFEST);
        let lifecycle = Lifecycle::new("notes-v2", manifest(), true);

        let report = lifecycle.install(&db, &network).await.unwrap();
        assert_eq!(report.cached.len(), MANIFEST.len());
        assert!(report.failed.is_empty());
        assert_eq!(lifecycle.state().await, LifecycleState::Installed);
        assert!(lifecycle.skip_waiting_requested());

        let keys = db.open_generation("notes-v2").await.unwrap().keys().await.unwrap();
        assert_eq!(keys.len(), MANIFEST.len());
    }

    #[tokio::test]
    async fn test_install_tolerates_partial_failure() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = network_serving(&MANIFEST[..2]);
        network.respond(MANIFEST[2], CachedResponse::new(404, "missing"));
        let lifecycle = Lifecycle::new("notes-v2", manifest(), false);

        let report = lifecycle.install(&db, &network).await.unwrap();
        assert_eq!(report.cached.len(), 2);
        assert_eq!(report.failed.len(), 3);
        assert_eq!(network.calls(), MANIFEST.len());
        assert_eq!(lifecycle.state().await, LifecycleState::Installed);
        assert!(!lifecycle.skip_waiting_requested());
    }

    #[tokio::test]
    async fn test_install_with_every_entry_failing_still_installs() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new();
        network.set_offline(true);
        let lifecycle = Lifecycle::new("notes-v2", manifest(), true);

        let report = lifecycle.install(&db, &network).await.unwrap();
        assert!(report.cached.is_empty());
        assert!(db.has_generation("notes-v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_install_fails_when_cache_unavailable() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = db.clone();
        db.close().await.unwrap();
        let lifecycle = Lifecycle::new("notes-v2", manifest(), true);

        let result = lifecycle.install(&handle, &ScriptedNetwork::new()).await;
        assert!(result.is_err());
        assert_eq!(lifecycle.state().await, LifecycleState::Redundant);

        let again = lifecycle.activate(&handle, &ClientRegistry::new()).await;
        assert!(matches!(again, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_generations() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("notes-v1").await.unwrap();
        db.open_generation("other-app").await.unwrap();
        let lifecycle = Lifecycle::new("notes-v2", manifest(), true);
        lifecycle.install(&db, &network_serving(MANIFEST)).await.unwrap();

        let clients = ClientRegistry::new();
        let (_page, _rx) = clients.register("http://localhost:8080/", Some("notes-v1".into())).await;

        let report = lifecycle.activate(&db, &clients).await.unwrap();
        let mut deleted = report.deleted.clone();
        deleted.sort();
        assert_eq!(deleted, vec!["notes-v1".to_string(), "other-app".to_string()]);
        assert_eq!(report.claimed, 1);
        assert_eq!(db.generation_names().await.unwrap(), vec!["notes-v2".to_string()]);
        assert!(lifecycle.is_active().await);
        assert!(!clients.controlled_by_other("notes-v2").await);
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let lifecycle = Lifecycle::new("notes-v2", manifest(), true);
        let result = lifecycle.activate(&db, &ClientRegistry::new()).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_install_twice_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = network_serving(MANIFEST);
        let lifecycle = Lifecycle::new("notes-v2", manifest(), true);
        lifecycle.install(&db, &network).await.unwrap();

        let again = lifecycle.install(&db, &network).await;
        assert!(matches!(again, Err(Error::InvalidState(_))));
    }
}
