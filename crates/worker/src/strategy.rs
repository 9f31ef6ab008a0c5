//! Caching strategies.
//!
//! Both strategies work against the single current generation and always
//! resolve to a response; network failures never reach the caller.
//!
//! ### Cache-first
//! cache → network (stored if cacheable) → offline page (navigations only) → 503 `Offline`
//!
//! ### Network-first
//! network (stored if cacheable) → cache → empty 503

use std::sync::Arc;

use swcache_client::Network;
use swcache_core::{CacheDb, CachedResponse, FetchRequest, Generation};
use url::Url;

use crate::router::Route;

/// Runs cache-first and network-first against one cache generation.
#[derive(Clone)]
pub struct StrategyExecutor {
    store: CacheDb,
    cache_name: String,
    offline_url: Url,
    network: Arc<dyn Network>,
}

impl StrategyExecutor {
    pub fn new(store: CacheDb, cache_name: impl Into<String>, offline_url: Url, network: Arc<dyn Network>) -> Self {
        Self { store, cache_name: cache_name.into(), offline_url, network }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Serve a request by its route.
    ///
    /// Returns `None` for [`Route::Bypass`]; the caller forwards those itself.
    pub async fn execute(&self, route: Route, request: &FetchRequest) -> Option<CachedResponse> {
        match route {
            Route::Bypass => None,
            Route::CacheFirst => Some(self.cache_first(request).await),
            Route::NetworkFirst => Some(self.network_first(request).await),
        }
    }

    /// The current generation, or `None` when the store cannot be opened.
    ///
    /// A broken store degrades to network-only behavior.
    async fn generation(&self) -> Option<Generation> {
        match self.store.open_generation(&self.cache_name).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                tracing::warn!(cache = %self.cache_name, error = %e, "cache unavailable, serving network only");
                None
            }
        }
    }

    async fn lookup(generation: Option<&Generation>, request: &FetchRequest) -> Option<CachedResponse> {
        let generation = generation?;
        match generation.match_request(request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(%request, error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn store(generation: Option<&Generation>, request: &FetchRequest, response: &CachedResponse) {
        let Some(generation) = generation else {
            return;
        };
        if let Err(e) = generation.put(request, response).await {
            tracing::warn!(%request, error = %e, "cache write failed");
        }
    }

    /// Cached copy if present, otherwise the network.
    pub async fn cache_first(&self, request: &FetchRequest) -> CachedResponse {
        let generation = self.generation().await;

        if let Some(hit) = Self::lookup(generation.as_ref(), request).await {
            tracing::debug!(%request, "cache hit");
            return hit;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    Self::store(generation.as_ref(), request, &response).await;
                } else {
                    tracing::debug!(%request, status = response.status, kind = response.kind.as_str(), "not caching");
                }
                response
            }
            Err(e) => {
                tracing::warn!(%request, error = %e, "network failed on cache miss");
                if request.is_navigation()
                    && let Some(generation) = &generation
                {
                    match generation.match_url(&self.offline_url).await {
                        Ok(Some(page)) => return page,
                        Ok(None) => {}
                        Err(e) => tracing::warn!(error = %e, "offline page lookup failed"),
                    }
                }
                CachedResponse::service_unavailable("Offline")
            }
        }
    }

    /// Network if reachable, otherwise the cached copy.
    pub async fn network_first(&self, request: &FetchRequest) -> CachedResponse {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    let generation = self.generation().await;
                    Self::store(generation.as_ref(), request, &response).await;
                }
                response
            }
            Err(e) => {
                tracing::warn!(%request, error = %e, "network failed, trying cache");
                let generation = self.generation().await;
                match Self::lookup(generation.as_ref(), request).await {
                    Some(stale) => stale,
                    None => CachedResponse::service_unavailable(""),
                }
            }
        }
    }
}
