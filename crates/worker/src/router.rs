//! Request classification.
//!
//! Every request maps to exactly one [`Route`]; the cache-first default keeps
//! the function total.

use swcache_core::{AppConfig, FetchRequest};

/// How an intercepted request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; goes to the network unmodified.
    Bypass,
    /// Fresh copy preferred, cache on failure.
    NetworkFirst,
    /// Cached copy preferred, network on miss.
    CacheFirst,
}

/// Host lists driving classification.
///
/// Hosts match by substring, so `zoho.` matches `accounts.zoho.in` and
/// `www.zoho.com` alike.
#[derive(Debug, Clone, Default)]
pub struct RouteRules {
    bypass_hosts: Vec<String>,
    network_first_hosts: Vec<String>,
}

impl RouteRules {
    pub fn new(bypass_hosts: Vec<String>, network_first_hosts: Vec<String>) -> Self {
        Self { bypass_hosts, network_first_hosts }
    }

    /// Classify a request by method and hostname.
    pub fn classify(&self, request: &FetchRequest) -> Route {
        if !request.is_get() {
            return Route::Bypass;
        }

        let host = request.hostname();
        if self.bypass_hosts.iter().any(|h| host.contains(h.as_str())) {
            return Route::Bypass;
        }

        if self.network_first_hosts.iter().any(|h| host.contains(h.as_str())) {
            return Route::NetworkFirst;
        }

        Route::CacheFirst
    }
}

impl From<&AppConfig> for RouteRules {
    fn from(config: &AppConfig) -> Self {
        Self::new(config.bypass_hosts.clone(), config.network_first_hosts.clone())
    }
}
