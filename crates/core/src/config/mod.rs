//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache generation identifier. Changing it retires every older generation on activate.
    ///
    /// Set via SWCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin the application shell is served from; relative manifest entries resolve against it.
    #[serde(default = "default_app_origin")]
    pub app_origin: String,

    /// Page served to navigations when both cache and network miss.
    #[serde(default = "default_offline_url")]
    pub offline_url: String,

    /// Assets stored into the generation at install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Hostname substrings that are never intercepted.
    #[serde(default = "default_bypass_hosts")]
    pub bypass_hosts: Vec<String>,

    /// Hostname substrings served network-first.
    #[serde(default = "default_network_first_hosts")]
    pub network_first_hosts: Vec<String>,

    /// Background sync tag that wakes open pages.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Promote the new generation as soon as install settles.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Defaults for push notifications.
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Path to SQLite cache database.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for outgoing requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body accepted from the network.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Listen address of the interception proxy.
    #[serde(default = "default_proxy_addr")]
    pub proxy_addr: String,

    /// Token-exchange relay settings.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Fallback values for push notifications with missing fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notification_title")]
    pub title: String,
    #[serde(default = "default_notification_body")]
    pub body: String,
    #[serde(default = "default_notification_url")]
    pub url: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_icon")]
    pub badge: String,
    #[serde(default = "default_vibrate")]
    pub vibrate: Vec<u32>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_notification_title(),
            body: default_notification_body(),
            url: default_notification_url(),
            icon: default_icon(),
            badge: default_icon(),
            vibrate: default_vibrate(),
        }
    }
}

/// Settings for the OAuth code-for-token relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Listen address of the relay.
    #[serde(default = "default_relay_addr")]
    pub addr: String,

    /// OAuth client id.
    ///
    /// Set via SWCACHE_RELAY__CLIENT_ID environment variable.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret.
    ///
    /// Set via SWCACHE_RELAY__CLIENT_SECRET environment variable.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Provider data-center region, e.g. `in`, `com`, `eu`.
    #[serde(default = "default_region")]
    pub region: String,

    /// Redirect URI used by `GET ?code=` exchanges, which carry no body.
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: default_relay_addr(),
            client_id: None,
            client_secret: None,
            region: default_region(),
            redirect_uri: None,
        }
    }
}

impl RelayConfig {
    /// Token endpoint for the configured region.
    pub fn token_url(&self) -> String {
        format!("https://accounts.zoho.{}/oauth/v2/token", self.region)
    }
}

fn default_version() -> String {
    "rangeen-notes-v2".into()
}

fn default_app_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_offline_url() -> String {
    "index.html".into()
}

fn default_precache() -> Vec<String> {
    vec![
        "./".into(),
        "./index.html".into(),
        "./manifest.json".into(),
        "./oauth_callback.html".into(),
        "https://fonts.googleapis.com/css2?family=Baloo+2:wght@400;500;600;700;800&family=Noto+Sans+Devanagari:wght@400;500;600;700&display=swap".into(),
    ]
}

fn default_bypass_hosts() -> Vec<String> {
    vec!["zoho.".into(), "zohoapis.".into()]
}

fn default_network_first_hosts() -> Vec<String> {
    vec!["fonts.googleapis.com".into(), "fonts.gstatic.com".into()]
}

fn default_sync_tag() -> String {
    "sync-notes".into()
}

fn default_notification_title() -> String {
    "रंगीन नोट्स".into()
}

fn default_notification_body() -> String {
    "नोट्स sync हो गए".into()
}

fn default_notification_url() -> String {
    "/".into()
}

fn default_icon() -> String {
    "icon-192.png".into()
}

fn default_vibrate() -> Vec<u32> {
    vec![200, 100, 200]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_proxy_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_relay_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_region() -> String {
    "in".into()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app_origin: default_app_origin(),
            offline_url: default_offline_url(),
            precache: default_precache(),
            bypass_hosts: default_bypass_hosts(),
            network_first_hosts: default_network_first_hosts(),
            sync_tag: default_sync_tag(),
            skip_waiting_on_install: true,
            notification: NotificationConfig::default(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            proxy_addr: default_proxy_addr(),
            relay: RelayConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `app_origin` is not an absolute URL.
    pub fn origin(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.app_origin)
            .map_err(|e| ConfigError::Invalid { field: "app_origin".into(), reason: e.to_string() })
    }

    /// Resolve a manifest or offline-page entry against the application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin or the entry cannot be parsed.
    pub fn resolve(&self, entry: &str) -> Result<Url, ConfigError> {
        self.origin()?
            .join(entry)
            .map_err(|e| ConfigError::Invalid { field: "precache".into(), reason: format!("{entry}: {e}") })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Client credentials for the token relay (deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the client id or secret is not set.
    pub fn require_relay_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let id = self.relay.client_id.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "relay.client_id".into(),
            hint: "Set SWCACHE_RELAY__CLIENT_ID environment variable".into(),
        })?;
        let secret = self.relay.client_secret.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "relay.client_secret".into(),
            hint: "Set SWCACHE_RELAY__CLIENT_SECRET environment variable".into(),
        })?;
        Ok((id, secret))
    }
}
