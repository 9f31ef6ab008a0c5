//! Checks applied to a loaded `AppConfig` before anything uses it.

use std::net::SocketAddr;

use crate::config::AppConfig;
use thiserror::Error;

const MAX_BYTES_LIMIT: usize = 50 * 1024 * 1024;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` or `user_agent` is empty
    /// - `app_origin`, a precache entry or `offline_url` cannot be resolved
    /// - `max_bytes` is outside 1 byte..=50MB
    /// - `timeout_ms` is outside 100ms..=5 minutes
    /// - `proxy_addr` or `relay.addr` is not a socket address
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(invalid("version", "must not be empty"));
        }
        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        self.origin()?;
        for entry in &self.precache {
            self.resolve(entry)?;
        }
        self.resolve(&self.offline_url)
            .map_err(|e| invalid("offline_url", e.to_string()))?;

        if !(1..=MAX_BYTES_LIMIT).contains(&self.max_bytes) {
            return Err(invalid("max_bytes", "must be between 1 byte and 50MB"));
        }
        if !(100..=300_000).contains(&self.timeout_ms) {
            return Err(invalid("timeout_ms", "must be between 100ms and 5 minutes (300000ms)"));
        }

        for (field, addr) in [("proxy_addr", &self.proxy_addr), ("relay.addr", &self.relay.addr)] {
            if addr.parse::<SocketAddr>().is_err() {
                return Err(invalid(field, format!("{addr:?} is not a socket address")));
            }
        }

        let overlap: Vec<&String> = self
            .bypass_hosts
            .iter()
            .filter(|h| self.network_first_hosts.contains(h))
            .collect();
        if !overlap.is_empty() {
            tracing::warn!(?overlap, "hosts listed as both bypass and network-first; bypass wins");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_version() {
        let config = AppConfig { version: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "version"));
    }

    #[test]
    fn test_validate_relative_origin() {
        let config = AppConfig { app_origin: "/just/a/path".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "app_origin"));
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() }; // 5min 1sec
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_max_bytes_over_limit() {
        let config = AppConfig { max_bytes: MAX_BYTES_LIMIT + 1, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_bad_offline_url() {
        let config = AppConfig { offline_url: "http://[::1".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "offline_url"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_bad_proxy_addr() {
        let config = AppConfig { proxy_addr: "localhost".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "proxy_addr"));
    }

    #[test]
    fn test_validate_overlapping_hosts_is_warning_only() {
        let config = AppConfig {
            bypass_hosts: vec!["fonts.gstatic.com".into()],
            network_first_hosts: vec!["fonts.gstatic.com".into()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
