//! Push payload parsing and notification construction.

use serde::{Deserialize, Serialize};
use swcache_core::config::NotificationConfig;

/// Fields a push payload may carry; all optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Data attached to a notification and handed back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

/// A system notification the platform should display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

impl Notification {
    /// Build a notification from a raw push body.
    ///
    /// Returns `None` when there is no body or it is not a JSON object with
    /// the expected fields; such pushes are dropped.
    pub fn from_push(data: Option<&[u8]>, defaults: &NotificationConfig) -> Option<Self> {
        let data = data?;
        let payload: PushPayload = match serde_json::from_slice(data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unparseable push payload");
                return None;
            }
        };

        // Empty strings count as missing.
        let or_default = |value: Option<String>, default: &str| {
            value.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
        };

        Some(Self {
            title: or_default(payload.title, &defaults.title),
            body: or_default(payload.body, &defaults.body),
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            vibrate: defaults.vibrate.clone(),
            data: NotificationData { url: or_default(payload.url, &defaults.url) },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_payload() {
        let body = br#"{"title":"Synced","body":"3 notes","url":"/notes/3"}"#;
        let n = Notification::from_push(Some(body), &NotificationConfig::default()).unwrap();
        assert_eq!(n.title, "Synced");
        assert_eq!(n.body, "3 notes");
        assert_eq!(n.data.url, "/notes/3");
        assert_eq!(n.icon, "icon-192.png");
        assert_eq!(n.vibrate, vec![200, 100, 200]);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let defaults = NotificationConfig::default();
        let n = Notification::from_push(Some(b"{}"), &defaults).unwrap();
        assert_eq!(n.title, defaults.title);
        assert_eq!(n.body, defaults.body);
        assert_eq!(n.data.url, "/");
    }

    #[test]
    fn test_empty_fields_use_defaults() {
        let defaults = NotificationConfig::default();
        let n = Notification::from_push(Some(br#"{"title":"","body":"","url":""}"#), &defaults).unwrap();
        assert_eq!(n.title, defaults.title);
        assert_eq!(n.body, defaults.body);
        assert_eq!(n.data.url, defaults.url);
    }

    #[test]
    fn test_no_payload_is_ignored() {
        assert!(Notification::from_push(None, &NotificationConfig::default()).is_none());
    }

    #[test]
    fn test_unparseable_payload_is_ignored() {
        assert!(Notification::from_push(Some(b"not json"), &NotificationConfig::default()).is_none());
        assert!(Notification::from_push(Some(b"[1,2]"), &NotificationConfig::default()).is_none());
    }
}
