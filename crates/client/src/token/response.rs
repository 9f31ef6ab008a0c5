//! Token exchange response types and normalization.

use serde::{Deserialize, Serialize};

/// Raw response from the provider's token endpoint.
#[derive(Debug, Deserialize)]
pub struct ProviderResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Normalized token grant returned to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
    pub scope: String,
}

impl From<ProviderResponse> for TokenGrant {
    /// Fill provider omissions with the defaults pages expect.
    fn from(raw: ProviderResponse) -> Self {
        TokenGrant {
            access_token: raw.access_token.unwrap_or_default(),
            refresh_token: raw.refresh_token.unwrap_or_default(),
            expires_in: raw.expires_in.unwrap_or(3600),
            token_type: raw.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: raw.scope.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let raw: ProviderResponse = serde_json::from_str(r#"{"access_token":"tok"}"#).unwrap();
        let grant = TokenGrant::from(raw);
        assert_eq!(grant.access_token, "tok");
        assert_eq!(grant.refresh_token, "");
        assert_eq!(grant.expires_in, 3600);
        assert_eq!(grant.token_type, "Bearer");
        assert_eq!(grant.scope, "");
    }

    #[test]
    fn test_full_response() {
        let raw: ProviderResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":60,"token_type":"Zoho-oauthtoken","scope":"WorkDrive.files.ALL"}"#,
        )
        .unwrap();
        let grant = TokenGrant::from(raw);
        assert_eq!(grant.expires_in, 60);
        assert_eq!(grant.token_type, "Zoho-oauthtoken");
        assert_eq!(grant.scope, "WorkDrive.files.ALL");
    }

    #[test]
    fn test_error_response_parses() {
        let raw: ProviderResponse = serde_json::from_str(r#"{"error":"invalid_code"}"#).unwrap();
        assert_eq!(raw.error.as_deref(), Some("invalid_code"));
        assert!(raw.access_token.is_none());
    }
}
