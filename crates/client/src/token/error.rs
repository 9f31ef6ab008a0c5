//! Token exchange error types.

use std::sync::Arc;

/// Errors from the OAuth token-exchange client.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Client id or secret not configured.
    #[error("missing client credentials: {0}")]
    MissingCredentials(String),

    /// The authorization code was not supplied.
    #[error("Zoho code missing")]
    MissingCode,

    /// The redirect URI was not supplied.
    #[error("redirect_uri missing")]
    MissingRedirectUri,

    /// The provider rejected the exchange.
    #[error("provider error: {error}")]
    Provider { error: String, description: String, raw: serde_json::Value },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TokenError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { TokenError::Timeout } else { TokenError::Network(Arc::new(err)) }
    }
}

impl TokenError {
    /// Whether the caller supplied bad input, as opposed to a relay or provider fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TokenError::MissingCode | TokenError::MissingRedirectUri | TokenError::Provider { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(TokenError::MissingCode.to_string(), "Zoho code missing");
        assert_eq!(TokenError::MissingRedirectUri.to_string(), "redirect_uri missing");

        let err = TokenError::Provider {
            error: "invalid_code".to_string(),
            description: String::new(),
            raw: serde_json::Value::Null,
        };
        assert!(err.to_string().contains("invalid_code"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(TokenError::MissingCode.is_client_error());
        assert!(!TokenError::Timeout.is_client_error());
        assert!(!TokenError::MissingCredentials("client_id".into()).is_client_error());
    }
}
