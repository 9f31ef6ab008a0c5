//! Structured errors for the proxy and the token relay.
//!
//! Both map onto JSON bodies so pages can read them the same way they read
//! successful responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use swcache_client::TokenError;

use crate::relay::cors_headers;

/// Errors from the intercepting proxy and its control surface.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The request target could not be turned into an absolute URL.
    #[error("INVALID_URL: {0}")]
    InvalidTarget(String),

    /// The request body could not be read.
    #[error("INVALID_INPUT: {0}")]
    BadBody(String),

    /// The worker failed, or a passthrough request got no response at all.
    #[error("{0}")]
    Worker(#[from] swcache_core::Error),

    /// Unknown page client.
    #[error("unknown client {0}")]
    UnknownClient(u64),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::InvalidTarget(_) | ProxyError::BadBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::Worker(e) if e.is_network_failure() => StatusCode::BAD_GATEWAY,
            ProxyError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UnknownClient(_) => StatusCode::NOT_FOUND,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self, "proxy request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Errors from the token-exchange relay, carrying the relay's CORS headers.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("POST only")]
    MethodNotAllowed,

    #[error("invalid JSON body: {0}")]
    BadJson(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl RelayError {
    fn status(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::BadJson(_) => StatusCode::BAD_REQUEST,
            RelayError::Token(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            RelayError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            RelayError::Token(TokenError::Provider { error, description, raw }) => {
                json!({ "error": error, "description": description, "zoho_response": raw })
            }
            RelayError::Token(TokenError::MissingCredentials(field)) => {
                tracing::error!(%field, "relay credentials not configured");
                json!({ "error": "Server not configured" })
            }
            RelayError::Token(e @ (TokenError::MissingCode | TokenError::MissingRedirectUri)) => {
                json!({ "error": e.to_string() })
            }
            RelayError::Token(e) => json!({ "error": format!("Relay error: {e}") }),
            other => json!({ "error": other.to_string() }),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "token exchange failed");
        }
        (status, cors_headers(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credentials_is_500_not_configured() {
        let response = RelayError::from(TokenError::MissingCredentials("client_id".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(body_json(response).await, json!({ "error": "Server not configured" }));
    }

    #[tokio::test]
    async fn test_provider_error_is_400_with_description() {
        let err = TokenError::Provider {
            error: "invalid_code".into(),
            description: "".into(),
            raw: json!({ "error": "invalid_code" }),
        };
        let response = RelayError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_code");
        assert_eq!(body["description"], "");
        assert_eq!(body["zoho_response"]["error"], "invalid_code");
    }

    #[tokio::test]
    async fn test_unknown_client_is_404() {
        let response = ProxyError::UnknownClient(9).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_502() {
        let response = ProxyError::from(swcache_core::Error::Network("connection refused".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
