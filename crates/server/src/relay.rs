//! OAuth token-exchange relay.
//!
//! Pages cannot hold the client secret, so they hand their authorization
//! code to this listener, which trades it at the provider and returns the
//! normalized grant. Every response carries permissive CORS headers.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderName, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use swcache_client::token::ExchangeRequest;
use swcache_client::{TokenClient, TokenConfig, TokenError};
use swcache_core::AppConfig;

use crate::error::RelayError;

/// Headers attached to every relay response, errors included.
pub fn cors_headers() -> [(HeaderName, &'static str); 4] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        (header::CONTENT_TYPE, "application/json"),
    ]
}

#[derive(Clone)]
pub struct RelayState {
    client: Arc<TokenClient>,
    /// Used for `GET ?code=` callbacks, which carry no redirect URI.
    redirect_uri: Option<String>,
}

impl RelayState {
    pub fn new(client: TokenClient, redirect_uri: Option<String>) -> Self {
        Self { client: Arc::new(client), redirect_uri }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, TokenError> {
        let client = TokenClient::new(TokenConfig::from(config))?;
        Ok(Self::new(client, config.relay.redirect_uri.clone()))
    }
}

/// The relay answers on every path.
pub fn router(state: RelayState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

async fn handle(State(state): State<RelayState>, method: Method, uri: Uri, body: Bytes) -> Response {
    let result = match method {
        Method::OPTIONS => return preflight(),
        Method::POST => exchange_body(&state, &body).await,
        Method::GET => exchange_query(&state, uri.query()).await,
        other => {
            tracing::debug!(method = %other, "relay rejected method");
            Err(RelayError::MethodNotAllowed)
        }
    };

    match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn preflight() -> Response {
    (StatusCode::OK, cors_headers()).into_response()
}

async fn exchange_body(state: &RelayState, body: &[u8]) -> Result<Response, RelayError> {
    let request: ExchangeRequest = if body.is_empty() {
        ExchangeRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|e| RelayError::BadJson(e.to_string()))?
    };
    exchange(state, &request).await
}

async fn exchange_query(state: &RelayState, query: Option<&str>) -> Result<Response, RelayError> {
    let mut request = ExchangeRequest::default();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        match key.as_ref() {
            "code" => request.code = Some(value.into_owned()),
            "redirect_uri" => request.redirect_uri = Some(value.into_owned()),
            _ => {}
        }
    }
    if request.redirect_uri.is_none() {
        request.redirect_uri = state.redirect_uri.clone();
    }
    exchange(state, &request).await
}

async fn exchange(state: &RelayState, request: &ExchangeRequest) -> Result<Response, RelayError> {
    tracing::info!(
        code_present = request.code.as_deref().is_some_and(|c| !c.is_empty()),
        redirect_present = request.redirect_uri.as_deref().is_some_and(|r| !r.is_empty()),
        "token exchange requested"
    );
    let grant = state.client.exchange(request).await?;
    Ok((StatusCode::OK, cors_headers(), Json(grant)).into_response())
}
