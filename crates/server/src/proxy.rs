//! Request interception.
//!
//! Every request that is not a control route is turned into a
//! [`FetchRequest`] and offered to the worker. Requests the worker does not
//! intercept go straight to the network, unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::Response;
use swcache_client::fetch::resolve_target;
use swcache_core::{CachedResponse, Destination, FetchRequest, RequestMode};
use swcache_worker::{ClientId, Worker, WorkerMessage};
use tokio::sync::{Mutex, mpsc};
use url::Url;

use crate::control;
use crate::error::ProxyError;

/// Response headers that describe the upstream connection or encoding,
/// which no longer apply once the body has been buffered and decoded.
const STRIP_RESPONSE_HEADERS: &[HeaderName] =
    &[header::CONTENT_LENGTH, header::CONTENT_ENCODING, header::TRANSFER_ENCODING, header::CONNECTION];

type Mailboxes = Arc<Mutex<HashMap<ClientId, mpsc::UnboundedReceiver<WorkerMessage>>>>;

#[derive(Clone)]
pub struct ProxyState {
    pub(crate) worker: Arc<Worker>,
    origin: Url,
    max_body: usize,
    /// Message channels of registered pages, drained by polling.
    pub(crate) mailboxes: Mailboxes,
}

impl ProxyState {
    pub fn new(worker: Arc<Worker>, origin: Url, max_body: usize) -> Self {
        Self { worker, origin, max_body, mailboxes: Arc::default() }
    }

    /// Build the worker's view of an incoming request.
    async fn fetch_request(&self, request: Request) -> Result<FetchRequest, ProxyError> {
        let (parts, body) = request.into_parts();

        let url = resolve_target(&parts.uri.to_string(), &self.origin)
            .map_err(|e| ProxyError::InvalidTarget(e.to_string()))?;
        let body = to_bytes(body, self.max_body)
            .await
            .map_err(|e| ProxyError::BadBody(e.to_string()))?;

        let mut fetch = FetchRequest::get(url)
            .with_method(parts.method.as_str())
            .with_destination(destination(&parts.headers))
            .with_mode(mode(&parts.headers, parts.method.as_str()));
        fetch.headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        fetch.body = (!body.is_empty()).then_some(body);

        Ok(fetch)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn destination(headers: &HeaderMap) -> Destination {
    header_str(headers, "sec-fetch-dest")
        .and_then(|v| v.parse::<Destination>().ok())
        .unwrap_or_default()
}

/// `Sec-Fetch-Mode`, or a navigation guess for clients that do not send it.
fn mode(headers: &HeaderMap, method: &str) -> RequestMode {
    if let Some(mode) = header_str(headers, "sec-fetch-mode").and_then(|v| v.parse::<RequestMode>().ok()) {
        return mode;
    }
    let wants_html = header_str(headers, header::ACCEPT.as_str()).is_some_and(|a| a.starts_with("text/html"));
    if method.eq_ignore_ascii_case("GET") && wants_html { RequestMode::Navigate } else { RequestMode::default() }
}

/// Convert a worker response into an HTTP response.
///
/// Header pairs that are not valid HTTP are dropped.
pub fn into_http(response: CachedResponse) -> Response {
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = out.headers_mut();
    for (name, value) in &response.headers {
        let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) else {
            continue;
        };
        if STRIP_RESPONSE_HEADERS.contains(&name) {
            continue;
        }
        headers.append(name, value);
    }
    out
}

/// Offer a request to the worker, falling through to the network.
pub async fn intercept(State(state): State<ProxyState>, request: Request) -> Result<Response, ProxyError> {
    let fetch = state.fetch_request(request).await?;

    let response = match state.worker.handle_fetch(&fetch).await {
        Some(response) => response,
        None => {
            tracing::debug!(request = %fetch, "passthrough");
            state.worker.network().fetch(&fetch).await?
        }
    };

    Ok(into_http(response))
}

/// Control routes plus the intercepting fallback.
pub fn router(state: ProxyState) -> Router {
    control::routes().fallback(intercept).with_state(state)
}
