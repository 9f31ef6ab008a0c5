//! Page-facing control surface under `/__worker`.
//!
//! Pages register themselves to get a client id, poll for messages the
//! worker posts to them, and send control messages. Background events
//! (`sync`, `push`, `notificationclick`) can be delivered here as well.

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use serde::{Deserialize, Serialize};
use swcache_worker::{
    ClientId, EventOutcome, LifecycleState, MessageOutcome, Notification, WindowAction, WorkerEvent, WorkerMessage,
};
use tokio::sync::oneshot;

use crate::error::ProxyError;
use crate::proxy::ProxyState;

pub fn routes() -> Router<ProxyState> {
    Router::new()
        .route("/__worker/status", get(status))
        .route("/__worker/clients", post(register_client))
        .route("/__worker/clients/{id}", delete(unregister_client))
        .route("/__worker/clients/{id}/messages", get(drain_messages))
        .route("/__worker/message", post(post_message))
        .route("/__worker/sync/{tag}", post(sync))
        .route("/__worker/push", post(push))
        .route("/__worker/notificationclick", post(notification_click))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub state: LifecycleState,
    pub clients: usize,
}

#[derive(Debug, Deserialize)]
pub struct RegisterClient {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredClient {
    pub id: ClientId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    pub delivered: usize,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClickResponse {
    Focused { client: ClientId },
    Opened { url: String },
}

impl From<WindowAction> for ClickResponse {
    fn from(action: WindowAction) -> Self {
        match action {
            WindowAction::Focused(client) => ClickResponse::Focused { client },
            WindowAction::Opened(url) => ClickResponse::Opened { url },
        }
    }
}

fn unexpected(outcome: &EventOutcome) -> Response {
    tracing::error!(?outcome, "event produced an outcome of another kind");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

async fn status(State(state): State<ProxyState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: state.worker.version().to_string(),
        state: state.worker.state().await,
        clients: state.worker.clients().match_all().await.len(),
    })
}

/// New pages are controlled right away when the worker is active.
async fn register_client(
    State(state): State<ProxyState>, Json(payload): Json<RegisterClient>,
) -> Json<RegisteredClient> {
    let worker = &state.worker;
    let controller = (worker.state().await == LifecycleState::Active).then(|| worker.version().to_string());
    let (info, rx) = worker.clients().register(payload.url, controller).await;
    state.mailboxes.lock().await.insert(info.id, rx);
    Json(RegisteredClient { id: info.id })
}

/// Closing a page may unblock a waiting generation.
async fn unregister_client(State(state): State<ProxyState>, Path(id): Path<ClientId>) -> Result<StatusCode, ProxyError> {
    if !state.worker.clients().unregister(id).await {
        return Err(ProxyError::UnknownClient(id));
    }
    state.mailboxes.lock().await.remove(&id);

    if let Err(e) = state.worker.activate_if_ready().await {
        tracing::warn!(error = %e, "activation after page close failed");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn drain_messages(
    State(state): State<ProxyState>, Path(id): Path<ClientId>,
) -> Result<Json<Vec<WorkerMessage>>, ProxyError> {
    let mut mailboxes = state.mailboxes.lock().await;
    let rx = mailboxes.get_mut(&id).ok_or(ProxyError::UnknownClient(id))?;

    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    Ok(Json(messages))
}

async fn post_message(
    State(state): State<ProxyState>, Json(data): Json<serde_json::Value>,
) -> Result<Response, ProxyError> {
    let (tx, _rx) = oneshot::channel();
    let outcome = state.worker.dispatch(WorkerEvent::Message { data, reply: Some(tx) }).await?;
    Ok(match outcome {
        EventOutcome::Message(MessageOutcome::Replied(reply)) => Json(reply).into_response(),
        EventOutcome::Message(_) => StatusCode::NO_CONTENT.into_response(),
        other => unexpected(&other),
    })
}

async fn sync(State(state): State<ProxyState>, Path(tag): Path<String>) -> Result<Response, ProxyError> {
    Ok(match state.worker.dispatch(WorkerEvent::Sync { tag }).await? {
        EventOutcome::Synced(delivered) => Json(SyncResponse { delivered }).into_response(),
        other => unexpected(&other),
    })
}

async fn push(State(state): State<ProxyState>, body: Bytes) -> Result<Response, ProxyError> {
    let data = (!body.is_empty()).then_some(body);
    Ok(match state.worker.dispatch(WorkerEvent::Push { data }).await? {
        EventOutcome::Notified(Some(notification)) => Json(notification).into_response(),
        EventOutcome::Notified(None) => StatusCode::NO_CONTENT.into_response(),
        other => unexpected(&other),
    })
}

async fn notification_click(
    State(state): State<ProxyState>, Json(notification): Json<Notification>,
) -> Result<Response, ProxyError> {
    Ok(match state.worker.dispatch(WorkerEvent::NotificationClick(notification)).await? {
        EventOutcome::Window(action) => Json(ClickResponse::from(action)).into_response(),
        other => unexpected(&other),
    })
}
