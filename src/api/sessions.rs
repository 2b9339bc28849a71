//! Sessions API endpoints
//!
//! GET    /api/v1/sessions              - List managed sessions
//! POST   /api/v1/sessions              - Create and connect a session
//! GET    /api/v1/sessions/:id          - Get session status
//! DELETE /api/v1/sessions/:id          - Log out and remove a session
//! POST   /api/v1/sessions/:id/restart  - Tear down and reconnect
//! GET    /api/v1/sessions/:id/qr       - Current pairing QR, if any
//! POST   /api/v1/sessions/:id/messages - Send a text message

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use zapgate_core::Error;
use zapgate_whatsapp::{SentMessage, SessionSnapshot, TeardownReport};

use super::{failure, ok, ApiResponse, ApiResult, AppState};

/// Request to create a session.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub session_id: String,
    /// Known phone number, if the account was paired before
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Credential folder; defaults to `<auth_base_dir>/<session_id>`
    #[serde(default)]
    pub auth_folder_path: Option<PathBuf>,
    #[serde(default)]
    pub server_port: Option<u16>,
}

/// Query for session removal.
#[derive(Debug, Deserialize)]
pub struct RemoveQuery {
    /// Report the disconnect to the backend
    #[serde(default = "default_notify")]
    pub notify: bool,
}

fn default_notify() -> bool {
    true
}

/// Request to send a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Phone number or JID
    pub to: String,
    pub text: String,
}

/// QR lookup response.
#[derive(Debug, Serialize)]
pub struct QrResponse {
    pub session_id: String,
    pub qr_code: Option<String>,
}

/// List managed sessions.
async fn list_sessions(State(state): State<AppState>) -> Json<ApiResponse<Vec<SessionSnapshot>>> {
    Json(ApiResponse::success(
        state.store.get_all_sessions_status().await,
    ))
}

/// Create and connect a session.
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<SessionSnapshot> {
    if request.session_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("session_id must not be empty")),
        );
    }

    match state
        .store
        .create_session(
            &request.session_id,
            request.phone_number,
            request.auth_folder_path,
            request.server_port,
        )
        .await
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(ApiResponse::success(snapshot))),
        Err(e) => failure(&e),
    }
}

/// Get session status.
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    match state.store.get_session_status(&id).await {
        Some(snapshot) => ok(snapshot),
        None => failure(&Error::SessionNotFound(id)),
    }
}

/// Log out and remove a session.
async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> ApiResult<TeardownReport> {
    match state.store.teardown_session(&id, query.notify).await {
        Some(report) => {
            info!(session_id = %id, ?report, "Session removed via API");
            ok(report)
        }
        None => failure(&Error::SessionNotFound(id)),
    }
}

/// Tear down and reconnect a session.
async fn restart_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    if let Err(e) = state.store.restart_session(&id).await {
        return failure(&e);
    }
    match state.store.get_session_status(&id).await {
        Some(snapshot) => ok(snapshot),
        None => failure(&Error::SessionNotFound(id)),
    }
}

/// Current pairing QR.
async fn get_qr_code(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<QrResponse> {
    match state.store.get_qr_code(&id).await {
        Ok(qr_code) => ok(QrResponse {
            session_id: id,
            qr_code,
        }),
        Err(e) => failure(&e),
    }
}

/// Send a text message.
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<SentMessage> {
    match state
        .store
        .send_text_message(&id, &request.to, &request.text)
        .await
    {
        Ok(sent) => ok(sent),
        Err(e) => failure(&e),
    }
}

/// Create sessions routes.
pub fn sessions_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/v1/sessions/:id",
            get(get_session).delete(delete_session),
        )
        .route("/api/v1/sessions/:id/restart", post(restart_session))
        .route("/api/v1/sessions/:id/qr", get(get_qr_code))
        .route("/api/v1/sessions/:id/messages", post(send_message))
        .with_state(state)
}

#[cfg(test)]
mod tests;
