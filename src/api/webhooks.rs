//! Webhook handlers for the Baileys bridge
//!
//! The bridge posts every socket event of a session to
//! `/api/v1/webhooks/bridge/:session_id`; the handler feeds it into that
//! session's ordered event stream.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{debug, warn};
use zapgate_core::Error;
use zapgate_whatsapp::BridgeEvent;

use super::AppState;

/// Handle a bridge event (POST)
async fn bridge_webhook(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(event): Json<BridgeEvent>,
) -> StatusCode {
    debug!(session_id = %session_id, "Received bridge event");

    match state.bridge.dispatch(&session_id, event).await {
        Ok(()) => StatusCode::OK,
        // 410 tells the bridge to drop the session instead of retrying
        Err(Error::SessionNotFound(_)) => {
            warn!(session_id = %session_id, "Bridge event for unknown session");
            StatusCode::GONE
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Bridge event dropped");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Create webhook routes
pub fn webhooks_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/webhooks/bridge/:session_id", post(bridge_webhook))
        .with_state(state)
}
