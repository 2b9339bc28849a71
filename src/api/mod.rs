//! Web API module for Zapgate
//!
//! Provides REST API endpoints for:
//! - Health and process metrics
//! - Session lifecycle (create, inspect, restart, remove, QR, send)
//! - Webhook ingress for the Baileys bridge

pub mod health;
pub mod sessions;
pub mod webhooks;

use axum::http::StatusCode;
use axum::Json;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use zapgate_core::{Error, MetricsCollector};
use zapgate_whatsapp::{BridgeSocketFactory, SessionStore};

pub use health::health_routes;
pub use sessions::sessions_routes;
pub use webhooks::webhooks_routes;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub bridge: Arc<BridgeSocketFactory>,
    pub metrics: MetricsCollector,
}

/// Standard response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<T> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler result: envelope plus status code
pub type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

pub(crate) fn ok<T>(data: T) -> ApiResult<T> {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

pub(crate) fn failure<T>(error: &Error) -> ApiResult<T> {
    (status_for(error), Json(ApiResponse::error(error.to_string())))
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidSessionId(_) => StatusCode::BAD_REQUEST,
        Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
        Error::DuplicateSession(_) | Error::NotConnected(_) | Error::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        Error::NoWhatsAppAccount(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Setup { .. } | Error::Socket(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Create the API router with all endpoints
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes(state.clone()))
        .merge(sessions_routes(state.clone()))
        .merge(webhooks_routes(state))
}
