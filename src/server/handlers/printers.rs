//! Printer listing handlers.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::super::state::AppState;
use super::error_response;

/// Handle GET /api/printers - registered backends.
pub async fn list(State(state): State<Arc<AppState>>) -> Response {
    Json(state.dispatcher.registry().descriptors()).into_response()
}

/// Handle GET /api/printers/endpoints - discovered endpoints per backend.
pub async fn endpoints(State(state): State<Arc<AppState>>) -> Response {
    // Discovery touches USB and spawns lpstat
    match tokio::task::spawn_blocking(move || state.dispatcher.registry().available_endpoints())
        .await
    {
        Ok(endpoints) => Json(endpoints).into_response(),
        Err(e) => error_response(format!("Task error: {}", e)),
    }
}
