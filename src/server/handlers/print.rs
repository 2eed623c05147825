//! Raw print handler used by relay clients.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{info, warn};
use std::sync::Arc;

use super::super::state::AppState;
use super::error_response;

/// Handle POST /api/extern/print_raw - print the request body as-is.
pub async fn print_raw(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let len = body.len();

    // Printing blocks on device I/O
    let print_result = tokio::task::spawn_blocking(move || {
        state.dispatcher.print_raw(&state.settings, &body)
    })
    .await;

    match print_result {
        Ok(Ok(())) => {
            info!("Relayed job of {} bytes printed", len);
            StatusCode::OK.into_response()
        }
        Ok(Err(e)) => {
            warn!("Relayed job failed: {}", e);
            error_response(e.to_string())
        }
        Err(e) => error_response(format!("Task error: {}", e)),
    }
}
