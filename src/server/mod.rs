//! # Relay Receiver
//!
//! Lets other machines print on this machine's printer. A client
//! configured with the `Remote Relay` backend POSTs its encoded job here
//! and it is forwarded untouched to the locally configured printer.
//!
//! ## Routes
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | POST | `/api/extern/print_raw` | 200, or 500 with the error text |
//! | GET | `/api/printers` | registered backends as JSON |
//! | GET | `/api/printers/endpoints` | discovered endpoints as JSON |
//!
//! ## Usage
//!
//! ```bash
//! printwire serve --settings settings.json --listen 0.0.0.0:7123
//! ```

mod handlers;
mod state;

pub use state::{AppState, ServerConfig};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use log::info;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::dispatch::Dispatcher;
use crate::error::{PrintError, Result};
use crate::settings::Settings;

/// Build the router.
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/extern/print_raw", post(handlers::print::print_raw))
        .route("/api/printers", get(handlers::printers::list))
        .route("/api/printers/endpoints", get(handlers::printers::endpoints))
        // Raw jobs of tall images exceed axum's 2MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// Start the relay receiver.
///
/// ## Example
///
/// ```no_run
/// use printwire::{Dispatcher, PrinterRegistry, Settings};
/// use printwire::server::{serve, ServerConfig};
///
/// # async fn example() -> printwire::Result<()> {
/// let settings = Settings::load("settings.json")?;
/// let dispatcher = Dispatcher::new(PrinterRegistry::with_defaults());
///
/// serve(ServerConfig::default(), settings, dispatcher).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig, settings: Settings, dispatcher: Dispatcher) -> Result<()> {
    info!(
        "Relay receiver printing to '{}' at '{}'",
        settings.printer_type, settings.printer_endpoint
    );

    let state = Arc::new(AppState::new(settings, dispatcher));
    let app = router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            PrintError::Transport(format!("Failed to bind to {}: {}", config.listen_addr, e))
        })?;
    info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| PrintError::Transport(format!("Server error: {}", e)))?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
