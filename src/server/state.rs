//! Server state and configuration.

use crate::dispatch::Dispatcher;
use crate::settings::Settings;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:7123")
    pub listen_addr: String,
    /// Largest accepted raw job, in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{}", crate::printer::remote::RELAY_PORT),
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub settings: Settings,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(settings: Settings, dispatcher: Dispatcher) -> Self {
        Self {
            settings,
            dispatcher,
        }
    }
}
