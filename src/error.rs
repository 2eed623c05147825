//! # Error Types
//!
//! This module defines the error type shared by every printer backend, the
//! raster encoder and the dispatch pipeline.
//!
//! ## Retry Policy
//!
//! | Variant | Retried internally? |
//! |---------|---------------------|
//! | `Parse` | never |
//! | `DeviceNotFound` | no |
//! | `WriteFailed` | USB retries a disconnect once before reporting |
//! | `Transport` | no |
//! | `Timeout` | no, but safe for the caller to retry |
//!
//! The dispatcher never retries across backends; retrying is owned by the
//! backend holding the stateful resource.

use thiserror::Error;

/// Main error type for printwire operations
#[derive(Debug, Error)]
pub enum PrintError {
    /// Malformed endpoint string for the selected backend
    #[error("Invalid endpoint: {0}")]
    Parse(String),

    /// The configured printer type is not registered
    #[error("Printer not found: {0}")]
    PrinterNotFound(String),

    /// No attached hardware matches the endpoint
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Partial transmission or a failed write after the reconnect attempt
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Transport-level errors (HTTP status, spooler, serial open)
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP request exceeded the backend timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid print settings
    #[error("Invalid config: {0}")]
    Config(String),

    /// Rendering collaborator failed
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid bitmap or image encoding failure
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for PrintError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PrintError::Timeout(e.to_string())
        } else {
            PrintError::Transport(e.to_string())
        }
    }
}

impl From<image::ImageError> for PrintError {
    fn from(e: image::ImageError) -> Self {
        PrintError::Image(e.to_string())
    }
}

/// Result type for printer operations
pub type Result<T> = std::result::Result<T, PrintError>;
