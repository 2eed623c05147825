//! HTTP handlers for the server.

pub mod print;
pub mod printers;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Plain-text 500 carrying the error message.
///
/// Relay clients surface this body verbatim.
pub(crate) fn error_response(message: impl Into<String>) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message.into()).into_response()
}
