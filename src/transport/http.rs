//! # HTTP Transport
//!
//! Blocking HTTP client shared by the remote, relay and IPP backends.
//!
//! Every request is bounded by a timeout. A timed out request surfaces as
//! [`PrintError::Timeout`] so callers can tell it apart from a refusal.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::error::{PrintError, Result};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic auth credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Response status and body.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Body as lossy UTF-8, trimmed.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

/// Thin wrapper holding a configured [`Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PrintError::Transport(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { client, timeout })
    }

    /// POST `body` to `url` and return the status and body.
    pub fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
        credentials: Option<&Credentials>,
    ) -> Result<HttpResponse> {
        debug!(
            "POST {} ({} bytes, timeout {:?})",
            url,
            body.len(),
            self.timeout
        );

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body);
        if let Some(creds) = credentials {
            request = request.basic_auth(&creds.username, creds.password.as_ref());
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.bytes()?.to_vec();
        debug!("POST {} -> {}", url, status);

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// TESTS
// ============================================================================
