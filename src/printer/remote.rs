//! # Remote Printing over HTTP
//!
//! - [`RemotePrinter`] POSTs the command buffer to any URL.
//! - [`RelayPrinter`] POSTs it to another printwire instance running
//!   `printwire serve`, which prints it on its own configured printer.

use std::net::Ipv6Addr;
use std::time::Duration;

use log::{debug, info};
use reqwest::Url;

use super::Printer;
use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};
use crate::transport::http::{DEFAULT_TIMEOUT, HttpTransport};

/// Port the relay receiver listens on by default.
pub const RELAY_PORT: u16 = 7123;

/// Path of the relay receiver's raw print route.
pub const RELAY_PATH: &str = "/api/extern/print_raw";

const OCTET_STREAM: &str = "application/octet-stream";

/// Validate an `http(s)://` endpoint.
fn http_url(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| PrintError::Parse(format!("invalid URL '{}': {}", endpoint, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PrintError::Parse(format!(
            "unsupported scheme '{}', expected http or https",
            other
        ))),
    }
}

/// Expand a relay endpoint to the full receiver URL.
///
/// ```
/// use printwire::printer::remote::relay_url;
///
/// assert_eq!(relay_url("192.168.1.20")?, "http://192.168.1.20:7123/api/extern/print_raw");
/// assert_eq!(relay_url("shop-pc:8000")?, "http://shop-pc:8000/api/extern/print_raw");
/// assert_eq!(relay_url("fe80::1")?, "http://[fe80::1]:7123/api/extern/print_raw");
/// # Ok::<(), printwire::PrintError>(())
/// ```
pub fn relay_url(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(PrintError::Parse("relay endpoint is empty".into()));
    }

    let url = if endpoint.contains("://") {
        endpoint.to_string()
    } else if endpoint.parse::<Ipv6Addr>().is_ok() {
        format!("http://[{}]:{}{}", endpoint, RELAY_PORT, RELAY_PATH)
    } else if endpoint.starts_with('[') && endpoint.ends_with(']') {
        format!("http://{}:{}{}", endpoint, RELAY_PORT, RELAY_PATH)
    } else if endpoint.contains(':') {
        format!("http://{}{}", endpoint, RELAY_PATH)
    } else {
        format!("http://{}:{}{}", endpoint, RELAY_PORT, RELAY_PATH)
    };

    Ok(http_url(&url)?.to_string())
}

// ============================================================================
// REMOTE
// ============================================================================

/// POSTs the buffer as `application/octet-stream` to the endpoint URL.
#[derive(Debug, Clone)]
pub struct RemotePrinter {
    timeout: Duration,
}

impl RemotePrinter {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for RemotePrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer for RemotePrinter {
    fn name(&self) -> &str {
        "Remote Printing"
    }

    fn description(&self) -> &str {
        "Print via a remote server. The raw commands are sent as HTTP POST to the endpoint URL."
    }

    fn print(&self, endpoint: &str, _bitmap: Option<&Bitmap>, data: &[u8]) -> Result<()> {
        let url = http_url(endpoint.trim())?;
        let http = HttpTransport::new(self.timeout)?;
        let response = http.post(url.as_str(), OCTET_STREAM, data.to_vec(), None)?;

        if !response.status.is_success() {
            return Err(PrintError::Transport(format!(
                "{} returned {}",
                url, response.status
            )));
        }
        debug!("Remote print to {} -> {}", url, response.status);
        Ok(())
    }
}

// ============================================================================
// RELAY
// ============================================================================

/// Forwards the buffer to another printwire instance.
#[derive(Debug, Clone)]
pub struct RelayPrinter {
    timeout: Duration,
}

impl RelayPrinter {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for RelayPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer for RelayPrinter {
    fn name(&self) -> &str {
        "Remote Relay"
    }

    fn description(&self) -> &str {
        "Print via another printwire instance in your network. Endpoint should be its IP or host name."
    }

    fn print(&self, endpoint: &str, _bitmap: Option<&Bitmap>, data: &[u8]) -> Result<()> {
        let url = relay_url(endpoint)?;
        let http = HttpTransport::new(self.timeout)?;
        let response = http.post(&url, OCTET_STREAM, data.to_vec(), None)?;

        if response.status != reqwest::StatusCode::OK {
            return Err(PrintError::Transport(response.text()));
        }
        info!("Relayed {} bytes to {}", data.len(), url);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
