//! # Serial Printing
//!
//! Sends the command buffer over an RS232 / USB-serial port.
//!
//! ## Endpoint Format
//!
//! ```text
//! PORT:BAUD_PDB[_W]
//!
//!   PORT  device (/dev/ttyUSB0, COM3)
//!   BAUD  baud rate
//!   P     parity: N, O, E, M, S
//!   D     data bits: 1-9
//!   B     stop bits: 1, 2, 3 (= 1.5)
//!   W     seconds to wait after each chunk (optional, default 0)
//! ```
//!
//! Data goes out in chunks of one second's worth of bytes (`BAUD / 8`).
//! Slow printers without flow control need `W` to drain their buffer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use log::debug;

use super::Printer;
use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};
use crate::transport::serial::{self, Parity, SerialConfig, SerialPort, StopBits};

/// Parsed serial endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialEndpoint {
    pub port: String,
    pub config: SerialConfig,
    pub wait: Duration,
}

impl SerialEndpoint {
    /// Bytes per chunk: one second at the configured baud rate.
    pub fn chunk_size(&self) -> usize {
        (self.config.baud_rate as usize / 8).max(1)
    }
}

impl fmt::Display for SerialEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}_{}{}{}",
            self.port,
            self.config.baud_rate,
            self.config.parity.code(),
            self.config.data_bits,
            self.config.stop_bits.code()
        )?;
        if !self.wait.is_zero() {
            write!(f, "_{}", self.wait.as_secs())?;
        }
        Ok(())
    }
}

impl FromStr for SerialEndpoint {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self> {
        let syntax = || PrintError::Parse(format!("expected PORT:BAUD_PDB[_W], got '{}'", s));

        let parts: Vec<&str> = s.split(':').collect();
        let [port, framing] = parts.as_slice() else {
            return Err(syntax());
        };
        if port.is_empty() {
            return Err(syntax());
        }

        let fields: Vec<&str> = framing.split('_').collect();
        let (baud, pdb, wait) = match fields.as_slice() {
            [baud, pdb] => (*baud, *pdb, None),
            [baud, pdb, wait] => (*baud, *pdb, Some(*wait)),
            _ => return Err(syntax()),
        };

        if baud.is_empty() || !baud.chars().all(|c| c.is_ascii_digit()) {
            return Err(syntax());
        }
        let baud_rate: u32 = baud.parse().map_err(|_| syntax())?;
        if baud_rate == 0 {
            return Err(PrintError::Parse(format!("baud rate must be positive in '{}'", s)));
        }

        let &[p, d, b] = pdb.chars().collect::<Vec<_>>().as_slice() else {
            return Err(syntax());
        };
        let parity = Parity::from_code(p)
            .ok_or_else(|| PrintError::Parse(format!("unsupported parity '{}'", p)))?;
        let data_bits = match d.to_digit(10) {
            Some(bits @ 1..=9) => bits as u8,
            _ => return Err(PrintError::Parse(format!("unsupported data bits '{}'", d))),
        };
        let stop_bits = StopBits::from_code(b)
            .ok_or_else(|| PrintError::Parse(format!("unsupported stop bits '{}'", b)))?;

        let wait = match wait {
            None => Duration::ZERO,
            Some(w) => {
                let &[c] = w.chars().collect::<Vec<_>>().as_slice() else {
                    return Err(syntax());
                };
                let secs = c.to_digit(10).ok_or_else(syntax)?;
                Duration::from_secs(secs as u64)
            }
        };

        Ok(Self {
            port: port.to_string(),
            config: SerialConfig {
                baud_rate,
                parity,
                data_bits,
                stop_bits,
            },
            wait,
        })
    }
}

/// Write `data` in `chunk_size` pieces through `write`, pausing `wait`
/// after each piece. A piece that is not fully accepted fails the job.
pub fn write_chunked<F>(data: &[u8], chunk_size: usize, wait: Duration, mut write: F) -> Result<()>
where
    F: FnMut(&[u8]) -> Result<usize>,
{
    for chunk in data.chunks(chunk_size.max(1)) {
        let written = write(chunk)?;
        if written != chunk.len() {
            return Err(PrintError::WriteFailed(format!(
                "not all data was written: {} of {} bytes",
                written,
                chunk.len()
            )));
        }
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
    Ok(())
}

/// Serial backend. Opens the port per job.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPrinter;

impl Printer for SerialPrinter {
    fn name(&self) -> &str {
        "Serial"
    }

    fn description(&self) -> &str {
        "Printing over Serial-Port (e.g. RS232). Endpoint is defined PORT:9600_N81_1. This specifies 8 data bits, no parity, 1 stop bit, a baud rate of 9600 and a 1 second delay between data chunks."
    }

    fn available_endpoints(&self) -> Result<BTreeMap<String, String>> {
        Ok(serial::list_ports()?
            .into_iter()
            .map(|port| {
                let endpoint = SerialEndpoint {
                    port: port.clone(),
                    config: SerialConfig::default(),
                    wait: Duration::ZERO,
                };
                (port, endpoint.to_string())
            })
            .collect())
    }

    fn print(&self, endpoint: &str, _bitmap: Option<&Bitmap>, data: &[u8]) -> Result<()> {
        let endpoint: SerialEndpoint = endpoint.parse()?;
        debug!(
            "Serial print to {} ({} bytes, chunk {})",
            endpoint,
            data.len(),
            endpoint.chunk_size()
        );

        let mut port = SerialPort::open(&endpoint.port, &endpoint.config)?;
        write_chunked(data, endpoint.chunk_size(), endpoint.wait, |chunk| {
            port.write_chunk(chunk)
        })?;
        port.flush()
    }
}

// ============================================================================
// TESTS
// ============================================================================
