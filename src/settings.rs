//! # Print Settings
//!
//! Which printer to use and how jobs are framed, stored as JSON.
//!
//! ## Example
//!
//! ```json
//! {
//!   "printerType": "Raw USB Printing",
//!   "printerEndpoint": "0416:5011:03",
//!   "printerWidth": 384,
//!   "commands": {
//!     "explicitInit": true,
//!     "cut": true,
//!     "linesAfter": 2
//!   }
//! }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PrintError, Result};

/// Narrowest printable width in dots.
pub const MIN_PRINTER_WIDTH: u32 = 50;

/// Smallest allowed chunk height when an image is actually split.
pub const MIN_SPLIT_HEIGHT: u32 = 100;

/// Job framing options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandSettings {
    /// Send `ESC @` before the job
    pub explicit_init: bool,
    /// Switch the printer to standard mode before the job
    pub force_standard_mode: bool,
    /// Cut the paper after the job
    pub cut: bool,
    /// Blank lines before the image
    pub lines_before: u32,
    /// Blank lines after the image, on top of the fixed trailing feed
    pub lines_after: u32,
    /// Send tall images in several chunks
    pub split_printing: bool,
    /// Rows per chunk
    pub split_height: u32,
    /// Pause between chunks, in milliseconds
    pub split_delay: u64,
    /// Use `ESC *` bands instead of `GS v 0` raster
    pub use_esc_star: bool,
}

/// Printer selection and job framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Registered printer name
    pub printer_type: String,
    /// Backend-specific endpoint string
    pub printer_endpoint: String,
    /// Printable width in dots
    pub printer_width: u32,
    pub commands: CommandSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            printer_type: "unknown".to_string(),
            printer_endpoint: String::new(),
            printer_width: 384,
            commands: CommandSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| PrintError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write settings as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PrintError::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check the values the dispatcher depends on.
    pub fn validate(&self) -> Result<()> {
        if self.printer_width < MIN_PRINTER_WIDTH {
            return Err(PrintError::Config(format!(
                "printer width {} is below {} dots",
                self.printer_width, MIN_PRINTER_WIDTH
            )));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
