//! # CUPS Printing
//!
//! Hands jobs to the local CUPS spooler through the `lp` command.
//!
//! | Backend | Job | `lp` options |
//! |---------|-----|--------------|
//! | [`CupsPrinter`] | command buffer | `-o raw` |
//! | [`CupsImagePrinter`] | PNG of the bitmap | `-o fit-to-page -o media=Custom.WxHmm` |
//!
//! Both discover queues from `lpstat -s`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

use log::{debug, info};

use super::Printer;
use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};

/// Default paper width offered for discovered image queues.
pub const DEFAULT_IMAGE_WIDTH_MM: u32 = 80;

/// Queue names from `lpstat -s` output (`device for NAME: URI` lines).
pub fn parse_lpstat(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("device for "))
        .filter_map(|rest| rest.split_once(':'))
        .map(|(name, _)| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

fn lpstat_queues() -> Result<Vec<String>> {
    let output = Command::new("lpstat")
        .arg("-s")
        .output()
        .map_err(|e| PrintError::Transport(format!("lpstat: {}", e)))?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(parse_lpstat(&text))
}

/// Run `lp` with `args` followed by `file`.
fn run_lp(args: &[&str], file: &Path) -> Result<()> {
    debug!("lp {} {}", args.join(" "), file.display());
    let output = Command::new("lp")
        .args(args)
        .arg(file)
        .output()
        .map_err(|e| PrintError::Transport(format!("lp: {}", e)))?;

    if !output.status.success() {
        return Err(PrintError::Transport(format!(
            "lp failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    info!("{}", String::from_utf8_lossy(&output.stdout).trim());
    Ok(())
}

// ============================================================================
// RAW
// ============================================================================

/// Raw ESC/POS jobs through a CUPS queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct CupsPrinter;

impl Printer for CupsPrinter {
    fn name(&self) -> &str {
        "CUPS Printing"
    }

    fn description(&self) -> &str {
        "Print via CUPS attached printer. Use the Name of the printer (not the URI) as endpoint."
    }

    fn available_endpoints(&self) -> Result<BTreeMap<String, String>> {
        Ok(lpstat_queues()?
            .into_iter()
            .map(|queue| (queue.clone(), queue))
            .collect())
    }

    fn print(&self, endpoint: &str, _bitmap: Option<&Bitmap>, data: &[u8]) -> Result<()> {
        let queue = endpoint.trim();
        if queue.is_empty() {
            return Err(PrintError::Parse("CUPS queue name is empty".into()));
        }

        let mut file = tempfile::Builder::new()
            .prefix("print_")
            .suffix(".bin")
            .tempfile()?;
        file.write_all(data)?;
        file.flush()?;

        run_lp(&["-d", queue, "-o", "raw"], file.path())
    }
}

// ============================================================================
// IMAGE
// ============================================================================

/// # CUPS Image Endpoint (`QUEUE:WIDTH_MM`)
///
/// ```
/// use printwire::printer::cups::CupsImageEndpoint;
///
/// let ep: CupsImageEndpoint = "Label_Printer:62".parse()?;
/// assert_eq!(ep.queue, "Label_Printer");
/// assert_eq!(ep.width_mm, 62.0);
/// # Ok::<(), printwire::PrintError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CupsImageEndpoint {
    pub queue: String,
    pub width_mm: f64,
}

impl CupsImageEndpoint {
    /// Page height keeping the bitmap's aspect ratio.
    pub fn height_mm(&self, bitmap: &Bitmap) -> f64 {
        self.width_mm * bitmap.height() as f64 / bitmap.width() as f64
    }

    /// `lp` media option value, e.g. `Custom.80x40mm`.
    pub fn media(&self, bitmap: &Bitmap) -> String {
        format!("Custom.{:.0}x{:.0}mm", self.width_mm, self.height_mm(bitmap))
    }
}

impl FromStr for CupsImageEndpoint {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [queue, width] = parts.as_slice() else {
            return Err(PrintError::Parse(format!(
                "expected PRINTER_NAME:WIDTH_MM, got '{}'",
                s
            )));
        };
        if queue.is_empty() {
            return Err(PrintError::Parse(format!("missing printer name in '{}'", s)));
        }

        let width_mm: f64 = width
            .trim()
            .parse()
            .map_err(|e| PrintError::Parse(format!("invalid width '{}': {}", width, e)))?;
        if !width_mm.is_finite() || width_mm <= 0.0 {
            return Err(PrintError::Parse(format!(
                "width must be greater than 0, got '{}'",
                width
            )));
        }

        Ok(Self {
            queue: queue.to_string(),
            width_mm,
        })
    }
}

/// Prints the bitmap as a PNG page sized to the paper width.
#[derive(Debug, Default, Clone, Copy)]
pub struct CupsImagePrinter;

impl Printer for CupsImagePrinter {
    fn name(&self) -> &str {
        "CUPS Image Printing"
    }

    fn description(&self) -> &str {
        "Print as image via CUPS attached printer. Endpoint format: PRINTER_NAME:WIDTH_MM where WIDTH_MM is the paper width in millimeters. The height is calculated from the image aspect ratio."
    }

    fn prints_bitmap(&self) -> bool {
        true
    }

    fn available_endpoints(&self) -> Result<BTreeMap<String, String>> {
        Ok(lpstat_queues()?
            .into_iter()
            .map(|queue| {
                let endpoint = format!("{}:{}", queue, DEFAULT_IMAGE_WIDTH_MM);
                (queue, endpoint)
            })
            .collect())
    }

    fn print(&self, endpoint: &str, bitmap: Option<&Bitmap>, _data: &[u8]) -> Result<()> {
        let endpoint: CupsImageEndpoint = endpoint.parse()?;
        let bitmap = bitmap
            .ok_or_else(|| PrintError::Image("CUPS image printing needs a bitmap".into()))?;

        let mut file = tempfile::Builder::new()
            .prefix("print_")
            .suffix(".png")
            .tempfile()?;
        file.write_all(&bitmap.to_png()?)?;
        file.flush()?;

        let media = format!("media={}", endpoint.media(bitmap));
        run_lp(
            &["-d", &endpoint.queue, "-o", "fit-to-page", "-o", &media],
            file.path(),
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
