//! # Printer Backends
//!
//! Every way of getting bytes (or a page image) onto paper implements
//! [`Printer`]. Backends are selected at runtime by name through the
//! [`PrinterRegistry`].
//!
//! ## Backends
//!
//! | Name | Type | Consumes | Endpoint |
//! |------|------|----------|----------|
//! | Raw USB Printing | [`UsbPrinter`] | buffer | `VVVV:PPPP:EE` |
//! | Serial | [`SerialPrinter`] | buffer | `PORT:BAUD_PDB[_W]` |
//! | CUPS Printing | [`CupsPrinter`] | buffer | queue name |
//! | CUPS Image Printing | [`CupsImagePrinter`] | bitmap | `QUEUE:WIDTH_MM` |
//! | CUPS Printing (IPP) | [`IppPrinter`] | buffer | `ipp://host/printers/NAME` |
//! | Remote Printing | [`RemotePrinter`] | buffer | HTTP(S) URL |
//! | Remote Relay | [`RelayPrinter`] | buffer | host, `host:port` or URL |
//! | Dump Raw | [`DumpPrinter`] | buffer | file path |
//! | Preview Printing | [`PreviewPrinter`] | bitmap | PNG path or empty |
//!
//! On Windows the spooler backends `Windows Direct Printing` and
//! `Windows Image Printing` are registered as well.
//!
//! Buffer backends transmit the encoded command buffer untouched. Bitmap
//! backends ignore it and build their own page from the image.

use std::collections::BTreeMap;

use crate::bitmap::Bitmap;
use crate::error::Result;

pub mod cups;
pub mod dump;
pub mod ipp;
pub mod preview;
pub mod registry;
pub mod remote;
pub mod serial;
pub mod usb;
#[cfg(windows)]
pub mod windows;

pub use cups::{CupsImagePrinter, CupsPrinter};
pub use dump::DumpPrinter;
pub use ipp::IppPrinter;
pub use preview::PreviewPrinter;
pub use registry::{PrinterDescriptor, PrinterRegistry};
pub use remote::{RelayPrinter, RemotePrinter};
pub use serial::SerialPrinter;
pub use usb::UsbPrinter;
#[cfg(windows)]
pub use windows::{WindowsDirectPrinter, WindowsImagePrinter};

/// A print backend.
///
/// Implementations are shared between threads behind an `Arc`, so any
/// per-device state must be guarded internally.
pub trait Printer: Send + Sync {
    /// Registry key, also stored in settings as `printer_type`.
    fn name(&self) -> &str;

    /// Human readable help, including the endpoint format.
    fn description(&self) -> &str;

    /// Discovered endpoints, label -> endpoint string.
    fn available_endpoints(&self) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    /// True for backends that print `bitmap` and ignore `data`. These get
    /// the whole image in one call instead of split strips.
    fn prints_bitmap(&self) -> bool {
        false
    }

    /// Print to `endpoint`.
    ///
    /// `data` is the encoded command buffer. `bitmap` is the source image
    /// when there is one; raw commands (cut, drawer) are sent without it.
    fn print(&self, endpoint: &str, bitmap: Option<&Bitmap>, data: &[u8]) -> Result<()>;
}
