//! # printwire - Receipt and Label Printing Library
//!
//! printwire turns images into ESC/POS jobs and delivers them to thermal
//! printers over many transports. It provides:
//!
//! - **Protocol implementation**: `GS v 0` raster and `ESC *` band encoders
//! - **Printer backends**: USB, serial, CUPS, IPP, HTTP, file and preview
//! - **Dispatch**: settings-driven job framing and split printing
//! - **Relay receiver**: HTTP server printing jobs sent by other machines
//!
//! ## Quick Start
//!
//! ```no_run
//! use printwire::{Bitmap, Dispatcher, PrinterRegistry, Settings};
//!
//! let settings = Settings {
//!     printer_type: "Raw USB Printing".into(),
//!     printer_endpoint: "0416:5011:03".into(),
//!     ..Settings::default()
//! };
//!
//! let dispatcher = Dispatcher::new(PrinterRegistry::with_defaults());
//! let bitmap = Bitmap::open("receipt.png")?;
//! dispatcher.print(&settings, &bitmap)?;
//!
//! # Ok::<(), printwire::PrintError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | ESC/POS command builders and image encoders |
//! | [`printer`] | `Printer` trait, registry and backends |
//! | [`transport`] | USB, serial and HTTP plumbing |
//! | [`dispatch`] | Job framing and routing |
//! | [`settings`] | JSON print settings |
//! | [`server`] | Relay receiver |
//! | [`error`] | Error types |

pub mod bitmap;
pub mod dispatch;
pub mod error;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod server;
pub mod settings;
pub mod transport;

// Re-exports for convenience
pub use bitmap::Bitmap;
pub use dispatch::{Dispatcher, PrinterCommand};
pub use error::{PrintError, Result};
pub use printer::{Printer, PrinterRegistry};
pub use render::Renderer;
pub use settings::Settings;
