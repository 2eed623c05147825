//! # ESC/POS Protocol Implementation
//!
//! Low-level command builders for ESC/POS thermal receipt printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Control commands (init, standard mode, cut, feed, cash drawer)
//! - [`raster`]: `GS v 0` raster image encoder, the default image path
//! - [`band`]: `ESC *` 24-dot band encoder for printers without raster support
//!
//! ## Usage Example
//!
//! ```
//! use printwire::{Bitmap, protocol::{commands, raster}};
//!
//! let bitmap = Bitmap::filled(384, 40, [0, 0, 0, 255])?;
//!
//! let mut data = Vec::new();
//! data.extend(commands::init());
//! raster::write_raster(&mut data, &bitmap)?;
//! data.extend(commands::line_feeds(commands::TRAILING_FEED_LINES));
//! data.extend(commands::cut());
//!
//! // Send `data` to a raw printer backend...
//! # Ok::<(), printwire::PrintError>(())
//! ```

pub mod band;
pub mod commands;
pub mod raster;
