//! # 24-Dot Bit Image Bands (ESC *)
//!
//! Fallback graphics mode for printers without `GS v 0` support. The image
//! is sent as horizontal bands 24 dots tall, each a separate `ESC *`
//! command followed by a line feed.
//!
//! ## Protocol Details
//!
//! | Command | Hex | Purpose |
//! |---------|-----|---------|
//! | ESC 3 n | 1B 33 18 | line spacing = 24 dots |
//! | ESC * m nL nH d... | 1B 2A 21 nL nH d... | one band, m = 33 (24-dot double density) |
//! | LF | 0A | advance exactly one band |
//! | ESC 2 | 1B 32 | restore default line spacing |
//!
//! ## Data Layout
//!
//! Column-major, 3 bytes per column:
//!
//! ```text
//!          col 0   col 1   ...   col n-1
//! rows 0-7   b0      b0            b0      bit 7 = top row
//! rows 8-15  b1      b1            b1
//! rows 16-23 b2      b2            b2
//! ```
//!
//! Rows past the bottom of the bitmap are left as 0.

use rayon::prelude::*;

use super::commands::{ESC, LF, u16_le};
use super::raster::is_dark;
use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};

/// Rows per band.
pub const BAND_HEIGHT: u32 = 24;

/// `m` parameter for 24-dot double density.
const MODE_24_DOT: u8 = 33;

fn band_columns(bitmap: &Bitmap, top: u32) -> Vec<u8> {
    let height = bitmap.height();
    let mut out = vec![0u8; bitmap.width() as usize * 3];

    out.par_chunks_mut(3).enumerate().for_each(|(x, column)| {
        for bit in 0..BAND_HEIGHT {
            let y = top + bit;
            if y < height && is_dark(bitmap.pixel(x as u32, y)) {
                column[(bit / 8) as usize] |= 0x80 >> (bit % 8);
            }
        }
    });

    out
}

/// Append the band sequence for `bitmap` to `buf`.
pub fn write_bands(buf: &mut Vec<u8>, bitmap: &Bitmap) -> Result<()> {
    let width = u16::try_from(bitmap.width()).map_err(|_| {
        PrintError::Image(format!("bitmap width {} too wide for ESC *", bitmap.width()))
    })?;
    let [n_l, n_h] = u16_le(width);

    buf.extend_from_slice(&[ESC, b'3', BAND_HEIGHT as u8]);
    for top in (0..bitmap.height()).step_by(BAND_HEIGHT as usize) {
        buf.extend_from_slice(&[ESC, b'*', MODE_24_DOT, n_l, n_h]);
        buf.extend(band_columns(bitmap, top));
        buf.push(LF);
    }
    buf.extend_from_slice(&[ESC, b'2']);
    Ok(())
}

/// Encode `bitmap` as a standalone band sequence.
pub fn encode(bitmap: &Bitmap) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_bands(&mut buf, bitmap)?;
    Ok(buf)
}

// ============================================================================
// TESTS
// ============================================================================
