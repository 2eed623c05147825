//! # Raster Image Command (GS v 0)
//!
//! Converts a [`Bitmap`] into the ESC/POS "print raster bit image" command
//! understood by most thermal receipt printers.
//!
//! ## Protocol Details
//!
//! | Format  | Bytes |
//! |---------|-------|
//! | ASCII   | GS v 0 m xL xH yL yH d1...dk |
//! | Hex     | 1D 76 30 30 xL xH yL yH d1...dk |
//!
//! The header is compatibility-critical. Width is transmitted in bytes,
//! split as `xL = (width % 2048) / 8` and `xH = width / 2048`, where `width`
//! is the byte-aligned pixel width. Height is split as `yL = height % 256`
//! and `yH = height / 256`.
//!
//! ## Bit Packing
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0x0F = 00001111 = ░░░░████
//! ```
//!
//! - Bit 7 (MSB) = leftmost dot
//! - 1 = burn (black), 0 = paper (white)
//! - Pad bits past the bitmap's right edge are always 0
//!
//! ## Threshold
//!
//! A pixel burns when it is more than half opaque and its luminance
//! `0.2126 R + 0.7152 G + 0.0722 B` is below 128.

use rayon::prelude::*;

use super::commands::GS;
use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};

/// Fixed header length of the raster command.
pub const HEADER_LEN: usize = 8;

/// Luminance below which an opaque pixel burns.
pub const LUMINANCE_THRESHOLD: f32 = 128.0;

/// Alpha values at or below this are treated as paper.
pub const ALPHA_THRESHOLD: u8 = 255 / 2;

/// Whether a pixel should be burned.
///
/// ```
/// use printwire::protocol::raster::is_dark;
///
/// assert!(is_dark([0, 0, 0, 255]));
/// assert!(!is_dark([255, 255, 255, 255]));
/// assert!(!is_dark([0, 0, 0, 0])); // transparent
/// ```
#[inline]
pub fn is_dark(rgba: [u8; 4]) -> bool {
    let [r, g, b, a] = rgba;
    if a <= ALPHA_THRESHOLD {
        return false;
    }
    let luminance = 0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32;
    luminance < LUMINANCE_THRESHOLD
}

/// Smallest multiple of 8 that is ≥ `width`.
#[inline]
pub fn aligned_width(width: u32) -> u32 {
    width.div_ceil(8) * 8
}

/// # Raster Header
///
/// Decoded form of the 8-byte `GS v 0` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterHeader {
    /// Byte-aligned width in dots
    pub width: u32,
    /// Height in dots
    pub height: u32,
}

impl RasterHeader {
    /// Header for a bitmap of `width`×`height` pixels.
    pub fn for_size(width: u32, height: u32) -> Result<Self> {
        let width = aligned_width(width);
        if width / 2048 > u8::MAX as u32 || height > u16::MAX as u32 {
            return Err(PrintError::Image(format!(
                "bitmap {}x{} exceeds raster command limits",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    /// Width in bytes.
    #[inline]
    pub fn width_bytes(&self) -> usize {
        (self.width / 8) as usize
    }

    /// Payload length following the header.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.width_bytes() * self.height as usize
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let x_l = ((self.width % 2048) / 8) as u8;
        let x_h = (self.width / 2048) as u8;
        let y_l = (self.height % 256) as u8;
        let y_h = (self.height / 256) as u8;
        [GS, b'v', b'0', 48, x_l, x_h, y_l, y_h]
    }

    /// Parse a header from the start of `data`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        match data {
            [GS, b'v', b'0', 48, x_l, x_h, y_l, y_h, ..] => Some(Self {
                width: (*x_l as u32 + *x_h as u32 * 256) * 8,
                height: *y_l as u32 + *y_h as u32 * 256,
            }),
            _ => None,
        }
    }
}

/// Pack the bitmap rows, 8 pixels per byte, MSB first.
///
/// Rows are independent so they are packed in parallel.
pub fn pack_rows(bitmap: &Bitmap) -> Vec<u8> {
    let width = bitmap.width();
    let width_bytes = width.div_ceil(8) as usize;
    let mut data = vec![0u8; width_bytes * bitmap.height() as usize];

    data.par_chunks_mut(width_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                if is_dark(bitmap.pixel(x, y as u32)) {
                    row[(x / 8) as usize] |= 0x80 >> (x % 8);
                }
            }
        });

    data
}

/// Append the full raster command for `bitmap` to `buf`.
pub fn write_raster(buf: &mut Vec<u8>, bitmap: &Bitmap) -> Result<()> {
    let header = RasterHeader::for_size(bitmap.width(), bitmap.height())?;
    buf.reserve(HEADER_LEN + header.data_len());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend(pack_rows(bitmap));
    Ok(())
}

/// Encode `bitmap` as a standalone raster command.
///
/// ```
/// use printwire::{Bitmap, protocol::raster};
///
/// let bitmap = Bitmap::filled(10, 2, [0, 0, 0, 255])?;
/// let cmd = raster::encode(&bitmap)?;
///
/// assert_eq!(&cmd[..8], &[0x1D, 0x76, 0x30, 0x30, 2, 0, 2, 0]);
/// assert_eq!(&cmd[8..], &[0xFF, 0xC0, 0xFF, 0xC0]);
/// # Ok::<(), printwire::PrintError>(())
/// ```
pub fn encode(bitmap: &Bitmap) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_raster(&mut buf, bitmap)?;
    Ok(buf)
}

/// Decode a raster command back into a black and white bitmap.
///
/// Used to preview exactly what the printer will burn.
pub fn decode(cmd: &[u8]) -> Result<Bitmap> {
    let header = RasterHeader::parse(cmd)
        .ok_or_else(|| PrintError::Image("not a raster image command".to_string()))?;
    let data = &cmd[HEADER_LEN..];
    if data.len() < header.data_len() {
        return Err(PrintError::Image(format!(
            "raster data truncated: expected {} bytes, got {}",
            header.data_len(),
            data.len()
        )));
    }

    let width_bytes = header.width_bytes();
    let image = image::RgbaImage::from_fn(header.width, header.height, |x, y| {
        let byte = data[y as usize * width_bytes + (x / 8) as usize];
        let burned = byte & (0x80 >> (x % 8)) != 0;
        let v = if burned { 0 } else { 255 };
        image::Rgba([v, v, v, 255])
    });
    Bitmap::new(image)
}

/// Thresholded copy of `bitmap`, cropped back to its original width.
pub fn monochrome(bitmap: &Bitmap) -> Result<Bitmap> {
    let decoded = decode(&encode(bitmap)?)?;
    if decoded.width() == bitmap.width() {
        return Ok(decoded);
    }
    let cropped =
        image::imageops::crop_imm(decoded.as_image(), 0, 0, bitmap.width(), bitmap.height());
    Bitmap::new(cropped.to_image())
}

// ============================================================================
// TESTS
// ============================================================================
