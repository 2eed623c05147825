//! # Bitmap
//!
//! The rendered page handed to the printer layer. A [`Bitmap`] wraps an
//! [`image::RgbaImage`] and guarantees both dimensions are non-zero, so the
//! encoders never have to special-case empty images.
//!
//! ## Coordinate System
//!
//! ```text
//! (0,0) ──────────────────────► X (width, printer head direction)
//!   │
//!   │   each pixel is [R, G, B, A]
//!   ▼
//!   Y (height, paper feed direction)
//! ```

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{PrintError, Result};

/// Immutable RGBA image with width > 0 and height > 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    /// Wrap an RGBA image, rejecting empty dimensions.
    pub fn new(image: RgbaImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PrintError::Image(format!(
                "bitmap must not be empty ({}x{})",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image })
    }

    /// Build a bitmap of the given size filled with one color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        Self::new(RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
    }

    /// Decode an encoded image (PNG, JPEG, ...) from memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(data)?;
        Self::from_dynamic(decoded)
    }

    /// Decode an image file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let decoded = image::open(path.as_ref())?;
        Self::from_dynamic(decoded)
    }

    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        Self::new(image.into_rgba8())
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// RGBA value at (x, y). Panics when out of bounds, like `RgbaImage`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Copy rows `y..y + height` into a new bitmap.
    ///
    /// The range is clamped to the bitmap; an empty result is an error.
    pub fn crop_rows(&self, y: u32, height: u32) -> Result<Self> {
        let end = y.saturating_add(height).min(self.height());
        let start = y.min(end);
        let view = image::imageops::crop_imm(&self.image, 0, start, self.width(), end - start);
        Self::new(view.to_image())
    }

    /// Split into consecutive row chunks of at most `chunk_height` rows.
    pub fn split_rows(&self, chunk_height: u32) -> Result<Vec<Self>> {
        if chunk_height == 0 {
            return Err(PrintError::Config("chunk height must be > 0".to_string()));
        }
        let chunks = self.height().div_ceil(chunk_height);
        (0..chunks)
            .map(|i| self.crop_rows(i * chunk_height, chunk_height))
            .collect()
    }

    /// Copy of this bitmap with a white border of `padding` pixels.
    pub fn padded(&self, padding: u32) -> Result<Self> {
        let mut canvas = RgbaImage::from_pixel(
            self.width() + padding * 2,
            self.height() + padding * 2,
            image::Rgba([255, 255, 255, 255]),
        );
        image::imageops::replace(&mut canvas, &self.image, padding as i64, padding as i64);
        Self::new(canvas)
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Encode as PNG and write to `path`.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image
            .save_with_format(path.as_ref(), ImageFormat::Png)
            .map_err(|e| PrintError::Image(format!("Failed to save PNG: {}", e)))
    }
}

impl TryFrom<RgbaImage> for Bitmap {
    type Error = PrintError;

    fn try_from(image: RgbaImage) -> Result<Self> {
        Self::new(image)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bitmap_rejected() {
        assert!(matches!(
            Bitmap::new(RgbaImage::new(0, 10)),
            Err(PrintError::Image(_))
        ));
        assert!(Bitmap::new(RgbaImage::new(10, 0)).is_err());
    }

    #[test]
    fn test_filled_pixel() {
        let bmp = Bitmap::filled(3, 2, [1, 2, 3, 4]).unwrap();
        assert_eq!(bmp.width(), 3);
        assert_eq!(bmp.height(), 2);
        assert_eq!(bmp.pixel(2, 1), [1, 2, 3, 4]);
    }

    #[test]
    fn test_split_rows_last_chunk_shorter() {
        let bmp = Bitmap::filled(8, 250, [0, 0, 0, 255]).unwrap();
        let chunks = bmp.split_rows(100).unwrap();
        let heights: Vec<u32> = chunks.iter().map(|c| c.height()).collect();
        assert_eq!(heights, vec![100, 100, 50]);
    }

    #[test]
    fn test_crop_rows_keeps_content() {
        let mut img = RgbaImage::from_pixel(4, 4, image::Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 2, image::Rgba([0, 0, 0, 255]));
        let bmp = Bitmap::new(img).unwrap();

        let cropped = bmp.crop_rows(2, 2).unwrap();
        assert_eq!(cropped.height(), 2);
        assert_eq!(cropped.pixel(1, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn test_crop_past_end_is_error() {
        let bmp = Bitmap::filled(4, 4, [0, 0, 0, 255]).unwrap();
        assert!(bmp.crop_rows(10, 2).is_err());
    }

    #[test]
    fn test_padded_adds_white_border() {
        let bmp = Bitmap::filled(2, 2, [0, 0, 0, 255]).unwrap();
        let padded = bmp.padded(3).unwrap();
        assert_eq!((padded.width(), padded.height()), (8, 8));
        assert_eq!(padded.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(padded.pixel(3, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn test_png_roundtrip_dimensions() {
        let bmp = Bitmap::filled(5, 7, [10, 20, 30, 255]).unwrap();
        let png = bmp.to_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let decoded = Bitmap::from_bytes(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 7));
    }
}
