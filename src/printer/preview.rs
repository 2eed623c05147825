//! # Preview Printing
//!
//! Renders what the printer would put on paper into a PNG instead of
//! printing. The image is thresholded exactly like the raster encoder, so
//! the preview shows the real dot pattern.
//!
//! The endpoint is the output path. Leave it empty (or `window`) to write a
//! uniquely named file in the system temp directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::info;

use super::Printer;
use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};
use crate::protocol::raster;

/// Endpoint value meaning "pick a temp file".
pub const WINDOW_ENDPOINT: &str = "window";

/// Where a preview for `endpoint` is written.
pub fn output_path(endpoint: &str) -> PathBuf {
    match endpoint.trim() {
        "" | WINDOW_ENDPOINT => {
            std::env::temp_dir().join(format!("printwire-preview-{}.png", uuid::Uuid::new_v4()))
        }
        path => PathBuf::from(path),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PreviewPrinter;

impl Printer for PreviewPrinter {
    fn name(&self) -> &str {
        "Preview Printing"
    }

    fn description(&self) -> &str {
        "Instead of printing write a PNG with the result. Endpoint is the output file; leave empty for a temporary file."
    }

    fn prints_bitmap(&self) -> bool {
        true
    }

    fn available_endpoints(&self) -> Result<BTreeMap<String, String>> {
        Ok(BTreeMap::from([(
            "Preview Printing".to_string(),
            WINDOW_ENDPOINT.to_string(),
        )]))
    }

    fn print(&self, endpoint: &str, bitmap: Option<&Bitmap>, _data: &[u8]) -> Result<()> {
        let bitmap =
            bitmap.ok_or_else(|| PrintError::Image("preview needs a bitmap".into()))?;
        let path = output_path(endpoint);

        raster::monochrome(bitmap)?.save_png(&path)?;
        info!("Preview written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_thresholded_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");

        // Light grey prints as white, dark grey as black
        let mut image = image::RgbaImage::from_pixel(10, 4, image::Rgba([200, 200, 200, 255]));
        image.put_pixel(3, 1, image::Rgba([40, 40, 40, 255]));
        let bitmap = Bitmap::new(image).unwrap();

        PreviewPrinter
            .print(path.to_str().unwrap(), Some(&bitmap), &[])
            .unwrap();

        let written = Bitmap::open(&path).unwrap();
        assert_eq!(written.width(), 10);
        assert_eq!(written.height(), 4);
        assert_eq!(written.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(written.pixel(3, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn test_default_path_is_in_temp_dir() {
        let a = output_path("");
        let b = output_path("window");
        assert!(a.starts_with(std::env::temp_dir()));
        assert_ne!(a, b);
        assert_eq!(output_path("/tmp/x.png"), PathBuf::from("/tmp/x.png"));
    }

    #[test]
    fn test_requires_bitmap() {
        assert!(matches!(
            PreviewPrinter.print("", None, &[0x1B]),
            Err(PrintError::Image(_))
        ));
    }
}
