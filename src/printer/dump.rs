//! # Dump Raw
//!
//! Writes the command buffer to a file instead of a printer. Useful for
//! inspecting output or feeding it to a printer later with `cat file > /dev/usb/lp0`.

use std::fs;

use log::info;

use super::Printer;
use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct DumpPrinter;

impl Printer for DumpPrinter {
    fn name(&self) -> &str {
        "Dump Raw"
    }

    fn description(&self) -> &str {
        "Dumps the raw commands content to file. Endpoint should be the path to the file that will be written."
    }

    fn print(&self, endpoint: &str, _bitmap: Option<&Bitmap>, data: &[u8]) -> Result<()> {
        if endpoint.is_empty() {
            return Err(PrintError::Parse(
                "please specify a file path as endpoint".into(),
            ));
        }
        fs::write(endpoint, data)?;
        info!("Dumped {} bytes to {}", data.len(), endpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_buffer_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let data = [0x1B, 0x40, 0x0A, 0x00, 0xFF];

        DumpPrinter
            .print(path.to_str().unwrap(), None, &data)
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), data);
    }

    #[test]
    fn test_empty_path_is_error() {
        let err = DumpPrinter.print("", None, &[1]).unwrap_err();
        assert!(matches!(err, PrintError::Parse(_)));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/out.bin");
        let err = DumpPrinter
            .print(path.to_str().unwrap(), None, &[1])
            .unwrap_err();
        assert!(matches!(err, PrintError::Io(_)));
    }
}
