//! # Windows Spooler Printing
//!
//! - [`WindowsDirectPrinter`] submits the command buffer as a `RAW`
//!   document through the Win32 print spooler.
//! - [`WindowsImagePrinter`] prints the bitmap through the installed driver
//!   using a PowerShell `System.Drawing` script, scaled to the page width.
//!
//! Both take the printer name as endpoint.

use std::collections::BTreeMap;
use std::io::Write;
use std::process::Command;

use log::{debug, info};

use super::Printer;
use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};

/// White border added around images before they go to the driver.
pub const IMAGE_PADDING: u32 = 30;

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Installed printer names.
pub fn list_printers() -> Result<Vec<String>> {
    use windows::Win32::Graphics::Printing::{
        EnumPrintersW, PRINTER_ENUM_CONNECTIONS, PRINTER_ENUM_LOCAL, PRINTER_INFO_5W,
    };
    use windows::core::PWSTR;

    unsafe {
        let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
        let mut needed: u32 = 0;
        let mut returned: u32 = 0;

        let _ = EnumPrintersW(flags, None, 5, None, &mut needed, &mut returned);
        if needed == 0 {
            return Ok(Vec::new());
        }

        let mut buf: Vec<u8> = vec![0; needed as usize];
        EnumPrintersW(
            flags,
            None,
            5,
            Some(buf.as_mut_slice()),
            &mut needed,
            &mut returned,
        )
        .map_err(|e| PrintError::Transport(format!("EnumPrintersW failed: {}", e)))?;

        let ptr = buf.as_ptr() as *const PRINTER_INFO_5W;
        let infos = std::slice::from_raw_parts(ptr, returned as usize);

        Ok(infos
            .iter()
            .filter(|info| !info.pPrinterName.is_null())
            .filter_map(|info| PWSTR(info.pPrinterName.0).to_string().ok())
            .collect())
    }
}

fn name_map() -> Result<BTreeMap<String, String>> {
    Ok(list_printers()?
        .into_iter()
        .map(|name| (name.clone(), name))
        .collect())
}

/// Send `data` to the spooler as one RAW document.
fn write_raw(printer: &str, data: &[u8]) -> Result<()> {
    use core::ffi::c_void;
    use windows::Win32::Graphics::Printing::{
        ClosePrinter, DOC_INFO_1W, EndDocPrinter, EndPagePrinter, OpenPrinterW, PRINTER_HANDLE,
        StartDocPrinterW, StartPagePrinter, WritePrinter,
    };
    use windows::core::{PCWSTR, PWSTR};

    let name_w = to_wide(printer);
    let doc_name_w = to_wide("printwire");
    let datatype_w = to_wide("RAW");

    unsafe {
        let mut handle = PRINTER_HANDLE::default();
        OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None).map_err(|e| {
            PrintError::DeviceNotFound(format!("printer '{}': {}", printer, e))
        })?;

        let doc_info = DOC_INFO_1W {
            pDocName: PWSTR(doc_name_w.as_ptr() as *mut _),
            pOutputFile: PWSTR::null(),
            pDatatype: PWSTR(datatype_w.as_ptr() as *mut _),
        };

        if StartDocPrinterW(handle, 1, &doc_info as *const DOC_INFO_1W) == 0 {
            let _ = ClosePrinter(handle);
            return Err(PrintError::Transport("StartDocPrinter failed".into()));
        }

        if !StartPagePrinter(handle).as_bool() {
            let _ = EndDocPrinter(handle);
            let _ = ClosePrinter(handle);
            return Err(PrintError::Transport("StartPagePrinter failed".into()));
        }

        let mut written: u32 = 0;
        let ok = WritePrinter(
            handle,
            data.as_ptr() as *const c_void,
            data.len() as u32,
            &mut written,
        );

        let _ = EndPagePrinter(handle);
        let _ = EndDocPrinter(handle);
        let _ = ClosePrinter(handle);

        if !ok.as_bool() {
            return Err(PrintError::WriteFailed(format!("WritePrinter to '{}' failed", printer)));
        }
        if written as usize != data.len() {
            return Err(PrintError::WriteFailed(format!(
                "not all data was written: {} of {} bytes",
                written,
                data.len()
            )));
        }
    }

    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsDirectPrinter;

impl Printer for WindowsDirectPrinter {
    fn name(&self) -> &str {
        "Windows Direct Printing"
    }

    fn description(&self) -> &str {
        "Directly print to an attached printer. Use the Name of the printer as Endpoint."
    }

    fn available_endpoints(&self) -> Result<BTreeMap<String, String>> {
        name_map()
    }

    fn print(&self, endpoint: &str, _bitmap: Option<&Bitmap>, data: &[u8]) -> Result<()> {
        if endpoint.is_empty() {
            return Err(PrintError::Parse("printer name is empty".into()));
        }
        write_raw(endpoint, data)?;
        debug!("Spooled {} bytes to '{}'", data.len(), endpoint);
        Ok(())
    }
}

const PRINT_IMAGE_SCRIPT: &str = r#"
param(
  [Parameter(Mandatory = $true)][string]$ImagePath,
  [Parameter(Mandatory = $true)][string]$PrinterName
)

Add-Type -AssemblyName System.Drawing

$img = [System.Drawing.Image]::FromFile($ImagePath)
$pd = New-Object System.Drawing.Printing.PrintDocument
$pd.PrinterSettings.PrinterName = $PrinterName
$pd.OriginAtMargins = $false
$pd.DefaultPageSettings.Margins = New-Object System.Drawing.Printing.Margins(0,0,0,0)
$pd.PrintController = New-Object System.Drawing.Printing.StandardPrintController

$pd.add_PrintPage({
    param($sender, $e)
    $page = $e.PageBounds
    $scale = [double]$page.Width / [double]$img.Width
    $dh = [int]([Math]::Round([double]$img.Height * $scale))
    $e.Graphics.InterpolationMode = [System.Drawing.Drawing2D.InterpolationMode]::HighQualityBicubic
    $e.Graphics.DrawImage($img, $page.X, $page.Y, [int]$page.Width, $dh)
})

try {
    $pd.Print()
}
finally {
    if ($img) { $img.Dispose() }
    if ($pd)  { $pd.Dispose() }
}
"#;

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsImagePrinter;

impl Printer for WindowsImagePrinter {
    fn name(&self) -> &str {
        "Windows Image Printing"
    }

    fn description(&self) -> &str {
        "Print as image to an attached printer. Use the Name of the printer as endpoint. Can be used for label printing. Make sure to set up the right paper size in the printer driver."
    }

    fn prints_bitmap(&self) -> bool {
        true
    }

    fn available_endpoints(&self) -> Result<BTreeMap<String, String>> {
        name_map()
    }

    fn print(&self, endpoint: &str, bitmap: Option<&Bitmap>, _data: &[u8]) -> Result<()> {
        if endpoint.is_empty() {
            return Err(PrintError::Parse("printer name is empty".into()));
        }
        let bitmap = bitmap
            .ok_or_else(|| PrintError::Image("Windows image printing needs a bitmap".into()))?;

        let mut image = tempfile::Builder::new()
            .prefix("print_")
            .suffix(".png")
            .tempfile()?;
        image.write_all(&bitmap.padded(IMAGE_PADDING)?.to_png()?)?;
        image.flush()?;

        let mut script = tempfile::Builder::new()
            .prefix("print_image_")
            .suffix(".ps1")
            .tempfile()?;
        script.write_all(PRINT_IMAGE_SCRIPT.as_bytes())?;
        script.flush()?;

        let output = Command::new("powershell.exe")
            .args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-File"])
            .arg(script.path())
            .arg(image.path())
            .arg(endpoint)
            .output()
            .map_err(|e| PrintError::Transport(format!("powershell: {}", e)))?;

        if !output.status.success() {
            return Err(PrintError::Transport(format!(
                "image print failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        info!("Printed image to '{}'", endpoint);
        Ok(())
    }
}
