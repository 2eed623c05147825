//! End-to-end tests: settings + bitmap in, bytes on the (mock) wire out.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use printwire::printer::{DumpPrinter, PreviewPrinter, UsbPrinter};
use printwire::transport::usb::{UsbAddress, UsbBus, UsbDeviceInfo, UsbHandle, UsbWriteError};
use printwire::{Bitmap, Dispatcher, PrintError, PrinterCommand, PrinterRegistry, Settings};

const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Bus that records every bulk write.
#[derive(Clone, Default)]
struct RecordingBus {
    opens: Arc<Mutex<Vec<UsbAddress>>>,
    wire: Arc<Mutex<Vec<Vec<u8>>>>,
}

struct RecordingHandle {
    wire: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl UsbHandle for RecordingHandle {
    fn write(&mut self, data: &[u8]) -> Result<usize, UsbWriteError> {
        self.wire.lock().unwrap().push(data.to_vec());
        Ok(data.len())
    }
}

impl UsbBus for RecordingBus {
    type Handle = RecordingHandle;

    fn open(&mut self, address: &UsbAddress) -> printwire::Result<RecordingHandle> {
        self.opens.lock().unwrap().push(*address);
        Ok(RecordingHandle {
            wire: Arc::clone(&self.wire),
        })
    }

    fn printers(&mut self) -> printwire::Result<Vec<UsbDeviceInfo>> {
        Ok(Vec::new())
    }
}

fn usb_setup() -> (Dispatcher, RecordingBus, Settings) {
    let bus = RecordingBus::default();
    let mut registry = PrinterRegistry::new();
    registry.register(Arc::new(UsbPrinter::with_bus(bus.clone())));

    let settings = Settings {
        printer_type: "Raw USB Printing".into(),
        printer_endpoint: "0416:5011:03".into(),
        ..Settings::default()
    };
    (Dispatcher::new(registry), bus, settings)
}

#[test]
fn black_100x50_over_usb() {
    let (dispatcher, bus, mut settings) = usb_setup();
    settings.commands.cut = true;
    let bitmap = Bitmap::filled(100, 50, BLACK).unwrap();

    dispatcher.print(&settings, &bitmap).unwrap();

    let wire = bus.wire.lock().unwrap();
    assert_eq!(wire.len(), 1);
    let job = &wire[0];

    // 100 px -> 104 aligned -> 13 bytes per row
    assert_eq!(&job[..8], &[0x1D, 0x76, 0x30, 0x30, 0x0D, 0x00, 0x32, 0x00]);

    let rows = &job[8..8 + 13 * 50];
    for row in rows.chunks(13) {
        // 96 dark pixels, then 4 dark + 4 pad bits
        assert!(row[..12].iter().all(|&b| b == 0xFF));
        assert_eq!(row[12], 0xF0);
    }

    let mut suffix = vec![0x0A; 5];
    suffix.extend([0x1B, 0x6D, 0x0A]);
    assert_eq!(&job[8 + 650..], suffix.as_slice());

    let opens = bus.opens.lock().unwrap();
    assert_eq!(opens.len(), 1);
    assert_eq!(opens[0].vendor_id, 0x0416);
    assert_eq!(opens[0].product_id, 0x5011);
    assert_eq!(opens[0].endpoint, 0x03);
}

#[test]
fn black_104x50_is_all_ff() {
    let (dispatcher, bus, settings) = usb_setup();
    let bitmap = Bitmap::filled(104, 50, BLACK).unwrap();

    dispatcher.print(&settings, &bitmap).unwrap();

    let wire = bus.wire.lock().unwrap();
    let job = &wire[0];
    assert_eq!(&job[..8], &[0x1D, 0x76, 0x30, 0x30, 0x0D, 0x00, 0x32, 0x00]);
    assert!(job[8..8 + 650].iter().all(|&b| b == 0xFF));
    assert_eq!(&job[8 + 650..], &[0x0A; 5]);
}

#[test]
fn usb_session_is_reused_across_jobs() {
    let (dispatcher, bus, settings) = usb_setup();
    let bitmap = Bitmap::filled(64, 10, BLACK).unwrap();

    dispatcher.print(&settings, &bitmap).unwrap();
    dispatcher
        .send_command(&settings, PrinterCommand::Cut)
        .unwrap();

    assert_eq!(bus.opens.lock().unwrap().len(), 1);
    let wire = bus.wire.lock().unwrap();
    assert_eq!(wire[1], vec![0x1B, 0x6D, 0x0A]);
}

#[test]
fn unknown_printer_never_reaches_usb() {
    let (dispatcher, bus, mut settings) = usb_setup();
    settings.printer_type = "Raw Bluetooth Printing".into();
    let bitmap = Bitmap::filled(64, 10, BLACK).unwrap();

    let err = dispatcher.print(&settings, &bitmap).unwrap_err();
    assert!(matches!(err, PrintError::PrinterNotFound(_)));
    assert!(bus.opens.lock().unwrap().is_empty());
    assert!(bus.wire.lock().unwrap().is_empty());
}

#[test]
fn dump_backend_writes_same_bytes_as_build_commands() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job.bin");

    let mut registry = PrinterRegistry::new();
    registry.register(Arc::new(DumpPrinter));
    let dispatcher = Dispatcher::new(registry);

    let mut settings = Settings {
        printer_type: "Dump Raw".into(),
        printer_endpoint: path.to_str().unwrap().into(),
        ..Settings::default()
    };
    settings.commands.explicit_init = true;
    settings.commands.lines_before = 1;

    let bitmap = Bitmap::filled(60, 30, BLACK).unwrap();
    dispatcher.print(&settings, &bitmap).unwrap();

    let expected = dispatcher.build_commands(&settings, &bitmap).unwrap();
    assert_eq!(expected.len(), 1);
    assert_eq!(std::fs::read(&path).unwrap(), expected[0]);
    assert_eq!(&expected[0][..4], &[0x1B, 0x40, 0x0A, 0x0A]);
}

#[test]
fn settings_file_drives_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("settings.json");
    let out_path = dir.path().join("out.bin");

    std::fs::write(
        &settings_path,
        format!(
            r#"{{"printerType": "Dump Raw", "printerEndpoint": {:?}, "commands": {{"cut": true}}}}"#,
            out_path.to_str().unwrap()
        ),
    )
    .unwrap();

    let settings = Settings::load(&settings_path).unwrap();
    let dispatcher = Dispatcher::new(PrinterRegistry::with_defaults());
    dispatcher
        .print(&settings, &Bitmap::filled(50, 2, BLACK).unwrap())
        .unwrap();

    let written = std::fs::read(&out_path).unwrap();
    assert!(written.ends_with(&[0x1B, 0x6D, 0x0A]));
}

#[test]
fn split_preview_keeps_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("preview.png");

    let mut registry = PrinterRegistry::new();
    registry.register(Arc::new(PreviewPrinter));
    let dispatcher = Dispatcher::new(registry);

    let mut settings = Settings {
        printer_type: "Preview Printing".into(),
        printer_endpoint: path.to_str().unwrap().into(),
        ..Settings::default()
    };
    settings.commands.split_printing = true;
    settings.commands.split_height = 100;

    dispatcher
        .print(&settings, &Bitmap::filled(64, 250, BLACK).unwrap())
        .unwrap();

    let written = Bitmap::open(&path).unwrap();
    assert_eq!((written.width(), written.height()), (64, 250));
}
