//! # Printer Transport Layer
//!
//! Device and network plumbing underneath the printer backends.
//!
//! ## Available Transports
//!
//! - [`usb`]: libusb bulk transfers, with a bus trait for session tests
//! - [`serial`]: RS232 / USB-serial ports configured through termios
//! - [`http`]: blocking HTTP client with a bounded timeout

pub mod http;
pub mod serial;
pub mod usb;

pub use http::HttpTransport;
pub use serial::SerialPort;
pub use usb::{RusbBus, UsbAddress, UsbBus, UsbHandle};
