//! # USB Bulk Transport
//!
//! Device-level access for the raw USB printer backend. The backend only
//! talks to the [`UsbBus`] and [`UsbHandle`] traits; [`RusbBus`] is the
//! libusb implementation used in production.
//!
//! ## Endpoint Address
//!
//! A device pipe is named `VVVV:PPPP:EE` (vendor id, product id, OUT
//! endpoint address, all hex), e.g. `0416:5011:03`.
//!
//! ## Disconnects
//!
//! A printer that was power-cycled or replugged keeps its old handle alive
//! until the next write, which then fails with `LIBUSB_ERROR_NO_DEVICE`.
//! [`UsbWriteError::Disconnected`] carries that case up to the backend so it
//! can reopen the device.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use rusb::{Context, DeviceHandle, Direction, UsbContext};

use crate::error::{PrintError, Result};

/// USB interface class code for printers.
pub const PRINTER_CLASS: u8 = 0x07;

/// Default bulk write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ADDRESS GRAMMAR
// ============================================================================

/// # USB Printer Address (`VVVV:PPPP:EE`)
///
/// ```
/// use printwire::transport::usb::UsbAddress;
///
/// let addr: UsbAddress = "0416:5011:03".parse()?;
/// assert_eq!(addr.vendor_id, 0x0416);
/// assert_eq!(addr.product_id, 0x5011);
/// assert_eq!(addr.endpoint, 0x03);
/// assert_eq!(addr.to_string(), "0416:5011:03");
/// # Ok::<(), printwire::PrintError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbAddress {
    pub vendor_id: u16,
    pub product_id: u16,
    pub endpoint: u8,
}

impl FromStr for UsbAddress {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [vendor, product, endpoint] = parts.as_slice() else {
            return Err(PrintError::Parse(format!(
                "expected VVVV:PPPP:EE, got '{}'",
                s
            )));
        };

        let vendor_id = parse_hex_u16(vendor, "vendor id")?;
        let product_id = parse_hex_u16(product, "product id")?;
        let endpoint = parse_hex(endpoint, 2, "endpoint address")? as u8;

        Ok(Self {
            vendor_id,
            product_id,
            endpoint,
        })
    }
}

impl fmt::Display for UsbAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x}:{:02x}",
            self.vendor_id, self.product_id, self.endpoint
        )
    }
}

fn parse_hex_u16(s: &str, what: &str) -> Result<u16> {
    parse_hex(s, 4, what).map(|v| v as u16)
}

/// Parse 1..=`max_digits` hex digits.
fn parse_hex(s: &str, max_digits: usize, what: &str) -> Result<u32> {
    if s.is_empty() || s.len() > max_digits || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(PrintError::Parse(format!("couldn't parse {} '{}'", what, s)));
    }
    u32::from_str_radix(s, 16)
        .map_err(|e| PrintError::Parse(format!("couldn't parse {} '{}': {}", what, s, e)))
}

// ============================================================================
// BUS ABSTRACTION
// ============================================================================

/// Why a bulk write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsbWriteError {
    /// The device went away (replug, power cycle)
    Disconnected,
    /// Any other transfer error
    Other(String),
}

impl fmt::Display for UsbWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsbWriteError::Disconnected => f.write_str("device disconnected"),
            UsbWriteError::Other(msg) => f.write_str(msg),
        }
    }
}

/// An open OUT endpoint.
pub trait UsbHandle: Send {
    /// Write `data`, returning how many bytes the device accepted.
    fn write(&mut self, data: &[u8]) -> std::result::Result<usize, UsbWriteError>;
}

/// A printer-class OUT endpoint found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    pub bus: u8,
    pub port: u8,
    pub product: String,
    pub address: UsbAddress,
}

impl UsbDeviceInfo {
    /// Discovery label: `#<port> #<bus> <product> [vvvv:pppp]`.
    pub fn label(&self) -> String {
        format!(
            "#{} #{} {} [{:04x}:{:04x}]",
            self.port, self.bus, self.product, self.address.vendor_id, self.address.product_id
        )
    }
}

/// Enumerates and opens USB devices.
pub trait UsbBus: Send {
    type Handle: UsbHandle;

    /// Open the first device matching vendor and product, claim its default
    /// interface and return a handle writing to `address.endpoint`.
    ///
    /// Returns [`PrintError::DeviceNotFound`] when nothing matches.
    fn open(&mut self, address: &UsbAddress) -> Result<Self::Handle>;

    /// List printer-class OUT endpoints.
    fn printers(&mut self) -> Result<Vec<UsbDeviceInfo>>;
}

// ============================================================================
// LIBUSB IMPLEMENTATION
// ============================================================================

/// [`UsbBus`] backed by libusb. The context is created on first use.
pub struct RusbBus {
    context: Option<Context>,
    timeout: Duration,
}

impl Default for RusbBus {
    fn default() -> Self {
        Self {
            context: None,
            timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl RusbBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk write timeout for handles opened after this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn context(&mut self) -> Result<Context> {
        if let Some(context) = &self.context {
            return Ok(context.clone());
        }
        let context = Context::new()
            .map_err(|e| PrintError::Transport(format!("libusb init failed: {}", e)))?;
        self.context = Some(context.clone());
        Ok(context)
    }
}

/// Whether `endpoint` is among `endpoints` as an OUT endpoint.
fn has_out_endpoint<I>(endpoints: I, endpoint: u8) -> bool
where
    I: IntoIterator<Item = (u8, Direction)>,
{
    endpoints
        .into_iter()
        .any(|(addr, direction)| addr == endpoint && direction == Direction::Out)
}

fn usb_error(action: &str, e: rusb::Error) -> PrintError {
    PrintError::Transport(format!("{} failed: {}", action, e))
}

impl UsbBus for RusbBus {
    type Handle = RusbHandle;

    fn open(&mut self, address: &UsbAddress) -> Result<RusbHandle> {
        let context = self.context()?;
        let devices = context
            .devices()
            .map_err(|e| usb_error("device enumeration", e))?;

        let mut matching = devices.iter().filter(|device| {
            device
                .device_descriptor()
                .map(|desc| {
                    desc.vendor_id() == address.vendor_id && desc.product_id() == address.product_id
                })
                .unwrap_or(false)
        });

        let device = matching
            .next()
            .ok_or_else(|| PrintError::DeviceNotFound(format!("usb printer {} not found", address)))?;

        let extra = matching.count();
        if extra > 0 {
            debug!("{} additional devices match {}, using the first", extra, address);
        }

        let config = device
            .config_descriptor(0)
            .map_err(|e| usb_error("config descriptor", e))?;
        let endpoints = config
            .interfaces()
            .filter(|iface| iface.number() == 0)
            .flat_map(|iface| iface.descriptors().collect::<Vec<_>>())
            .flat_map(|setting| {
                setting
                    .endpoint_descriptors()
                    .map(|ep| (ep.address(), ep.direction()))
                    .collect::<Vec<_>>()
            });
        if !has_out_endpoint(endpoints, address.endpoint) {
            return Err(PrintError::DeviceNotFound(format!(
                "usb printer {} has no OUT endpoint {:02x} on interface 0",
                address, address.endpoint
            )));
        }

        let mut handle = device.open().map_err(|e| usb_error("open", e))?;

        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(e) => return Err(usb_error("kernel driver detach", e)),
        }
        handle
            .claim_interface(0)
            .map_err(|e| usb_error("claim interface", e))?;

        debug!(
            "Opened USB device {} on bus {} port {}",
            address,
            device.bus_number(),
            device.port_number()
        );

        Ok(RusbHandle {
            handle,
            endpoint: address.endpoint,
            timeout: self.timeout,
        })
    }

    fn printers(&mut self) -> Result<Vec<UsbDeviceInfo>> {
        let context = self.context()?;
        let devices = context
            .devices()
            .map_err(|e| usb_error("device enumeration", e))?;

        let mut found = Vec::new();
        for device in devices.iter() {
            let Ok(desc) = device.device_descriptor() else {
                continue;
            };

            // Only the first configuration: thermal printers are simple
            // single-config devices.
            let Ok(config) = device.config_descriptor(0) else {
                continue;
            };
            let Some(setting) = config
                .interfaces()
                .next()
                .and_then(|iface| iface.descriptors().next())
            else {
                continue;
            };
            if setting.class_code() != PRINTER_CLASS {
                continue;
            }

            let product = device
                .open()
                .ok()
                .and_then(|h| h.read_product_string_ascii(&desc).ok())
                .unwrap_or_else(|| "USB Printer".to_string());

            for endpoint in setting.endpoint_descriptors() {
                if endpoint.direction() != Direction::Out {
                    continue;
                }
                found.push(UsbDeviceInfo {
                    bus: device.bus_number(),
                    port: device.port_number(),
                    product: product.clone(),
                    address: UsbAddress {
                        vendor_id: desc.vendor_id(),
                        product_id: desc.product_id(),
                        endpoint: endpoint.address(),
                    },
                });
            }
        }

        Ok(found)
    }
}

/// Claimed libusb device handle.
pub struct RusbHandle {
    handle: DeviceHandle<Context>,
    endpoint: u8,
    timeout: Duration,
}

impl UsbHandle for RusbHandle {
    fn write(&mut self, data: &[u8]) -> std::result::Result<usize, UsbWriteError> {
        match self.handle.write_bulk(self.endpoint, data, self.timeout) {
            Ok(n) => Ok(n),
            Err(rusb::Error::NoDevice) => Err(UsbWriteError::Disconnected),
            Err(e) => Err(UsbWriteError::Other(e.to_string())),
        }
    }
}

impl Drop for RusbHandle {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(0) {
            debug!("release interface: {}", e);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
