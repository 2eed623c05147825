//! # Raw USB Printing
//!
//! Writes command buffers straight to a printer's bulk OUT endpoint.
//!
//! ## Session Lifecycle
//!
//! ```text
//!            print(addr)                 print(other addr)
//!   Closed ───────────────▶ Open(addr) ─────────────────────▶ Open(other)
//!     ▲                       │   ▲
//!     │  reset / failure      │   │ disconnect: reopen once, retry write
//!     └───────────────────────┘   └──┘
//! ```
//!
//! The open handle is kept between jobs and reused while the endpoint
//! stays the same. All access goes through one mutex, so concurrent jobs
//! are serialized.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};

use super::Printer;
use crate::bitmap::Bitmap;
use crate::error::{PrintError, Result};
use crate::transport::usb::{RusbBus, UsbAddress, UsbBus, UsbHandle, UsbWriteError};

/// How many times a write is retried on a fresh handle after a disconnect.
pub const DISCONNECT_RETRIES: usize = 1;

struct Session<H> {
    address: UsbAddress,
    handle: H,
}

struct State<B: UsbBus> {
    bus: B,
    session: Option<Session<B::Handle>>,
}

impl<B: UsbBus> State<B> {
    /// Current session for `address`, opening (or replacing) it as needed.
    fn session(&mut self, address: &UsbAddress) -> Result<&mut Session<B::Handle>> {
        let session = match self.session.take() {
            Some(session) if session.address == *address => {
                debug!("Reusing USB session {}", address);
                session
            }
            previous => {
                if let Some(old) = previous {
                    info!("USB endpoint changed from {} to {}", old.address, address);
                    drop(old);
                }
                let handle = self.bus.open(address)?;
                info!("Opened USB printer {}", address);
                Session {
                    address: *address,
                    handle,
                }
            }
        };
        Ok(self.session.insert(session))
    }
}

/// USB backend holding at most one open device session.
pub struct UsbPrinter<B: UsbBus = RusbBus> {
    state: Mutex<State<B>>,
}

impl UsbPrinter<RusbBus> {
    pub fn new() -> Self {
        Self::with_bus(RusbBus::new())
    }

    /// libusb backend with a custom bulk write timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_bus(RusbBus::new().with_timeout(timeout))
    }
}

impl Default for UsbPrinter<RusbBus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: UsbBus> UsbPrinter<B> {
    pub fn with_bus(bus: B) -> Self {
        Self {
            state: Mutex::new(State { bus, session: None }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<B>> {
        // A panic mid-write leaves at worst a stale handle, which the next
        // failed write tears down.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Close the session if one is open.
    pub fn reset(&self) {
        if let Some(session) = self.lock().session.take() {
            info!("Closed USB printer {}", session.address);
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().session.is_some()
    }

    /// Address of the open session.
    pub fn session_address(&self) -> Option<UsbAddress> {
        self.lock().session.as_ref().map(|s| s.address)
    }

    /// Write `data` to `address`, opening or reopening the device as needed.
    pub fn write(&self, address: &UsbAddress, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        let mut reopens = 0;

        loop {
            let session = state.session(address)?;
            match session.handle.write(data) {
                Ok(written) if written == data.len() => {
                    debug!("Wrote {} bytes to {}", written, address);
                    return Ok(());
                }
                Ok(written) => {
                    state.session = None;
                    return Err(PrintError::WriteFailed(format!(
                        "short write to {}: {} of {} bytes",
                        address,
                        written,
                        data.len()
                    )));
                }
                Err(UsbWriteError::Disconnected) if reopens < DISCONNECT_RETRIES => {
                    warn!("USB printer {} disconnected, reopening", address);
                    state.session = None;
                    reopens += 1;
                }
                Err(e) => {
                    state.session = None;
                    return Err(PrintError::WriteFailed(format!("{}: {}", address, e)));
                }
            }
        }
    }
}

impl<B: UsbBus> Printer for UsbPrinter<B> {
    fn name(&self) -> &str {
        "Raw USB Printing"
    }

    fn description(&self) -> &str {
        "Print directly to a USB attached printer. Use {vendor_id}:{product_id}:{endpoint_address} like 0416:5011:03."
    }

    fn available_endpoints(&self) -> Result<BTreeMap<String, String>> {
        let printers = self.lock().bus.printers()?;
        Ok(printers
            .into_iter()
            .map(|info| (info.label(), info.address.to_string()))
            .collect())
    }

    fn print(&self, endpoint: &str, _bitmap: Option<&Bitmap>, data: &[u8]) -> Result<()> {
        let address: UsbAddress = endpoint.parse()?;
        self.write(&address, data)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::usb::UsbDeviceInfo;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted write outcome; `None` accepts the whole buffer.
    type Outcome = Option<std::result::Result<usize, UsbWriteError>>;

    #[derive(Default)]
    struct Log {
        opens: Vec<UsbAddress>,
        writes: Vec<(UsbAddress, Vec<u8>)>,
        script: VecDeque<Outcome>,
        open_failures: usize,
    }

    #[derive(Clone, Default)]
    struct MockBus(Arc<Mutex<Log>>);

    struct MockHandle {
        address: UsbAddress,
        log: Arc<Mutex<Log>>,
    }

    impl UsbHandle for MockHandle {
        fn write(&mut self, data: &[u8]) -> std::result::Result<usize, UsbWriteError> {
            let mut log = self.log.lock().unwrap();
            log.writes.push((self.address, data.to_vec()));
            log.script.pop_front().flatten().unwrap_or(Ok(data.len()))
        }
    }

    impl UsbBus for MockBus {
        type Handle = MockHandle;

        fn open(&mut self, address: &UsbAddress) -> Result<MockHandle> {
            let mut log = self.0.lock().unwrap();
            log.opens.push(*address);
            if log.open_failures > 0 {
                log.open_failures -= 1;
                return Err(PrintError::DeviceNotFound(address.to_string()));
            }
            Ok(MockHandle {
                address: *address,
                log: Arc::clone(&self.0),
            })
        }

        fn printers(&mut self) -> Result<Vec<UsbDeviceInfo>> {
            Ok(vec![UsbDeviceInfo {
                bus: 1,
                port: 4,
                product: "TM-T20".to_string(),
                address: "04b8:0e15:01".parse()?,
            }])
        }
    }

    fn printer() -> (UsbPrinter<MockBus>, Arc<Mutex<Log>>) {
        let bus = MockBus::default();
        let log = Arc::clone(&bus.0);
        (UsbPrinter::with_bus(bus), log)
    }

    #[test]
    fn test_session_reused_for_same_address() {
        let (printer, log) = printer();
        printer.print("0416:5011:03", None, &[1, 2]).unwrap();
        printer.print("0416:5011:03", None, &[3]).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.opens.len(), 1);
        assert_eq!(log.writes.len(), 2);
        assert_eq!(log.writes[1].1, vec![3]);
    }

    #[test]
    fn test_address_change_reopens() {
        let (printer, log) = printer();
        printer.print("0416:5011:03", None, &[1]).unwrap();
        printer.print("0416:5011:02", None, &[2]).unwrap();

        assert_eq!(printer.session_address().unwrap().endpoint, 0x02);
        let log = log.lock().unwrap();
        assert_eq!(log.opens.len(), 2);
        assert_eq!(log.writes[1].0.endpoint, 0x02);
    }

    #[test]
    fn test_disconnect_reopens_exactly_once() {
        let (printer, log) = printer();
        log.lock()
            .unwrap()
            .script
            .push_back(Some(Err(UsbWriteError::Disconnected)));

        printer.print("0416:5011:03", None, &[9, 9]).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.opens.len(), 2);
        assert_eq!(log.writes.len(), 2);
        assert!(printer.is_open());
    }

    #[test]
    fn test_second_disconnect_is_write_failed() {
        let (printer, log) = printer();
        {
            let mut log = log.lock().unwrap();
            log.script.push_back(Some(Err(UsbWriteError::Disconnected)));
            log.script.push_back(Some(Err(UsbWriteError::Disconnected)));
        }

        let err = printer.print("0416:5011:03", None, &[1]).unwrap_err();
        assert!(matches!(err, PrintError::WriteFailed(_)), "{:?}", err);
        assert_eq!(log.lock().unwrap().opens.len(), 2);
        assert!(!printer.is_open());
    }

    #[test]
    fn test_reopen_failure_is_device_not_found() {
        let (printer, log) = printer();
        printer.print("0416:5011:03", None, &[1]).unwrap();
        {
            let mut log = log.lock().unwrap();
            log.script.push_back(Some(Err(UsbWriteError::Disconnected)));
            log.open_failures = 1;
        }

        let err = printer.print("0416:5011:03", None, &[2]).unwrap_err();
        assert!(matches!(err, PrintError::DeviceNotFound(_)), "{:?}", err);
        assert!(!printer.is_open());
    }

    #[test]
    fn test_short_write_is_write_failed() {
        let (printer, log) = printer();
        log.lock().unwrap().script.push_back(Some(Ok(1)));

        let err = printer.print("0416:5011:03", None, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, PrintError::WriteFailed(_)));
        // No retry on a short write
        assert_eq!(log.lock().unwrap().writes.len(), 1);
        assert!(!printer.is_open());
    }

    #[test]
    fn test_other_error_is_not_retried() {
        let (printer, log) = printer();
        log.lock()
            .unwrap()
            .script
            .push_back(Some(Err(UsbWriteError::Other("pipe error".into()))));

        let err = printer.print("0416:5011:03", None, &[1]).unwrap_err();
        assert!(matches!(err, PrintError::WriteFailed(ref m) if m.contains("pipe error")));
        assert_eq!(log.lock().unwrap().opens.len(), 1);
    }

    #[test]
    fn test_bad_endpoint_never_touches_bus() {
        let (printer, log) = printer();
        let err = printer.print("0416-5011-03", None, &[1]).unwrap_err();
        assert!(matches!(err, PrintError::Parse(_)));
        assert!(log.lock().unwrap().opens.is_empty());
    }

    #[test]
    fn test_reset_closes_and_is_idempotent() {
        let (printer, log) = printer();
        printer.print("0416:5011:03", None, &[1]).unwrap();
        assert!(printer.is_open());

        printer.reset();
        printer.reset();
        assert!(!printer.is_open());
        assert_eq!(printer.session_address(), None);

        printer.print("0416:5011:03", None, &[1]).unwrap();
        assert_eq!(log.lock().unwrap().opens.len(), 2);
    }

    #[test]
    fn test_discovery_labels() {
        let (printer, _) = printer();
        let endpoints = printer.available_endpoints().unwrap();
        assert_eq!(
            endpoints.get("#4 #1 TM-T20 [04b8:0e15]").map(String::as_str),
            Some("04b8:0e15:01")
        );
    }

    /// Bus whose handles flag writes that overlap in time.
    #[derive(Clone, Default)]
    struct OverlapBus {
        in_flight: Arc<AtomicUsize>,
        overlaps: Arc<AtomicUsize>,
        writes: Arc<AtomicUsize>,
    }

    struct OverlapHandle(OverlapBus);

    impl UsbHandle for OverlapHandle {
        fn write(&mut self, data: &[u8]) -> std::result::Result<usize, UsbWriteError> {
            let bus = &self.0;
            if bus.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                bus.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(5));
            bus.in_flight.fetch_sub(1, Ordering::SeqCst);
            bus.writes.fetch_add(1, Ordering::SeqCst);
            Ok(data.len())
        }
    }

    impl UsbBus for OverlapBus {
        type Handle = OverlapHandle;

        fn open(&mut self, _address: &UsbAddress) -> Result<OverlapHandle> {
            Ok(OverlapHandle(self.clone()))
        }

        fn printers(&mut self) -> Result<Vec<UsbDeviceInfo>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_concurrent_jobs_are_serialized() {
        let bus = OverlapBus::default();
        let printer = UsbPrinter::with_bus(bus.clone());

        std::thread::scope(|scope| {
            for i in 0..8 {
                let printer = &printer;
                scope.spawn(move || {
                    let endpoint = if i % 2 == 0 { "0416:5011:03" } else { "0416:5011:02" };
                    printer.print(endpoint, None, &[i as u8; 16]).unwrap();
                });
            }
        });

        assert_eq!(bus.writes.load(Ordering::SeqCst), 8);
        assert_eq!(bus.overlaps.load(Ordering::SeqCst), 0);
    }
}
