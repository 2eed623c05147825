//! # Serial Port Transport
//!
//! Opens an RS232 / USB-serial port with explicit framing for the serial
//! printer backend.
//!
//! ## TTY Configuration (unix)
//!
//! The port is opened in raw mode so binary raster data passes unmodified:
//!
//! - **No input processing**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR,
//!   ICRNL and XON/XOFF flow control are cleared
//! - **No output processing**: OPOST cleared (no CR/LF translation)
//! - **Non-canonical, no echo**: ECHO, ECHONL, ICANON, ISIG, IEXTEN cleared
//! - **Framing**: baud rate, data bits, parity and stop bits from
//!   [`SerialConfig`]
//!
//! XON/XOFF must stay off: 0x11 and 0x13 appear in raster data.
//!
//! ## COM Port Configuration (windows)
//!
//! The same framing is applied through `GetCommState` / `SetCommState`.
//! Binary mode is forced and XON/XOFF is cleared. Framing the driver does
//! not accept fails the open instead of falling back to the port defaults.

use std::fs::{File, OpenOptions};
use std::io::Write;

#[cfg(unix)]
use std::io;

use crate::error::{PrintError, Result};

/// Parity bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    /// Endpoint grammar code: `N`, `O`, `E`, `M` or `S`.
    pub fn from_code(c: char) -> Option<Self> {
        match c {
            'N' => Some(Parity::None),
            'O' => Some(Parity::Odd),
            'E' => Some(Parity::Even),
            'M' => Some(Parity::Mark),
            'S' => Some(Parity::Space),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }
}

/// Stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
    OnePointFive,
}

impl StopBits {
    /// Endpoint grammar code: `1` = one, `2` = two, `3` = one and a half.
    pub fn from_code(c: char) -> Option<Self> {
        match c {
            '1' => Some(StopBits::One),
            '2' => Some(StopBits::Two),
            '3' => Some(StopBits::OnePointFive),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            StopBits::One => '1',
            StopBits::Two => '2',
            StopBits::OnePointFive => '3',
        }
    }
}

/// Line framing for a serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: u8,
    pub stop_bits: StopBits,
}

impl Default for SerialConfig {
    /// 9600 8N1
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: Parity::None,
            data_bits: 8,
            stop_bits: StopBits::One,
        }
    }
}

/// # Serial Port
///
/// Write-only handle to a configured port. Closed on drop.
pub struct SerialPort {
    file: File,
}

impl SerialPort {
    /// Open `path` and apply `config`.
    ///
    /// ## Errors
    ///
    /// Returns [`PrintError::Transport`] if:
    /// - The port doesn't exist or is busy
    /// - Permission denied (may need the dialout group)
    /// - The framing is not supported by the platform
    pub fn open(path: &str, config: &SerialConfig) -> Result<Self> {
        let file = open_port(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            configure_tty(file.as_raw_fd(), config)?;
        }
        #[cfg(windows)]
        {
            use std::os::windows::io::AsRawHandle;
            configure_comm(file.as_raw_handle(), config)
                .map_err(|e| PrintError::Transport(format!("{}: {}", path, e)))?;
        }

        Ok(Self { file })
    }

    /// Write one chunk, returning the number of bytes accepted.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<usize> {
        let n = self
            .file
            .write(data)
            .map_err(|e| PrintError::WriteFailed(format!("serial write: {}", e)))?;
        Ok(n)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| PrintError::WriteFailed(format!("serial flush: {}", e)))
    }
}

#[cfg(unix)]
fn open_port(path: &str) -> Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(path)
        .map_err(|e| PrintError::Transport(format!("Failed to open {}: {}", path, e)))
}

#[cfg(windows)]
fn open_port(path: &str) -> Result<File> {
    // COM10 and above are only reachable through the device namespace
    let device = if path.starts_with(r"\\.\") {
        path.to_string()
    } else {
        format!(r"\\.\{}", path)
    };

    OpenOptions::new()
        .write(true)
        .open(&device)
        .map_err(|e| PrintError::Transport(format!("Failed to open {}: {}", path, e)))
}

#[cfg(unix)]
fn baud_constant(baud: u32) -> Result<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        460800 => libc::B460800,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        500000 => libc::B500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        576000 => libc::B576000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        921600 => libc::B921600,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1000000 => libc::B1000000,
        other => {
            return Err(PrintError::Transport(format!(
                "unsupported baud rate {}",
                other
            )));
        }
    };
    Ok(speed)
}

#[cfg(unix)]
fn data_bits_flag(bits: u8) -> Result<libc::tcflag_t> {
    match bits {
        5 => Ok(libc::CS5),
        6 => Ok(libc::CS6),
        7 => Ok(libc::CS7),
        8 => Ok(libc::CS8),
        other => Err(PrintError::Transport(format!(
            "unsupported data bits {}",
            other
        ))),
    }
}

#[cfg(all(unix, any(target_os = "linux", target_os = "android")))]
fn parity_flags(parity: Parity) -> Result<libc::tcflag_t> {
    Ok(match parity {
        Parity::None => 0,
        Parity::Even => libc::PARENB,
        Parity::Odd => libc::PARENB | libc::PARODD,
        Parity::Mark => libc::PARENB | libc::PARODD | libc::CMSPAR,
        Parity::Space => libc::PARENB | libc::CMSPAR,
    })
}

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
fn parity_flags(parity: Parity) -> Result<libc::tcflag_t> {
    match parity {
        Parity::None => Ok(0),
        Parity::Even => Ok(libc::PARENB),
        Parity::Odd => Ok(libc::PARENB | libc::PARODD),
        Parity::Mark | Parity::Space => Err(PrintError::Transport(format!(
            "parity {:?} is not supported on this platform",
            parity
        ))),
    }
}

#[cfg(unix)]
fn stop_bits_flag(stop_bits: StopBits) -> Result<libc::tcflag_t> {
    match stop_bits {
        StopBits::One => Ok(0),
        StopBits::Two => Ok(libc::CSTOPB),
        StopBits::OnePointFive => Err(PrintError::Transport(
            "1.5 stop bits are not supported by termios".to_string(),
        )),
    }
}

/// Configure a file descriptor for raw TTY mode with the given framing.
#[cfg(unix)]
fn configure_tty(fd: i32, config: &SerialConfig) -> Result<()> {
    use std::mem::MaybeUninit;

    let speed = baud_constant(config.baud_rate)?;
    let size = data_bits_flag(config.data_bits)?;
    let parity = parity_flags(config.parity)?;
    let stop = stop_bits_flag(config.stop_bits)?;

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        return Err(PrintError::Transport(format!(
            "tcgetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);

    termios.c_oflag &= !libc::OPOST;

    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);

    termios.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::PARODD | libc::CSTOPB);
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        termios.c_cflag &= !libc::CMSPAR;
    }
    termios.c_cflag |= libc::CREAD | libc::CLOCAL | size | parity | stop;

    let result = unsafe {
        libc::cfsetispeed(&mut termios, speed) | libc::cfsetospeed(&mut termios, speed)
    };
    if result != 0 {
        return Err(PrintError::Transport(format!(
            "cfsetspeed failed: {}",
            io::Error::last_os_error()
        )));
    }

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(PrintError::Transport(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// `DCB` flag bits.
#[cfg(windows)]
const DCB_BINARY: u32 = 1 << 0;
#[cfg(windows)]
const DCB_PARITY_CHECK: u32 = 1 << 1;
#[cfg(windows)]
const DCB_OUT_X: u32 = 1 << 8;
#[cfg(windows)]
const DCB_IN_X: u32 = 1 << 9;

/// Apply `config` to an open COM port handle.
#[cfg(windows)]
fn configure_comm(handle: std::os::windows::io::RawHandle, config: &SerialConfig) -> Result<()> {
    use windows::Win32::Devices::Communication::{
        DCB, EVENPARITY, GetCommState, MARKPARITY, NOPARITY, ODDPARITY, ONE5STOPBITS, ONESTOPBIT,
        SPACEPARITY, SetCommState, TWOSTOPBITS,
    };
    use windows::Win32::Foundation::HANDLE;

    if !(5..=8).contains(&config.data_bits) {
        return Err(PrintError::Transport(format!(
            "unsupported data bits {}",
            config.data_bits
        )));
    }

    let handle = HANDLE(handle);
    let mut dcb = DCB {
        DCBlength: std::mem::size_of::<DCB>() as u32,
        ..Default::default()
    };

    unsafe { GetCommState(handle, &mut dcb) }
        .map_err(|e| PrintError::Transport(format!("GetCommState failed: {}", e)))?;

    dcb.BaudRate = config.baud_rate;
    dcb.ByteSize = config.data_bits;
    dcb.Parity = match config.parity {
        Parity::None => NOPARITY,
        Parity::Odd => ODDPARITY,
        Parity::Even => EVENPARITY,
        Parity::Mark => MARKPARITY,
        Parity::Space => SPACEPARITY,
    };
    dcb.StopBits = match config.stop_bits {
        StopBits::One => ONESTOPBIT,
        StopBits::Two => TWOSTOPBITS,
        StopBits::OnePointFive => ONE5STOPBITS,
    };

    dcb._bitfield |= DCB_BINARY;
    dcb._bitfield &= !(DCB_OUT_X | DCB_IN_X | DCB_PARITY_CHECK);
    if config.parity != Parity::None {
        dcb._bitfield |= DCB_PARITY_CHECK;
    }

    unsafe { SetCommState(handle, &dcb) }
        .map_err(|e| PrintError::Transport(format!("SetCommState rejected {:?}: {}", config, e)))?;

    Ok(())
}

/// Device name prefixes that are serial ports.
#[cfg(unix)]
const PORT_PREFIXES: &[&str] = &["ttyS", "ttyUSB", "ttyACM", "ttyAMA", "cu."];

/// List serial ports present on this machine.
#[cfg(unix)]
pub fn list_ports() -> Result<Vec<String>> {
    let mut ports: Vec<String> = std::fs::read_dir("/dev")?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| PORT_PREFIXES.iter().any(|prefix| name.starts_with(prefix)))
        .map(|name| format!("/dev/{}", name))
        .collect();
    ports.sort();
    Ok(ports)
}

/// List serial ports present on this machine.
#[cfg(windows)]
pub fn list_ports() -> Result<Vec<String>> {
    // Probe COM1..COM32 by opening them; busy ports still count.
    let ports = (1..=32)
        .map(|n| format!("COM{}", n))
        .filter(|port| match open_port(port) {
            Ok(_) => true,
            Err(PrintError::Transport(msg)) => msg.contains("denied"),
            Err(_) => false,
        })
        .collect();
    Ok(ports)
}

// ============================================================================
// TESTS
// ============================================================================
