//! # ESC/POS Control Commands
//!
//! Small fixed byte sequences the dispatcher places around an encoded image:
//! initialisation, standard mode, line feeds, paper cut and cash drawer
//! pulses.
//!
//! ## Escape Sequence Structure
//!
//! - Single byte: `LF`
//! - Two bytes plus terminator: `ESC @ LF`, `ESC S LF`, `ESC m LF`
//! - Multi-byte with parameters: `ESC p m t1 t2`
//!
//! The trailing `LF` after init, standard mode and cut is part of the
//! sequence the supported printers expect. Changing it shifts paper
//! position on real hardware.

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix (graphics)
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - Print and advance one line
pub const LF: u8 = 0x0A;

/// Line feeds always appended after the final image chunk, before
/// `lines_after`, so the image clears the tear bar.
pub const TRAILING_FEED_LINES: usize = 5;

// ============================================================================
// INITIALIZATION COMMANDS
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Re-initialises the printer and aborts any outstanding commands.
///
/// | Format  | Bytes       |
/// |---------|-------------|
/// | ASCII   | ESC @ LF    |
/// | Hex     | 1B 40 0A    |
///
/// ```
/// use printwire::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40, 0x0A]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@', LF]
}

/// # Select Standard Mode (ESC S)
///
/// Leaves page mode. In standard mode the printer prints data as soon as
/// it arrives.
///
/// | Format  | Bytes       |
/// |---------|-------------|
/// | ASCII   | ESC S LF    |
/// | Hex     | 1B 53 0A    |
#[inline]
pub fn standard_mode() -> Vec<u8> {
    vec![ESC, b'S', LF]
}

// ============================================================================
// PAPER CONTROL
// ============================================================================

/// # Cut Paper (ESC m)
///
/// Cuts the paper on printers with an auto-cutter; ignored otherwise.
///
/// | Format  | Bytes       |
/// |---------|-------------|
/// | ASCII   | ESC m LF    |
/// | Hex     | 1B 6D 0A    |
#[inline]
pub fn cut() -> Vec<u8> {
    vec![ESC, b'm', LF]
}

/// `n` bare line feeds.
///
/// ```
/// use printwire::protocol::commands;
///
/// assert_eq!(commands::line_feeds(3), vec![0x0A, 0x0A, 0x0A]);
/// assert!(commands::line_feeds(0).is_empty());
/// ```
#[inline]
pub fn line_feeds(n: usize) -> Vec<u8> {
    vec![LF; n]
}

// ============================================================================
// CASH DRAWER
// ============================================================================

/// Drawer kick-out connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawerPin {
    /// Connector pin 2 (drawer 1)
    Pin2,
    /// Connector pin 5 (drawer 2)
    Pin5,
}

impl DrawerPin {
    #[inline]
    const fn selector(self) -> u8 {
        match self {
            DrawerPin::Pin2 => 0x00,
            DrawerPin::Pin5 => 0x01,
        }
    }
}

/// Default pulse: ~100ms on, ~250ms off.
pub const DEFAULT_PULSE_ON: u8 = 2;
pub const DEFAULT_PULSE_OFF: u8 = 5;

/// # Generate Pulse (ESC p m t1 t2)
///
/// Pulses the drawer kick-out connector. `on` and `off` are in units of
/// roughly 50ms.
///
/// | Format  | Bytes             |
/// |---------|-------------------|
/// | ASCII   | ESC p m t1 t2     |
/// | Hex     | 1B 70 m t1 t2     |
///
/// ```
/// use printwire::protocol::commands::{self, DrawerPin};
///
/// assert_eq!(
///     commands::open_cash_drawer_with_pulse(DrawerPin::Pin5, 25, 250),
///     vec![0x1B, 0x70, 0x01, 25, 250]
/// );
/// ```
#[inline]
pub fn open_cash_drawer_with_pulse(pin: DrawerPin, on: u8, off: u8) -> Vec<u8> {
    vec![ESC, b'p', pin.selector(), on, off]
}

/// Pulse a drawer with the default timing.
#[inline]
pub fn open_cash_drawer(pin: DrawerPin) -> Vec<u8> {
    open_cash_drawer_with_pulse(pin, DEFAULT_PULSE_ON, DEFAULT_PULSE_OFF)
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Encode a u16 value as little-endian bytes [low, high]
///
/// ```
/// use printwire::protocol::commands::u16_le;
///
/// assert_eq!(u16_le(0x1234), [0x34, 0x12]);
/// assert_eq!(u16_le(576), [0x40, 0x02]);
/// ```
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert_eq!(init(), vec![0x1B, 0x40, 0x0A]);
    }

    #[test]
    fn test_standard_mode() {
        assert_eq!(standard_mode(), vec![0x1B, 0x53, 0x0A]);
    }

    #[test]
    fn test_cut() {
        assert_eq!(cut(), vec![0x1B, 0x6D, 0x0A]);
    }

    #[test]
    fn test_cash_drawer_defaults() {
        assert_eq!(
            open_cash_drawer(DrawerPin::Pin2),
            vec![0x1B, 0x70, 0x00, 0x02, 0x05]
        );
        assert_eq!(
            open_cash_drawer(DrawerPin::Pin5),
            vec![0x1B, 0x70, 0x01, 0x02, 0x05]
        );
    }

    #[test]
    fn test_line_feeds() {
        assert_eq!(line_feeds(TRAILING_FEED_LINES), vec![LF; 5]);
    }

    #[test]
    fn test_u16_le() {
        assert_eq!(u16_le(0x0000), [0x00, 0x00]);
        assert_eq!(u16_le(0x00FF), [0xFF, 0x00]);
        assert_eq!(u16_le(0xFF00), [0x00, 0xFF]);
    }
}
