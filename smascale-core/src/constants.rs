//! Protocol constants

use std::time::Duration;

/// Line terminator, both directions
pub const EOL: &[u8] = b"\r\n";

/// Default connect and I/O timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Consecutive failed exchanges before the link is recovered
pub const MAX_TIMEOUTS: u32 = 10;

/// Longest response line accepted before giving up on a terminator
pub const MAX_LINE_LEN: usize = 256;

/// Serial line parameters (9600-8-O-1)
pub mod serial {
    use std::time::Duration;

    pub const BAUD_RATE: u32 = 9600;

    /// Per-byte read timeout handed to the OS driver
    pub const BYTE_TIMEOUT: Duration = Duration::from_millis(100);
}

/// Weight frame layout
///
/// ```text
/// K K K K K K + * A A A A A A A A * E E E CR LF
/// ```
///
/// Byte ranges are end-exclusive.
pub mod frame {
    use std::ops::Range;

    /// Total width, terminator included
    pub const LEN: usize = 22;

    /// Id code (`N`, `G` or `Stat`, space padded)
    pub const ID: Range<usize> = 0..6;

    /// Sign and magnitude, spaces used as padding
    pub const MASS: Range<usize> = 6..16;

    /// Unit symbol, blank while the weight is unstable
    pub const UNITS: Range<usize> = 17..20;

    /// Error text inside a `Stat` frame
    pub const FAULT: Range<usize> = 9..14;

    /// Id code of a device status frame
    pub const STATUS_ID: &str = "Stat";
}
