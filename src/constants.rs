//! Teleinfo Protocol Constants
//!
//! This module defines constants used by the Teleinfo (TIC) historic mode
//! implementation, as emitted by Linky and older electronic meters.

/// Start-of-frame control byte (STX)
pub const TIC_START_OF_FRAME: u8 = 0x02;

/// End-of-frame control byte (ETX)
pub const TIC_END_OF_FRAME: u8 = 0x03;

/// End-of-frame immediately followed by the next start-of-frame
pub const TIC_FRAME_BOUNDARY: [u8; 2] = [TIC_END_OF_FRAME, TIC_START_OF_FRAME];

/// Separator between label, value and checksum
pub const TIC_SEPARATOR: u8 = b' ';

/// Line feed, delimits one group (line) on the wire
pub const TIC_LINE_FEED: u8 = b'\n';

/// Carriage return, closes one group on the wire
pub const TIC_CARRIAGE_RETURN: u8 = b'\r';

/// Offset of the checksum character counted from the end of a stripped line
pub const TIC_CHECKSUM_OFFSET_FROM_END: usize = 3;

/// Mask applied to the byte sum before the printable offset is added
pub const TIC_CHECKSUM_MASK: u32 = 0x3F;

/// Offset that makes the checksum printable
pub const TIC_CHECKSUM_PRINTABLE_OFFSET: u32 = 0x20;

// ----------------------------------------------------------------------------
// Field labels
// ----------------------------------------------------------------------------

/// Meter address. Confidential, never persisted.
pub const TIC_FIELD_ADDRESS: &str = "ADCO";

/// Tomorrow's Tempo colour
pub const TIC_FIELD_FORECAST: &str = "DEMAIN";

/// Placeholder sent while tomorrow's colour is not yet known
pub const TIC_FORECAST_PLACEHOLDER: &str = "----";

/// Substituted colour during the nightly window
pub const TIC_FORECAST_STANDARD_DAY: &str = "BLEU";

/// Debug-only entry holding the frame completion time
pub const TIC_FIELD_TIMESTAMP: &str = "timestamp";

// ----------------------------------------------------------------------------
// Serial defaults (historic mode, 1200 7N1)
// ----------------------------------------------------------------------------

pub const TIC_DEFAULT_PORT: &str = "/dev/ttyS0";
pub const TIC_DEFAULT_BAUDRATE: u32 = 1200;
pub const TIC_DEFAULT_READ_TIMEOUT_SECS: u64 = 1;

// ----------------------------------------------------------------------------
// Enrichment defaults
// ----------------------------------------------------------------------------

/// Nightly window start, seconds since midnight (20:05)
pub const NIGHT_WINDOW_START_SECS: u32 = 20 * 3600 + 5 * 60;

/// Nightly window end, seconds since midnight (06:00), exclusive
pub const NIGHT_WINDOW_END_SECS: u32 = 6 * 3600;

/// Current transformer ratio (5 A / 1 V)
pub const AUX_CT_RATIO: f64 = 5.0 / 1.0;

/// Burden correction applied after the transformer ratio
pub const AUX_GAIN: f64 = 1.5;

/// ADS1115 default I2C address (ADDR tied to GND)
pub const ADS1115_DEFAULT_ADDRESS: u16 = 0x48;

// ----------------------------------------------------------------------------
// Store defaults
// ----------------------------------------------------------------------------

pub const STORE_DEFAULT_URL: &str = "http://localhost:8086";
pub const STORE_DEFAULT_DATABASE: &str = "linky";
pub const STORE_DEFAULT_RETRY_DELAY_SECS: u64 = 5;
pub const STORE_DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const STORE_TAG_HOST: (&str, &str) = ("host", "raspberry");
pub const STORE_TAG_REGION: (&str, &str) = ("region", "linky");

/// Name of the single field carried by every point
pub const STORE_VALUE_FIELD: &str = "value";
