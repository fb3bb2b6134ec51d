//! Fixed-point value codec
//!
//! Sensor values travel as `value × 10` in 14 bits, split across two bytes
//! whose high bit is always clear:
//!
//! ```text
//! byte 0: 0 b13 b12 b11 b10 b9 b8 b7
//! byte 1: 0  b6  b5  b4  b3 b2 b1 b0
//! ```
//!
//! The representable range is therefore `0.0..=1638.3` in steps of `0.1`.

/// Largest raw 14-bit value
const RAW_MAX: u16 = 0x3FFF;

/// Largest value the codec can represent
pub const MAX_VALUE: f64 = RAW_MAX as f64 / 10.0;

/// Added before truncation so exact tenths such as `2.3` don't land one step low
const ROUNDING_GUARD: f64 = 1e-6;

/// Convert a value to its raw 14-bit fixed-point integer
///
/// Negative and NaN inputs map to `0`; inputs above [`MAX_VALUE`] saturate
/// to `0x3FFF`. The fractional part below one tenth is truncated.
pub fn raw_value(value: f64) -> u16 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let scaled = (value * 10.0 + ROUNDING_GUARD).trunc();
    if scaled >= RAW_MAX as f64 {
        RAW_MAX
    } else {
        scaled as u16
    }
}

/// Encode a value into its two wire bytes (high 7 bits first)
pub fn encode_value(value: f64) -> [u8; 2] {
    let raw = raw_value(value);
    [((raw >> 7) & 0x7F) as u8, (raw & 0x7F) as u8]
}

/// Decode two wire bytes into a value
///
/// The high bit of each byte is ignored, so this never fails.
pub fn decode_value(b0: u8, b1: u8) -> f64 {
    let raw = (u16::from(b0 & 0x7F) << 7) | u16::from(b1 & 0x7F);
    f64::from(raw) / 10.0
}
