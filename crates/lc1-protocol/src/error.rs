//! Error types for LC-1 protocol parsing

use thiserror::Error;

use crate::FrameKind;

/// Errors that can occur while interpreting protocol data
///
/// None of these are fatal: the line is assumed noisy, so callers log and
/// drop whatever failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame is shorter than its kind requires
    #[error("short {kind:?} frame: {len} bytes, need at least {needed}")]
    ShortFrame {
        kind: FrameKind,
        len: usize,
        needed: usize,
    },

    /// Frame does not begin with a known start marker
    #[error("unknown frame kind: 0x{0:02X}")]
    UnknownFrameKind(u8),

    /// Command byte the controller does not understand
    #[error("unknown command: 0x{0:02X}")]
    UnknownCommand(u8),
}
