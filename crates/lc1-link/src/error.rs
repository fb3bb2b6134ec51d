//! Error types for the LC-1 link

use lc1_protocol::Command;
use thiserror::Error;

/// Errors that can occur on a link to a controller
#[derive(Debug, Error)]
pub enum LinkError {
    /// No reply arrived in time; the caller decides whether to retry
    #[error("no reply to {command:?} within {timeout_ms}ms")]
    RequestTimeout { command: Command, timeout_ms: u64 },

    /// The link I/O task has stopped, after a transport fault or shutdown
    #[error("link disconnected")]
    Disconnected,

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to open the serial port
    #[error("serial port error: {0}")]
    SerialPort(#[from] tokio_serial::Error),
}
