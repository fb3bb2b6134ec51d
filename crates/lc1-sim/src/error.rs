//! Error types for the simulator

use thiserror::Error;

/// Errors that can occur while running a simulated controller
#[derive(Debug, Error)]
pub enum SimError {
    /// I/O error on the simulated device's transport
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to open the serial port
    #[error("serial port error: {0}")]
    SerialPort(#[from] tokio_serial::Error),

    /// The simulator task is no longer running
    #[error("simulator stopped")]
    Stopped,
}
