//! Link configuration

use std::time::Duration;

use lc1_protocol::BAUD_RATE;
use serde::{Deserialize, Serialize};

/// Settings for one link to a controller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Display name, used in status lines and log spans
    pub name: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// How long a request waits for its reply
    pub request_timeout_ms: u64,
    /// Read poll interval of the I/O task
    pub read_poll_ms: u64,
    /// Outbound queue depth between callers and the I/O task
    pub outbound_capacity: usize,
}

impl LinkConfig {
    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Read poll interval as a duration
    pub fn read_poll(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            name: "Device".to_string(),
            baud_rate: BAUD_RATE,
            request_timeout_ms: 1000,
            read_poll_ms: 100,
            outbound_capacity: 32,
        }
    }
}
