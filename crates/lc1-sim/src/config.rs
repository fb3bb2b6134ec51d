//! Simulator configuration

use std::time::Duration;

use lc1_protocol::BAUD_RATE;
use serde::{Deserialize, Serialize};

/// Tuning for the simulated controller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Display name, used in log spans
    pub name: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Interval between telemetry frames
    pub tick_ms: u64,
    /// Heater duty added per tick while warming up
    pub heater_step: f64,
    /// O2 fraction removed per tick during O2 measurement
    pub o2_step: f64,
    /// O2 fraction at which O2 measurement ends
    pub o2_threshold: f64,
    /// Lambda removed per tick during lambda measurement
    pub lambda_step: f64,
    /// Lambda below which the cycle returns to O2 measurement
    pub lambda_floor: f64,
    /// O2 fraction of ambient air
    pub ambient_o2: f64,
    /// Lambda reported while measuring O2
    pub rich_lambda: f64,
}

impl SimConfig {
    /// Tick interval as a duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "LC-1 Simulator".to_string(),
            baud_rate: BAUD_RATE,
            tick_ms: 100,
            heater_step: 0.05,
            o2_step: 0.001,
            o2_threshold: 0.2,
            lambda_step: 0.01,
            lambda_floor: 0.5,
            ambient_o2: 0.2094,
            rich_lambda: 1.5,
        }
    }
}
