//! Device mode tracking
//!
//! The controller streams telemetry continuously. While the sensor heater is
//! warming up, `value1` carries a fixed sentinel and `value2` the heater duty;
//! once warm, the pair carries lambda and O2 readings. [`DeviceMonitor`] turns
//! each pair into a [`DeviceStatus`] and publishes it as a whole.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lc1_protocol::is_heater_marker;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Operating mode of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceMode {
    /// Sensor heater warming up
    Heating,
    /// Free-air O2 calibration
    ///
    /// The controller decides this phase itself and the wire pair looks the
    /// same as a lambda reading, so telemetry never produces it.
    O2Measure,
    /// Reporting lambda
    LambdaMeasure,
    /// No telemetry seen yet
    #[default]
    Unknown,
}

impl DeviceMode {
    /// Short lowercase name used in status lines
    pub fn name(&self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::O2Measure => "o2measure",
            Self::LambdaMeasure => "lambdameasure",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the controller's mode and readings
///
/// Fields that don't apply to the current mode are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Current operating mode
    pub mode: DeviceMode,
    /// Residual oxygen as a fraction
    pub o2: Option<f64>,
    /// Normalized air-fuel ratio
    pub lambda: Option<f64>,
    /// Heater duty as a fraction
    pub heater: Option<f64>,
}

impl DeviceStatus {
    /// Classify one telemetry pair
    pub fn from_telemetry(value1: f64, value2: f64) -> Self {
        if is_heater_marker(value1) {
            Self {
                mode: DeviceMode::Heating,
                o2: None,
                lambda: None,
                heater: Some(value2 / 100.0),
            }
        } else {
            Self {
                mode: DeviceMode::LambdaMeasure,
                o2: Some(value2 / 100.0),
                lambda: Some(value1 / 100.0 + 0.5),
                heater: None,
            }
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            DeviceMode::Heating => {
                write!(f, "{} {:.1}%", self.mode, self.heater.unwrap_or(0.0) * 100.0)
            }
            DeviceMode::O2Measure => {
                write!(f, "{} {:.1}%", self.mode, self.o2.unwrap_or(0.0) * 100.0)
            }
            DeviceMode::LambdaMeasure => {
                write!(f, "{} {:.2}", self.mode, self.lambda.unwrap_or(0.0))
            }
            DeviceMode::Unknown => write!(f, "{}", self.mode),
        }
    }
}

/// Shared device state, updated by the reader loop and read by anyone
#[derive(Debug, Default)]
pub struct DeviceMonitor {
    status: Mutex<DeviceStatus>,
}

impl DeviceMonitor {
    /// Create a monitor in [`DeviceMode::Unknown`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a telemetry pair, replacing mode and all readings together
    pub fn on_telemetry(&self, value1: f64, value2: f64) -> DeviceStatus {
        let next = DeviceStatus::from_telemetry(value1, value2);
        let previous = std::mem::replace(&mut *self.lock(), next);

        if previous.mode != next.mode {
            info!("Device mode {} -> {}", previous.mode, next.mode);
        }
        debug!("Telemetry {} {} -> {}", value1, value2, next);
        next
    }

    /// Copy of the current status
    pub fn snapshot(&self) -> DeviceStatus {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
