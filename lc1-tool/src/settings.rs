//! Tool settings

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use lc1_link::LinkConfig;
use lc1_sim::SimConfig;
use serde::{Deserialize, Serialize};

/// Settings read from the `--config` file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Driver link configuration
    #[serde(default)]
    pub link: LinkConfig,
    /// Simulator configuration
    #[serde(default)]
    pub simulator: SimConfig,
    /// How often status lines are printed
    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,
}

fn default_status_interval() -> u64 {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            simulator: SimConfig::default(),
            status_interval_ms: default_status_interval(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("invalid settings in {}", path.display()))
    }

    /// Parse settings, filling missing fields with defaults
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Interval between status lines
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(1))
    }
}
