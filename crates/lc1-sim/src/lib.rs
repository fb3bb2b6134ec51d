//! LC-1 Simulator
//!
//! A virtual LC-1 controller for exercising the driver without hardware.
//!
//! The simulator runs an automatic cycle: after a short init it ramps the
//! heater to full duty, then alternates between free-air O2 measurement and
//! a falling lambda sweep. Manual overrides pin the heater duty or the O2
//! reading until the cycle is resumed.
//!
//! - [`Lc1Simulator`] is the I/O-free state machine
//! - [`SimulatorHandle`] runs it on a serial port or any byte stream

pub mod config;
pub mod error;
pub mod simulator;
pub mod task;

pub use config::SimConfig;
pub use error::SimError;
pub use simulator::{Lc1Simulator, ManualOverride, RunMode, SimPhase, SimStatus, REPLY_DEVICE_ID};
pub use task::{run_simulator_task, SimCommand, SimulatorHandle};
