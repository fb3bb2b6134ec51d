//! Simulated controller state machine
//!
//! [`Lc1Simulator`] is a plain, tick-driven model of the controller. It owns
//! no I/O: each call to [`Lc1Simulator::tick`] advances the state and returns
//! the telemetry frame to transmit, and [`Lc1Simulator::reply_to`] answers
//! command bytes. The async task in [`crate::task`] drives it.
//!
//! ```text
//! Init -> Heating -> O2Measure <-> LambdaMeasure
//! ```

use std::fmt;

use lc1_protocol::{Command, Message};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SimConfig;

/// Address byte the controller uses in its replies
pub const REPLY_DEVICE_ID: u8 = 0x85;

/// Slack for threshold checks on values built up by repeated float steps
const STEP_TOLERANCE: f64 = 1e-9;

/// Payload of the identification reply
const ID_PAYLOAD: [u8; 10] = [0x01, 0x73, 0x11, 0x0A, 0x4C, 0x43, 0x31, 0x20, 0x05, 0x32];
/// Payload of the version reply ("NLC-1_1")
const VERSION_PAYLOAD: [u8; 10] = [0x01, 0x4E, 0x4C, 0x43, 0x2D, 0x31, 0x5F, 0x31, 0x00, 0x00];

/// Whether the simulator follows its own cycle or holds pinned values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunMode {
    Auto,
    Manual,
}

impl RunMode {
    /// Short lowercase name used in status lines
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

/// Phase of the simulated controller's cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimPhase {
    Init,
    Heating,
    O2Measure,
    LambdaMeasure,
}

impl SimPhase {
    /// Short lowercase name used in status lines
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Heating => "heating",
            Self::O2Measure => "o2measure",
            Self::LambdaMeasure => "lambdameasure",
        }
    }
}

/// Manual override of the simulated readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ManualOverride {
    /// Hold the heater duty at a fixed fraction
    Heater(f64),
    /// Hold the O2 fraction at a fixed value
    O2(f64),
    /// Resume the automatic cycle from `Init`
    Auto,
}

/// Snapshot of the simulator state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimStatus {
    pub run_mode: RunMode,
    pub phase: SimPhase,
    pub heater: f64,
    pub o2: f64,
    pub lambda: f64,
}

impl fmt::Display for SimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sim {} LC1 {} Heater {:.1}% O2 {:.1}% Lambda {:.1}",
            self.run_mode.name(),
            self.phase.name(),
            self.heater * 100.0,
            self.o2 * 100.0,
            self.lambda
        )
    }
}

/// A simulated LC-1 controller
#[derive(Debug, Clone)]
pub struct Lc1Simulator {
    config: SimConfig,
    run_mode: RunMode,
    phase: SimPhase,
    heater: f64,
    o2: f64,
    lambda: f64,
}

impl Lc1Simulator {
    /// Create a simulator that starts its cycle at `Init`
    pub fn new(config: SimConfig) -> Self {
        Self {
            run_mode: RunMode::Auto,
            phase: SimPhase::Init,
            heater: 0.0,
            o2: config.ambient_o2,
            lambda: 1.0,
            config,
        }
    }

    /// Configuration the simulator was created with
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current run mode
    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Current phase
    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    /// Snapshot of the state
    pub fn status(&self) -> SimStatus {
        SimStatus {
            run_mode: self.run_mode,
            phase: self.phase,
            heater: self.heater,
            o2: self.o2,
            lambda: self.lambda,
        }
    }

    /// Apply a manual override
    pub fn apply(&mut self, command: ManualOverride) {
        match command {
            ManualOverride::Heater(duty) => {
                info!("Manual heater {:.3}", duty);
                self.run_mode = RunMode::Manual;
                self.phase = SimPhase::Heating;
                self.heater = duty;
            }
            ManualOverride::O2(o2) => {
                info!("Manual O2 {:.4}", o2);
                self.run_mode = RunMode::Manual;
                self.phase = SimPhase::O2Measure;
                self.o2 = o2;
            }
            ManualOverride::Auto => {
                info!("Resuming automatic cycle");
                self.run_mode = RunMode::Auto;
                self.phase = SimPhase::Init;
            }
        }
    }

    /// Pin the heater duty until [`Self::set_auto`]
    pub fn set_manual_heater(&mut self, duty: f64) {
        self.apply(ManualOverride::Heater(duty));
    }

    /// Pin the O2 fraction until [`Self::set_auto`]
    pub fn set_manual_o2(&mut self, o2: f64) {
        self.apply(ManualOverride::O2(o2));
    }

    /// Return to the automatic cycle, restarting at `Init`
    pub fn set_auto(&mut self) {
        self.apply(ManualOverride::Auto);
    }

    /// Advance one tick and return the telemetry frame to send
    pub fn tick(&mut self) -> Message {
        match self.run_mode {
            RunMode::Manual => self.pinned_message(),
            RunMode::Auto => self.step(),
        }
    }

    /// Answer a command byte, or `None` for commands the controller ignores
    pub fn reply_to(&self, byte: u8) -> Option<Message> {
        let payload = match Command::try_from(byte) {
            Ok(Command::RequestId) => {
                info!("ID request");
                ID_PAYLOAD.to_vec()
            }
            Ok(Command::RequestVersion) => {
                info!("Version request");
                VERSION_PAYLOAD.to_vec()
            }
            Err(e) => {
                warn!("Ignoring {}", e);
                return None;
            }
        };
        Some(Message::Reply {
            device_id: REPLY_DEVICE_ID,
            payload,
        })
    }

    fn pinned_message(&self) -> Message {
        match self.phase {
            SimPhase::Heating => Message::heater(self.heater),
            _ => Message::lambda_o2(self.lambda, self.o2),
        }
    }

    fn step(&mut self) -> Message {
        let c = &self.config;
        match self.phase {
            SimPhase::Init => {
                self.heater = 0.0;
                self.o2 = 0.0;
                self.phase = SimPhase::Heating;
                info!("Init complete, heating");
                Message::heater(self.heater)
            }
            SimPhase::Heating => {
                self.heater = (self.heater + c.heater_step).min(1.0);
                if self.heater >= 1.0 - STEP_TOLERANCE {
                    self.heater = 1.0;
                    info!("Heating complete");
                    self.phase = SimPhase::O2Measure;
                }
                Message::heater(self.heater)
            }
            SimPhase::O2Measure => {
                self.lambda = c.rich_lambda;
                if self.o2 <= c.o2_threshold + STEP_TOLERANCE {
                    self.phase = SimPhase::LambdaMeasure;
                } else {
                    self.o2 = (self.o2 - c.o2_step).max(0.0);
                }
                Message::lambda_o2(self.lambda, self.o2)
            }
            SimPhase::LambdaMeasure => {
                self.lambda -= c.lambda_step;
                if self.lambda < c.lambda_floor - STEP_TOLERANCE {
                    self.o2 = c.ambient_o2;
                    self.phase = SimPhase::O2Measure;
                }
                Message::lambda_o2(self.lambda, self.o2)
            }
        }
    }
}

impl Default for Lc1Simulator {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use lc1_protocol::{Encode, Frame, HEATER_MARKER};

    use super::*;

    fn decoded(msg: &Message) -> (f64, f64) {
        match Message::parse(&Frame::new(msg.encode())).unwrap() {
            Message::Telemetry { value1, value2, .. } => (value1, value2),
            other => panic!("expected telemetry, got {:?}", other),
        }
    }

    /// Tick until the phase changes, returning the statuses seen on the way
    fn run_phase(sim: &mut Lc1Simulator, limit: usize) -> Vec<SimStatus> {
        let start = sim.phase();
        let mut seen = Vec::new();
        for _ in 0..limit {
            sim.tick();
            seen.push(sim.status());
            if sim.phase() != start {
                return seen;
            }
        }
        panic!("phase {:?} never ended", start);
    }

    #[test]
    fn test_init_resets_and_starts_heating() {
        let mut sim = Lc1Simulator::default();
        assert_eq!(sim.phase(), SimPhase::Init);

        let msg = sim.tick();
        assert_eq!(sim.phase(), SimPhase::Heating);
        assert_eq!(sim.status().heater, 0.0);
        assert_eq!(sim.status().o2, 0.0);
        assert!(msg.is_heater());
    }

    #[test]
    fn test_heater_rises_to_full_once() {
        let mut sim = Lc1Simulator::default();
        sim.tick();

        let heating = run_phase(&mut sim, 100);
        let heaters: Vec<f64> = heating.iter().map(|s| s.heater).collect();

        assert!(heaters.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(heaters.iter().filter(|&&h| h >= 1.0).count(), 1);
        assert_eq!(*heaters.last().unwrap(), 1.0);
        assert_eq!(sim.phase(), SimPhase::O2Measure);
        assert_eq!(sim.status().heater, 1.0);
    }

    #[test]
    fn test_heating_telemetry_carries_marker_and_duty() {
        let mut sim = Lc1Simulator::default();
        sim.tick();
        let (value1, value2) = decoded(&sim.tick());
        assert_eq!(value1, HEATER_MARKER);
        assert_eq!(value2, 5.0);
    }

    #[test]
    fn test_lambda_decreases_then_o2_resets() {
        let mut sim = Lc1Simulator::default();
        sim.tick();
        run_phase(&mut sim, 100); // heating
        run_phase(&mut sim, 1000); // o2 measurement
        assert_eq!(sim.phase(), SimPhase::LambdaMeasure);
        assert_eq!(sim.status().lambda, 1.5);

        let measuring = run_phase(&mut sim, 1000);
        let lambdas: Vec<f64> = measuring.iter().map(|s| s.lambda).collect();
        assert!(lambdas.windows(2).all(|w| w[1] < w[0]));
        assert!(*lambdas.last().unwrap() < 0.5);
        assert!(lambdas[..lambdas.len() - 1].iter().all(|&l| l > 0.5 - 1e-6));

        assert_eq!(sim.phase(), SimPhase::O2Measure);
        assert_eq!(sim.status().o2, 0.2094);
    }

    #[test]
    fn test_lambda_sweep_ends_below_floor() {
        let mut sim = Lc1Simulator::default();
        sim.tick();
        run_phase(&mut sim, 100);
        run_phase(&mut sim, 1000);

        // 1.49 down to 0.50 stays in the sweep; 0.49 leaves it
        let measuring = run_phase(&mut sim, 1000);
        assert_eq!(measuring.len(), 101);

        let at_floor = measuring[measuring.len() - 2];
        assert_eq!(at_floor.phase, SimPhase::LambdaMeasure);
        assert!((at_floor.lambda - 0.5).abs() < 1e-6);

        let last = measuring[measuring.len() - 1];
        assert_eq!(last.phase, SimPhase::O2Measure);
        assert!((last.lambda - 0.49).abs() < 1e-6);
    }

    #[test]
    fn test_heating_takes_whole_steps() {
        let mut sim = Lc1Simulator::default();
        sim.tick();
        // 0.05 per tick reaches full duty on the twentieth tick
        assert_eq!(run_phase(&mut sim, 100).len(), 20);
    }

    #[test]
    fn test_o2_decays_to_threshold() {
        let mut sim = Lc1Simulator::default();
        sim.tick();
        run_phase(&mut sim, 100);
        run_phase(&mut sim, 1000);
        run_phase(&mut sim, 1000);

        // Back in O2 measurement with ambient air
        let o2_phase = run_phase(&mut sim, 1000);
        let o2s: Vec<f64> = o2_phase.iter().map(|s| s.o2).collect();
        assert!(o2s.windows(2).all(|w| w[1] <= w[0]));
        assert!(*o2s.last().unwrap() <= 0.2 + 1e-9);
        assert!(o2_phase.iter().all(|s| s.lambda == 1.5));
    }

    #[test]
    fn test_manual_heater_is_sent_and_held() {
        let mut sim = Lc1Simulator::default();
        sim.tick();
        sim.set_manual_heater(0.42);

        for _ in 0..5 {
            let (value1, value2) = decoded(&sim.tick());
            assert_eq!(value1, HEATER_MARKER);
            assert_eq!(value2, 42.0);
        }
        assert_eq!(sim.run_mode(), RunMode::Manual);
        assert_eq!(sim.status().heater, 0.42);
    }

    #[test]
    fn test_manual_o2_is_sent_and_held() {
        let mut sim = Lc1Simulator::default();
        sim.set_manual_o2(0.15);

        for _ in 0..3 {
            let msg = sim.tick();
            assert!(!msg.is_heater());
            assert_eq!(decoded(&msg).1, 15.0);
        }
        assert_eq!(sim.phase(), SimPhase::O2Measure);
    }

    #[test]
    fn test_set_auto_restarts_cycle() {
        let mut sim = Lc1Simulator::default();
        sim.set_manual_heater(0.42);
        sim.tick();

        sim.set_auto();
        assert_eq!(sim.run_mode(), RunMode::Auto);
        assert_eq!(sim.phase(), SimPhase::Init);

        sim.tick();
        assert_eq!(sim.phase(), SimPhase::Heating);
        assert_eq!(sim.status().heater, 0.0);
    }

    #[test]
    fn test_replies() {
        let sim = Lc1Simulator::default();

        let id = sim.reply_to(0xF3).unwrap().encode();
        assert_eq!(
            id,
            vec![0xA2, 0x85, 0x01, 0x73, 0x11, 0x0A, 0x4C, 0x43, 0x31, 0x20, 0x05, 0x32]
        );

        let version = sim.reply_to(0xCE).unwrap().encode();
        assert_eq!(
            version,
            vec![0xA2, 0x85, 0x01, 0x4E, 0x4C, 0x43, 0x2D, 0x31, 0x5F, 0x31, 0x00, 0x00]
        );

        assert!(sim.reply_to(0x83).is_none());
    }

    #[test]
    fn test_status_display() {
        let mut sim = Lc1Simulator::default();
        sim.tick();
        sim.tick();
        assert_eq!(
            sim.status().to_string(),
            "Sim auto LC1 heating Heater 5.0% O2 0.0% Lambda 1.0"
        );
    }
}
