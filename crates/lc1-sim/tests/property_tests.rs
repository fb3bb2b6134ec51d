//! Property-based tests for the simulator state machine

use lc1_protocol::{Encode, FrameDemux, Message};
use lc1_sim::{Lc1Simulator, SimConfig, SimPhase};
use proptest::prelude::*;

proptest! {
    /// Readings stay within what the wire format can carry
    #[test]
    fn readings_stay_in_range(ticks in 0usize..2000) {
        let mut sim = Lc1Simulator::new(SimConfig::default());
        for _ in 0..ticks {
            sim.tick();
            let status = sim.status();
            prop_assert!((0.0..=1.0).contains(&status.heater));
            prop_assert!((0.0..=1.0).contains(&status.o2));
            prop_assert!(status.lambda >= 0.5 - 0.01 - 1e-9);
        }
    }

    /// Every emitted frame parses back to the message that produced it
    #[test]
    fn emitted_frames_parse(ticks in 1usize..500) {
        let mut sim = Lc1Simulator::new(SimConfig::default());
        let mut demux = FrameDemux::new();
        let mut sent = Vec::new();
        let mut wire = Vec::new();
        for _ in 0..ticks {
            let msg = sim.tick();
            wire.extend(msg.encode());
            sent.push(msg);
        }
        let mut frames = demux.feed(&wire);
        // The last frame is still held until another marker arrives
        prop_assert_eq!(demux.pending().len(), 6);
        frames.extend(demux.feed(&[0xB2]));
        prop_assert_eq!(frames.len(), ticks);

        for (frame, msg) in frames.iter().zip(&sent) {
            let parsed = Message::parse(frame).unwrap();
            prop_assert_eq!(parsed.is_heater(), msg.is_heater());
        }
    }

    /// A manual heater duty is echoed on the wire
    #[test]
    fn manual_heater_echoed(percent in 0u32..=100) {
        let duty = f64::from(percent) / 100.0;
        let mut sim = Lc1Simulator::new(SimConfig::default());
        sim.set_manual_heater(duty);
        let msg = sim.tick();
        prop_assert_eq!(sim.phase(), SimPhase::Heating);
        match msg {
            Message::Telemetry { value2, .. } => prop_assert!((value2 - f64::from(percent)).abs() < 0.05),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }
}
