use anyhow::Context;
use lc1_sim::{SimConfig, SimulatorHandle};

use super::{print_status, status_interval, SimulateArgs};
use crate::settings::Settings;

/// Apply command-line overrides to the configured simulator
fn sim_config(args: &SimulateArgs, settings: &Settings) -> SimConfig {
    let mut config = settings.simulator.clone();
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.tick_ms = tick_ms;
    }
    config
}

pub async fn run(args: SimulateArgs, settings: Settings) -> anyhow::Result<()> {
    let interval = status_interval(args.interval_ms, &settings);
    let config = sim_config(&args, &settings);

    let sim = SimulatorHandle::open(&args.port, config)
        .with_context(|| format!("failed to open {}", args.port))?;

    if let Some(duty) = args.manual_heater {
        sim.set_manual_heater(duty).await?;
    } else if let Some(o2) = args.manual_o2 {
        sim.set_manual_o2(o2).await?;
    }

    let mut status_rx = sim.subscribe();
    let stopped = async move {
        // Errors once the task has dropped its sender
        while status_rx.changed().await.is_ok() {}
    };
    print_status(interval, None, stopped, || println!("{}", sim.status())).await;

    sim.shutdown()
        .await
        .with_context(|| format!("simulator on {} failed", args.port))
}
