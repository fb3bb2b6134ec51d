use std::time::Duration;

use anyhow::Context;
use lc1_link::Lc1Link;
use lc1_sim::SimulatorHandle;
use tracing::info;

use super::read::{disconnected, print_device_info};
use super::{print_status, status_interval, LoopbackArgs};
use crate::settings::Settings;

pub async fn run(args: LoopbackArgs, settings: Settings) -> anyhow::Result<()> {
    let interval = status_interval(args.interval_ms, &settings);
    let (host, device) = tokio::io::duplex(4096);

    let sim = SimulatorHandle::spawn(device, settings.simulator);
    let link = Lc1Link::spawn(host, settings.link);
    info!("Loopback running");

    let info = link.identify().await.context("simulator did not identify")?;
    print_device_info(&info);

    let limit = args.seconds.map(Duration::from_secs);
    print_status(interval, limit, disconnected(&link), || {
        println!("{}", sim.status());
        println!("{}", link.status_line());
    })
    .await;

    link.shutdown().await.context("link failed")?;
    sim.shutdown().await.context("simulator failed")
}
