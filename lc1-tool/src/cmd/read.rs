use std::time::Duration;

use anyhow::Context;
use lc1_link::{DeviceInfo, Lc1Link};
use tracing::warn;

use super::{print_status, status_interval, ReadArgs};
use crate::settings::Settings;

/// Resolves once the link's I/O task has stopped
pub(crate) async fn disconnected(link: &Lc1Link) {
    while link.is_connected() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

pub(crate) fn print_device_info(info: &DeviceInfo) {
    println!("ID      {:02X?}", info.id);
    println!("Version {}", String::from_utf8_lossy(&info.version).trim_end_matches('\0'));
}

pub async fn run(args: ReadArgs, settings: Settings) -> anyhow::Result<()> {
    let interval = status_interval(args.interval_ms, &settings);
    let mut config = settings.link;
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }

    let link = Lc1Link::open(&args.port, config)
        .with_context(|| format!("failed to open {}", args.port))?;

    // Telemetry still flows from a controller that ignores the requests
    match link.identify().await {
        Ok(info) => print_device_info(&info),
        Err(e) => warn!("Identification failed: {}", e),
    }

    print_status(interval, None, disconnected(&link), || {
        println!("{}", link.status_line())
    })
    .await;

    link.shutdown()
        .await
        .with_context(|| format!("link on {} failed", args.port))
}
