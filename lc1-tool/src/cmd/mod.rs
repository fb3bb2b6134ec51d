use std::future::Future;
use std::time::Duration;

use clap::{Args, Subcommand};
use tracing::{info, warn};

use crate::settings::Settings;

pub mod loopback;
pub mod ports;
pub mod read;
pub mod simulate;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read a controller and print its status.
    Read(ReadArgs),
    /// Simulate a controller on a serial port.
    Simulate(SimulateArgs),
    /// Run a link against the simulator over an in-memory pipe.
    Loopback(LoopbackArgs),
    /// List serial ports.
    Ports,
}

pub async fn run(command: Command, settings: Settings) -> anyhow::Result<()> {
    match command {
        Command::Read(args) => read::run(args, settings).await,
        Command::Simulate(args) => simulate::run(args, settings).await,
        Command::Loopback(args) => loopback::run(args, settings).await,
        Command::Ports => ports::run(),
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Serial port the controller is attached to.
    #[arg(long, short = 'p')]
    pub port: String,
    /// Baud rate (overrides the settings file).
    #[arg(long)]
    pub baud: Option<u32>,
    /// Reply timeout in milliseconds (overrides the settings file).
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
    /// Status print interval in milliseconds (overrides the settings file).
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Serial port to present the simulated controller on.
    #[arg(long, short = 'p')]
    pub port: String,
    /// Baud rate (overrides the settings file).
    #[arg(long)]
    pub baud: Option<u32>,
    /// Telemetry interval in milliseconds (overrides the settings file).
    #[arg(long, value_name = "MS")]
    pub tick_ms: Option<u64>,
    /// Start with the heater duty pinned to this fraction.
    #[arg(long, value_name = "DUTY", conflicts_with = "manual_o2")]
    pub manual_heater: Option<f64>,
    /// Start with the O2 reading pinned to this fraction.
    #[arg(long, value_name = "O2", conflicts_with = "manual_heater")]
    pub manual_o2: Option<f64>,
    /// Status print interval in milliseconds (overrides the settings file).
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long, value_name = "SECS")]
    pub seconds: Option<u64>,
    /// Status print interval in milliseconds (overrides the settings file).
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

/// Resolve the status interval from a flag or the settings file
fn status_interval(flag: Option<u64>, settings: &Settings) -> Duration {
    flag.map(|ms| Duration::from_millis(ms.max(1)))
        .unwrap_or_else(|| settings.status_interval())
}

/// Call `print` every `interval` until Ctrl-C, the optional limit, or `stopped`
async fn print_status<F, S>(interval: Duration, limit: Option<Duration>, stopped: S, mut print: F)
where
    F: FnMut(),
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(deadline);
    tokio::pin!(stopped);
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => print(),
            result = &mut ctrl_c => {
                match result {
                    Ok(()) => info!("Interrupted"),
                    Err(e) => warn!("Error waiting for Ctrl-C: {}", e),
                }
                break;
            }
            _ = &mut deadline => break,
            _ = &mut stopped => {
                info!("Connection ended");
                break;
            }
        }
    }
}
