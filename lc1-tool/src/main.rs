//! LC-1 command-line tool
//!
//! Reads a wideband lambda controller over a serial port, or stands in for
//! one with the simulator.

mod cmd;
mod logging;
mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "lc1", version, about = "LC-1 wideband lambda controller tool")]
struct Cli {
    /// JSON settings file.
    #[arg(long, value_name = "PATH", global = true, env = "LC1_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). Defaults to RUST_LOG, then info.
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<LogLevel>,

    /// Also append logs to this file.
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_format, cli.log_level, cli.log_file.as_deref())?;

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(cmd::run(cli.command, settings))
}
