//! ## vattenvakt-cli
//! **Operational entrypoint**
//!
//! Runs the live engine, a deterministic offline simulation, and small
//! maintenance commands over the threshold file and the region registry.

use clap::Parser;
use vattenvakt_telemetry::EventLogger;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;
    EventLogger::init(&config.telemetry.log_level)?;

    commands::run_command(cli.command, config).await
}
