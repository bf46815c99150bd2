//! Command-line front end for the parcel harvester.
mod cli;
mod commands;
mod config;
mod progress;

use clap::Parser;
use engine_logging::LogDestination;
use log::LevelFilter;
use parcel_engine::CancellationToken;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let level = if config.verbose(cli.verbose) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match config.log_file(cli.log_file.clone()) {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, level);

    match &cli.command {
        Command::Tiles(args) => commands::tiles(args, &config).await,
        Command::Harvest(args) => {
            let cancel = CancellationToken::new();
            commands::cancel_on_ctrl_c(cancel.clone());
            commands::harvest(args, &config, cancel).await
        }
    }
}
