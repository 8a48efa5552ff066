//! Command-line interface for uccd

use std::path::PathBuf;

use clap::Parser;

use ucc_core::constants::paths;

#[derive(Parser, Debug)]
#[command(name = "uccd")]
#[command(version)]
#[command(about = "UCC fan control daemon")]
#[command(long_about = "UCC fan control daemon

Runs the closed-loop fan controller and serves the control socket.

ENVIRONMENT VARIABLES:
    UCC_LOG=debug          Log level (trace, debug, info, warn, error)")]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = paths::CONFIG_FILE)]
    pub config: PathBuf,

    /// Socket path (overrides the config file)
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Use simulated fans instead of the configured backend
    #[arg(long)]
    pub simulate: bool,
}
