//! Converge CLI library

pub mod commands;
pub mod config;
pub mod error;
pub mod probe;
pub mod telemetry;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};
use converge_poller::CancellationToken;

use telemetry::LogFormat;

/// Converge - wait for asynchronous control-plane operations to finish
#[derive(Parser, Debug)]
#[command(name = "converge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log output format
    #[arg(long, global = true, value_enum, env = "CONVERGE_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll a status command until the resource reaches a target state
    Wait(commands::wait::WaitArgs),
    /// Print the effective wait spec
    Spec(commands::spec::SpecCommandArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        match self.command {
            Commands::Wait(args) => commands::wait::run(args, cancel).await,
            Commands::Spec(args) => commands::spec::run(args),
        }
    }
}
