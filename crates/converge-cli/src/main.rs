//! Converge CLI
//!
//! Polls a status command until a resource converges, times out, or the
//! user interrupts.

use std::process::ExitCode;

use clap::Parser;
use converge_poller::CancellationToken;
use tracing::warn;

use converge_cli::telemetry::init_logging;
use converge_cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_format) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling wait");
            on_interrupt.cancel();
        }
    });

    match cli.run(cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
