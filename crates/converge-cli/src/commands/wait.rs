//! Wait command - poll a status command until the resource converges
//!
//! # Examples
//!
//! ```text
//! converge wait --pending build,retry --target NETWORK_READY --interval 10s \
//!     -- pvs-net status net-123
//!
//! converge wait --preset instance-operation --action stop \
//!     --label-pointer /status -- pvs-instance show vm-1 --json
//!
//! converge wait --absent --pending deleting --not-found-exit-code 4 \
//!     -- pvs-port show p-1
//! ```

use clap::Args;
use converge_poller::{wait_for_absence, wait_for_state_with_cancel, CancellationToken};
use tracing::info;

use super::SpecArgs;
use crate::probe::{CommandProbe, CommandRunner, LabelSource, ProcessRunner};
use crate::Result;

/// Wait command arguments
#[derive(Args, Debug)]
pub struct WaitArgs {
    #[command(flatten)]
    pub spec: SpecArgs,

    /// Resource name used in log and error messages
    #[arg(long, default_value = "resource")]
    pub name: String,

    /// Wait for the resource to disappear instead of reaching a target state
    #[arg(long)]
    pub absent: bool,

    /// Parse command output as JSON and read the status label at this pointer
    #[arg(long)]
    pub label_pointer: Option<String>,

    /// Command exit status that means "resource not found"
    #[arg(long)]
    pub not_found_exit_code: Option<i32>,

    /// Status command and its arguments
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Run the wait command
///
/// Prints the final command output on success.
pub async fn run(args: WaitArgs, cancel: CancellationToken) -> Result<()> {
    if let Some(snapshot) = wait_with_runner(&args, ProcessRunner, &cancel).await? {
        print!("{snapshot}");
    }
    Ok(())
}

/// Drive one wait with the given runner.
///
/// Returns the converged command output, or `None` for a completed deletion wait.
pub async fn wait_with_runner<R: CommandRunner>(
    args: &WaitArgs,
    runner: R,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    let spec = args.spec.resolve()?;
    let label_source = args
        .label_pointer
        .clone()
        .map_or(LabelSource::FirstLine, LabelSource::JsonPointer);
    let probe = CommandProbe::new(runner, args.command.clone())
        .with_label_source(label_source)
        .with_not_found_exit_code(args.not_found_exit_code);

    info!(
        resource = %args.name,
        pending = ?spec.pending,
        target = ?spec.target,
        timeout = %humantime::format_duration(spec.timeout),
        "Waiting"
    );

    if args.absent {
        wait_for_absence(&args.name, &spec, cancel, |_| probe.observe()).await?;
        Ok(None)
    } else {
        let snapshot =
            wait_for_state_with_cancel(&args.name, &spec, cancel, |_| probe.observe()).await?;
        Ok(Some(snapshot))
    }
}
