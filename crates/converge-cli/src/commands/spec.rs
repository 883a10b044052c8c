//! Spec command - print the effective wait spec without probing anything

use clap::Args;
use converge_poller::WaitSpec;

use super::SpecArgs;
use crate::{Error, Result};

/// Spec command arguments
#[derive(Args, Debug)]
pub struct SpecCommandArgs {
    #[command(flatten)]
    pub spec: SpecArgs,

    /// Validate as a deletion wait, where the target set may be empty
    #[arg(long)]
    pub absent: bool,
}

/// Run the spec command
pub fn run(args: SpecCommandArgs) -> Result<()> {
    let spec = resolve_checked(&args)?;
    print!("{}", serde_yaml::to_string(&spec)?);
    Ok(())
}

fn resolve_checked(args: &SpecCommandArgs) -> Result<WaitSpec> {
    let spec = args.spec.resolve()?;
    let checked = if args.absent {
        spec.validate_for_absence()
    } else {
        spec.validate()
    };
    checked.map_err(|e| Error::validation(e.to_string()))?;
    Ok(spec)
}
