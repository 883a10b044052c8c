//! CLI commands

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use converge_poller::presets::InstanceAction;
use converge_poller::{UnknownStatePolicy, WaitSpec};

use crate::config::{self, Preset, SpecLayer};
use crate::Result;

pub mod spec;
pub mod wait;

/// Handling of labels outside both sets
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum UnknownArg {
    /// Keep polling
    Pending,
    /// Fail the wait
    Fail,
}

impl From<UnknownArg> for UnknownStatePolicy {
    fn from(arg: UnknownArg) -> Self {
        match arg {
            UnknownArg::Pending => UnknownStatePolicy::Pending,
            UnknownArg::Fail => UnknownStatePolicy::Fail,
        }
    }
}

/// Wait spec arguments shared by `wait` and `spec`
#[derive(Args, Debug, Default)]
pub struct SpecArgs {
    /// Labels meaning the operation is still in progress (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub pending: Vec<String>,

    /// Labels meaning the resource has converged (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub target: Vec<String>,

    /// Delay before the first probe (e.g., "10s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub initial_delay: Option<Duration>,

    /// Minimum time between probes (e.g., "2s", "1m")
    #[arg(long, env = "CONVERGE_INTERVAL", value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Cap for a backed-off interval
    #[arg(long, value_parser = humantime::parse_duration)]
    pub max_interval: Option<Duration>,

    /// Interval multiplier applied after every probe
    #[arg(long)]
    pub backoff: Option<f64>,

    /// Spread each sleep upward by up to 50% ("--jitter" or "--jitter=false")
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub jitter: Option<bool>,

    /// Overall timeout (e.g., "5m", "2h")
    #[arg(long, env = "CONVERGE_TIMEOUT", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// What to do with a label that is neither pending nor target
    #[arg(long, value_enum)]
    pub unknown: Option<UnknownArg>,

    /// Consecutive "not found" results tolerated
    #[arg(long)]
    pub not_found_checks: Option<u32>,

    /// Consecutive target observations required
    #[arg(long)]
    pub target_occurrences: Option<u32>,

    /// YAML wait spec file
    #[arg(long = "spec", env = "CONVERGE_SPEC")]
    pub spec_file: Option<PathBuf>,

    /// Start from a built-in preset
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// Instance action for the instance-operation preset (e.g., "stop")
    #[arg(long)]
    pub action: Option<InstanceAction>,
}

impl SpecArgs {
    /// Flag layer; unset flags leave lower layers untouched
    pub fn layer(&self) -> SpecLayer {
        SpecLayer {
            pending: (!self.pending.is_empty()).then(|| self.pending.clone()),
            target: (!self.target.is_empty()).then(|| self.target.clone()),
            initial_delay: self.initial_delay,
            poll_interval: self.interval,
            max_interval: self.max_interval,
            backoff: self.backoff,
            jitter: self.jitter,
            timeout: self.timeout,
            unknown_state: self.unknown.map(Into::into),
            not_found_checks: self.not_found_checks,
            continuous_target_occurrence: self.target_occurrences,
        }
    }

    /// Resolve the effective spec from preset, file, and flags
    pub fn resolve(&self) -> Result<WaitSpec> {
        config::resolve_spec(
            self.preset,
            self.action,
            self.spec_file.as_deref(),
            &self.layer(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use std::sync::Mutex;

    // Serializes tests that parse flags with environment fallbacks
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        spec: SpecArgs,
    }

    fn parse(args: &[&str]) -> SpecArgs {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        TestCli::parse_from(std::iter::once("converge").chain(args.iter().copied())).spec
    }

    #[test]
    fn parses_labels_and_durations() {
        let args = parse(&[
            "--pending",
            "build,retry",
            "--target",
            "NETWORK_READY",
            "--interval",
            "10s",
            "--timeout",
            "5m",
            "--unknown",
            "fail",
        ]);
        let spec = args.resolve().unwrap();
        assert_eq!(spec.pending, vec!["build", "retry"]);
        assert_eq!(spec.target, vec!["NETWORK_READY"]);
        assert_eq!(spec.poll_interval, Duration::from_secs(10));
        assert_eq!(spec.timeout, Duration::from_secs(300));
        assert_eq!(spec.unknown_state, UnknownStatePolicy::Fail);
    }

    #[test]
    fn repeated_label_flags_accumulate() {
        let args = parse(&["--target", "ACTIVE", "--target", "SHUTOFF"]);
        assert_eq!(args.target, vec!["ACTIVE", "SHUTOFF"]);
    }

    #[test]
    fn unset_flags_produce_empty_layer() {
        assert_eq!(SpecArgs::default().layer(), SpecLayer::default());
    }

    #[test]
    fn preset_with_action_and_override() {
        let args = parse(&[
            "--preset",
            "instance-operation",
            "--action",
            "stop",
            "--interval",
            "30s",
        ]);
        let spec = args.resolve().unwrap();
        assert_eq!(spec.target, vec!["SHUTOFF"]);
        assert_eq!(spec.initial_delay, Duration::from_secs(60));
        assert_eq!(spec.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn jitter_flag_overrides_spec_file_both_ways() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"target: [ACTIVE]\njitter: true\n").unwrap();
        let path = file.path().to_str().unwrap();

        let spec = parse(&["--spec", path]).resolve().unwrap();
        assert!(spec.jitter);

        let spec = parse(&["--spec", path, "--jitter=false"]).resolve().unwrap();
        assert!(!spec.jitter);

        let spec = parse(&["--jitter"]).resolve().unwrap();
        assert!(spec.jitter);
    }

    #[test]
    fn env_overrides_spec_file_and_flags_override_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"target: [ACTIVE]\ntimeout: 20m\npollInterval: 30s\nnotFoundChecks: 2\n")
            .unwrap();

        let args = {
            let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            std::env::set_var("CONVERGE_SPEC", file.path());
            std::env::set_var("CONVERGE_TIMEOUT", "5m");
            std::env::set_var("CONVERGE_INTERVAL", "3s");

            let parsed = TestCli::try_parse_from(["converge", "--interval", "7s"]);

            std::env::remove_var("CONVERGE_SPEC");
            std::env::remove_var("CONVERGE_TIMEOUT");
            std::env::remove_var("CONVERGE_INTERVAL");
            parsed.unwrap().spec
        };

        assert_eq!(args.spec_file.as_deref(), Some(file.path()));
        let spec = args.resolve().unwrap();
        // file
        assert_eq!(spec.target, vec!["ACTIVE"]);
        assert_eq!(spec.not_found_checks, 2);
        // env over file
        assert_eq!(spec.timeout, Duration::from_secs(300));
        // flag over env
        assert_eq!(spec.poll_interval, Duration::from_secs(7));
    }

    #[test]
    fn rejects_unknown_action() {
        let result = TestCli::try_parse_from(["converge", "--action", "suspend"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_duration() {
        let result = TestCli::try_parse_from(["converge", "--timeout", "soon"]);
        assert!(result.is_err());
    }
}
