//! Wait spec resolution
//!
//! A spec is assembled from up to four layers, lowest precedence first:
//! built-in defaults, a preset, a YAML spec file, then command-line flags
//! (which already carry their environment fallbacks). Each upper layer only
//! overrides the fields it sets.

use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use converge_poller::presets::{self, InstanceAction};
use converge_poller::{UnknownStatePolicy, WaitSpec};
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// Timeout for network and port presets when nothing overrides it (1 hour)
pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Built-in wait presets
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Network creation until a VLAN is assigned
    NetworkReady,
    /// Port attachment until the port is ACTIVE
    PortAttached,
    /// Instance action (requires --action)
    InstanceOperation,
}

/// Partial wait spec; `None` fields leave the lower layer untouched
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SpecLayer {
    pub pending: Option<Vec<String>>,
    pub target: Option<Vec<String>>,
    #[serde(deserialize_with = "humantime_opt")]
    pub initial_delay: Option<Duration>,
    #[serde(deserialize_with = "humantime_opt")]
    pub poll_interval: Option<Duration>,
    #[serde(deserialize_with = "humantime_opt")]
    pub max_interval: Option<Duration>,
    pub backoff: Option<f64>,
    pub jitter: Option<bool>,
    #[serde(deserialize_with = "humantime_opt")]
    pub timeout: Option<Duration>,
    pub unknown_state: Option<UnknownStatePolicy>,
    pub not_found_checks: Option<u32>,
    pub continuous_target_occurrence: Option<u32>,
}

impl SpecLayer {
    /// Overwrite the fields of `spec` that this layer sets
    pub fn apply(&self, spec: &mut WaitSpec) {
        if let Some(pending) = &self.pending {
            spec.pending = labels(pending);
        }
        if let Some(target) = &self.target {
            spec.target = labels(target);
        }
        if let Some(delay) = self.initial_delay {
            spec.initial_delay = delay;
        }
        if let Some(interval) = self.poll_interval {
            spec.poll_interval = interval;
        }
        if let Some(max) = self.max_interval {
            spec.max_interval = Some(max);
        }
        if let Some(backoff) = self.backoff {
            spec.backoff = backoff;
        }
        if let Some(jitter) = self.jitter {
            spec.jitter = jitter;
        }
        if let Some(timeout) = self.timeout {
            spec.timeout = timeout;
        }
        if let Some(policy) = self.unknown_state {
            spec.unknown_state = policy;
        }
        if let Some(checks) = self.not_found_checks {
            spec.not_found_checks = checks;
        }
        if let Some(occurrences) = self.continuous_target_occurrence {
            spec.continuous_target_occurrence = occurrences;
        }
    }
}

/// Trimmed, non-empty, first occurrence wins
fn labels(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for label in raw.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if !out.iter().any(|existing| existing == label) {
            out.push(label.to_string());
        }
    }
    out
}

fn humantime_opt<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| humantime::parse_duration(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

/// Load a YAML spec file as a layer
pub fn load_spec_file(path: &Path) -> Result<SpecLayer> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::SpecFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_yaml::from_str(&content).map_err(|e| Error::SpecFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Base spec for a preset
pub fn preset_spec(preset: Preset, action: Option<InstanceAction>) -> Result<WaitSpec> {
    match preset {
        Preset::NetworkReady => Ok(presets::network_ready(DEFAULT_RESOURCE_TIMEOUT)),
        Preset::PortAttached => Ok(presets::port_attached(DEFAULT_RESOURCE_TIMEOUT)),
        Preset::InstanceOperation => {
            let action = action.ok_or_else(|| {
                Error::validation("--preset instance-operation requires --action")
            })?;
            presets::instance_operation(action).ok_or_else(|| {
                Error::validation(format!(
                    "instance action '{action}' has no observable completion state"
                ))
            })
        }
    }
}

/// Assemble a spec from preset, spec file, and flag layers
pub fn resolve_spec(
    preset: Option<Preset>,
    action: Option<InstanceAction>,
    file: Option<&Path>,
    flags: &SpecLayer,
) -> Result<WaitSpec> {
    let mut spec = match preset {
        Some(preset) => preset_spec(preset, action)?,
        None if action.is_some() => {
            return Err(Error::validation(
                "--action is only valid with --preset instance-operation",
            ))
        }
        None => WaitSpec::default(),
    };

    if let Some(path) = file {
        debug!(path = %path.display(), "Loading wait spec file");
        load_spec_file(path)?.apply(&mut spec);
    }
    flags.apply(&mut spec);

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_poller::presets::INSTANCE_OPERATION_TIMEOUT;
    use std::io::Write;

    fn spec_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn no_layers_yields_defaults() {
        let spec = resolve_spec(None, None, None, &SpecLayer::default()).unwrap();
        assert_eq!(spec, WaitSpec::default());
    }

    #[test]
    fn file_overrides_preset_and_flags_override_file() {
        let file = spec_file("pollInterval: 30s\ntimeout: 20m\nnotFoundChecks: 2\n");
        let flags = SpecLayer {
            timeout: Some(Duration::from_secs(5 * 60)),
            ..Default::default()
        };

        let spec = resolve_spec(
            Some(Preset::NetworkReady),
            None,
            Some(file.path()),
            &flags,
        )
        .unwrap();

        // preset
        assert_eq!(spec.target, vec!["NETWORK_READY"]);
        assert_eq!(spec.initial_delay, Duration::from_secs(10));
        // file
        assert_eq!(spec.poll_interval, Duration::from_secs(30));
        assert_eq!(spec.not_found_checks, 2);
        // flags
        assert_eq!(spec.timeout, Duration::from_secs(300));
    }

    #[test]
    fn flag_labels_are_trimmed_and_deduplicated() {
        let flags = SpecLayer {
            pending: Some(vec![" build".into(), "retry".into(), "build".into(), "".into()]),
            target: Some(vec!["ACTIVE".into()]),
            ..Default::default()
        };
        let spec = resolve_spec(None, None, None, &flags).unwrap();
        assert_eq!(spec.pending, vec!["build", "retry"]);
        assert_eq!(spec.target, vec!["ACTIVE"]);
    }

    #[test]
    fn instance_preset_needs_observable_action() {
        let spec = preset_spec(Preset::InstanceOperation, Some(InstanceAction::Start)).unwrap();
        assert_eq!(spec.target, vec!["ACTIVE"]);
        assert_eq!(spec.timeout, INSTANCE_OPERATION_TIMEOUT);

        let missing = preset_spec(Preset::InstanceOperation, None).unwrap_err();
        assert!(missing.to_string().contains("--action"));

        let reset = preset_spec(Preset::InstanceOperation, Some(InstanceAction::ResetState))
            .unwrap_err();
        assert!(reset.to_string().contains("reset-state"));
    }

    #[test]
    fn action_without_instance_preset_rejected() {
        let err = resolve_spec(
            None,
            Some(InstanceAction::Stop),
            None,
            &SpecLayer::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn unknown_spec_file_field_rejected() {
        let file = spec_file("target: [ACTIVE]\npollIntervall: 5s\n");
        let err = load_spec_file(file.path()).unwrap_err();
        match err {
            Error::SpecFile { message, .. } => assert!(message.contains("pollIntervall")),
            other => panic!("expected spec file error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_duration_in_file_rejected() {
        let file = spec_file("timeout: eventually\n");
        assert!(matches!(
            load_spec_file(file.path()),
            Err(Error::SpecFile { .. })
        ));
    }

    #[test]
    fn missing_spec_file_reports_path() {
        let err = load_spec_file(Path::new("/nonexistent/wait.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/wait.yaml"));
    }

    #[test]
    fn file_layer_reads_policy_and_backoff() {
        let file = spec_file(
            "target: [ACTIVE]\nunknownState: fail\nbackoff: 2.0\nmaxInterval: 1m\njitter: true\n",
        );
        let layer = load_spec_file(file.path()).unwrap();
        let mut spec = WaitSpec::default();
        layer.apply(&mut spec);
        assert_eq!(spec.unknown_state, UnknownStatePolicy::Fail);
        assert_eq!(spec.backoff, 2.0);
        assert_eq!(spec.max_interval, Some(Duration::from_secs(60)));
        assert!(spec.jitter);
        assert_eq!(spec.poll_interval, converge_poller::spec::DEFAULT_POLL_INTERVAL);
    }
}
