//! Wait specification: which labels mean "still going", which mean "done",
//! and how long and how often to look.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default spacing between probes (2 seconds)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default overall timeout for one wait (10 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Upper bound for a backed-off interval when no `max_interval` is set (10 minutes)
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(600);

/// Consecutive "not found" observations tolerated before giving up
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// What to do with a label that is neither pending nor target
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStatePolicy {
    /// Keep polling; unknown labels are assumed to be new interim states
    #[default]
    Pending,
    /// Resolve the wait with [`crate::WaitError::UnexpectedState`]
    Fail,
}

/// Classification of one observed label against a [`WaitSpec`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateClass {
    /// Label is in the target set
    Target,
    /// Label is in the pending set
    Pending,
    /// Label is in neither set
    Unknown,
}

/// Reasons a [`WaitSpec`] is rejected before the first probe
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SpecError {
    /// A convergence wait with nothing to converge to
    #[error("target state set must not be empty")]
    EmptyTarget,

    /// Zero poll interval would spin on the control plane
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    /// Zero timeout would expire before the first probe
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// Backoff multiplier below 1.0 would shrink the interval
    #[error("backoff multiplier must be a finite value >= 1.0, got {0}")]
    InvalidBackoff(f64),

    /// Cap below the floor
    #[error("max interval {max:?} is shorter than poll interval {min:?}")]
    MaxIntervalBelowPollInterval {
        /// Configured poll interval
        min: Duration,
        /// Configured max interval
        max: Duration,
    },

    /// Success would never be reported
    #[error("continuous target occurrence must be at least 1")]
    ZeroTargetOccurrence,
}

/// Immutable configuration for one polling session.
///
/// Built with [`WaitSpec::new`] and the `with_*` methods, or deserialized
/// from YAML/JSON where durations are humantime strings (`"10s"`, `"5m"`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WaitSpec {
    /// Labels that mean the operation is still in progress
    pub pending: Vec<String>,
    /// Labels that mean the resource has converged
    pub target: Vec<String>,
    /// Delay before the first probe
    #[serde(with = "duration_str")]
    pub initial_delay: Duration,
    /// Minimum spacing between probes
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    /// Cap for a backed-off interval
    #[serde(
        with = "duration_str::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_interval: Option<Duration>,
    /// Interval multiplier applied after every probe (1.0 = fixed interval)
    pub backoff: f64,
    /// Spread each sleep upward by up to 50%
    pub jitter: bool,
    /// Maximum wall-clock duration of the session
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    /// Handling of labels outside both sets
    pub unknown_state: UnknownStatePolicy,
    /// Consecutive "not found" observations tolerated
    pub not_found_checks: u32,
    /// Consecutive target observations required for success
    pub continuous_target_occurrence: u32,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            initial_delay: Duration::ZERO,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_interval: None,
            backoff: 1.0,
            jitter: false,
            timeout: DEFAULT_TIMEOUT,
            unknown_state: UnknownStatePolicy::default(),
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurrence: 1,
        }
    }
}

impl WaitSpec {
    /// Create a spec from pending and target label sets with default timing
    pub fn new<P, T>(pending: P, target: T) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: dedup(pending),
            target: dedup(target),
            ..Default::default()
        }
    }

    /// Set the delay before the first probe
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the minimum spacing between probes
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Grow the interval by `multiplier` after each probe, up to `max_interval`
    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff = multiplier;
        self.max_interval = Some(max_interval);
        self
    }

    /// Enable upward jitter on each sleep
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the overall timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the policy for labels outside both sets
    pub fn with_unknown_state(mut self, policy: UnknownStatePolicy) -> Self {
        self.unknown_state = policy;
        self
    }

    /// Set how many consecutive "not found" observations are tolerated
    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Require the target to be observed `occurrences` times in a row
    pub fn with_continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = occurrences;
        self
    }

    /// Classify a label. Target wins when a label is in both sets.
    pub fn classify(&self, label: &str) -> StateClass {
        if self.target.iter().any(|t| t == label) {
            StateClass::Target
        } else if self.pending.iter().any(|p| p == label) {
            StateClass::Pending
        } else {
            StateClass::Unknown
        }
    }

    /// Effective cap for the inter-probe interval
    pub fn effective_max_interval(&self) -> Duration {
        self.max_interval
            .unwrap_or(DEFAULT_MAX_INTERVAL)
            .max(self.poll_interval)
    }

    /// Validate a spec for a convergence wait
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.target.is_empty() {
            return Err(SpecError::EmptyTarget);
        }
        self.validate_timing()
    }

    /// Validate a spec for a deletion wait, where the target set may be empty
    pub fn validate_for_absence(&self) -> Result<(), SpecError> {
        self.validate_timing()
    }

    fn validate_timing(&self) -> Result<(), SpecError> {
        if self.poll_interval.is_zero() {
            return Err(SpecError::ZeroPollInterval);
        }
        if self.timeout.is_zero() {
            return Err(SpecError::ZeroTimeout);
        }
        if !self.backoff.is_finite() || self.backoff < 1.0 {
            return Err(SpecError::InvalidBackoff(self.backoff));
        }
        if let Some(max) = self.max_interval {
            if max < self.poll_interval {
                return Err(SpecError::MaxIntervalBelowPollInterval {
                    min: self.poll_interval,
                    max,
                });
            }
        }
        if self.continuous_target_occurrence == 0 {
            return Err(SpecError::ZeroTargetOccurrence);
        }
        Ok(())
    }
}

fn dedup<I>(labels: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.into();
        if !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

/// Humantime (de)serialization for [`Duration`] fields
pub(crate) mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => serializer.collect_str(&humantime::format_duration(*d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| humantime::parse_duration(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
