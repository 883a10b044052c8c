//! Error types for convergence waits
//!
//! Every variant is terminal for its session. Probe errors are carried
//! unmodified so callers can match on their own error type; timeouts carry
//! the last observation so the caller can report where the resource stalled.

use std::fmt::Debug;
use std::time::Duration;

use thiserror::Error;

use crate::spec::SpecError;

/// Terminal failure of one wait session.
///
/// `T` is the probe's snapshot type, `E` the probe's error type.
#[derive(Debug, Error)]
pub enum WaitError<T: Debug, E: std::error::Error + 'static> {
    /// The spec was rejected before any probe ran
    #[error("invalid wait specification for {description}: {source}")]
    InvalidSpec {
        /// What was being waited on
        description: String,
        /// Why the spec was rejected
        source: SpecError,
    },

    /// The status query itself failed; never retried
    #[error("probe failed for {description} on attempt {attempt}: {source}")]
    Probe {
        /// What was being waited on
        description: String,
        /// 1-based number of the failing probe
        attempt: u32,
        /// The probe's own error
        source: E,
    },

    /// Target not reached within the overall timeout
    #[error(
        "timeout after {timeout:?} waiting for {description} to reach {expected:?} \
         (last state: {}, {attempts} probes)",
        .last_label.as_deref().unwrap_or("none")
    )]
    Timeout {
        /// What was being waited on
        description: String,
        /// Configured overall timeout
        timeout: Duration,
        /// Time actually spent
        elapsed: Duration,
        /// Probes issued
        attempts: u32,
        /// Target labels
        expected: Vec<String>,
        /// Last label observed, if any probe completed with a found resource
        last_label: Option<String>,
        /// Snapshot that produced `last_label`
        last_snapshot: Option<T>,
    },

    /// The caller cancelled the wait
    #[error(
        "wait for {description} cancelled after {attempts} probes (last state: {})",
        .last_label.as_deref().unwrap_or("none")
    )]
    Cancelled {
        /// What was being waited on
        description: String,
        /// Probes issued
        attempts: u32,
        /// Time spent before cancellation
        elapsed: Duration,
        /// Last label observed
        last_label: Option<String>,
    },

    /// Label outside both sets under [`crate::UnknownStatePolicy::Fail`]
    #[error("unexpected state '{label}' for {description}, expected one of {expected:?}")]
    UnexpectedState {
        /// What was being waited on
        description: String,
        /// The unexpected label
        label: String,
        /// Target labels
        expected: Vec<String>,
        /// 1-based number of the probe that saw it
        attempt: u32,
        /// Snapshot carrying the unexpected label
        snapshot: T,
    },

    /// The resource stayed missing for more than the allowed number of checks
    #[error("{description} not found after {checks} consecutive checks")]
    NotFound {
        /// What was being waited on
        description: String,
        /// Consecutive "not found" observations
        checks: u32,
    },
}

impl<T: Debug, E: std::error::Error + 'static> WaitError<T, E> {
    /// Description of the wait this error belongs to
    pub fn description(&self) -> &str {
        match self {
            WaitError::InvalidSpec { description, .. }
            | WaitError::Probe { description, .. }
            | WaitError::Timeout { description, .. }
            | WaitError::Cancelled { description, .. }
            | WaitError::UnexpectedState { description, .. }
            | WaitError::NotFound { description, .. } => description,
        }
    }

    /// Check if the wait ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    /// Check if the caller cancelled the wait
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled { .. })
    }

    /// Last label observed before the session ended, when known
    pub fn last_label(&self) -> Option<&str> {
        match self {
            WaitError::Timeout { last_label, .. } | WaitError::Cancelled { last_label, .. } => {
                last_label.as_deref()
            }
            WaitError::UnexpectedState { label, .. } => Some(label),
            _ => None,
        }
    }

    /// Take the probe's own error, if that is what ended the session
    pub fn into_probe_error(self) -> Option<E> {
        match self {
            WaitError::Probe { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Take the last observed snapshot, if the error carries one
    pub fn into_last_snapshot(self) -> Option<T> {
        match self {
            WaitError::Timeout { last_snapshot, .. } => last_snapshot,
            WaitError::UnexpectedState { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Error)]
    #[error("connection refused")]
    struct Refused;

    type TestError = WaitError<String, Refused>;

    fn timeout(last_label: Option<&str>) -> TestError {
        WaitError::Timeout {
            description: "network net-1".to_string(),
            timeout: Duration::from_secs(300),
            elapsed: Duration::from_secs(300),
            attempts: 30,
            expected: vec!["NETWORK_READY".to_string()],
            last_label: last_label.map(str::to_string),
            last_snapshot: last_label.map(|l| format!("snapshot-{}", l)),
        }
    }

    /// Story: a stalled network reports where it stalled
    #[test]
    fn story_timeout_reports_last_state() {
        let err = timeout(Some("build"));
        let msg = err.to_string();
        assert!(msg.contains("timeout after 300s"));
        assert!(msg.contains("network net-1"));
        assert!(msg.contains("NETWORK_READY"));
        assert!(msg.contains("last state: build"));
        assert!(msg.contains("30 probes"));

        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
        assert_eq!(err.last_label(), Some("build"));
        assert_eq!(err.into_last_snapshot().as_deref(), Some("snapshot-build"));
    }

    #[test]
    fn timeout_without_observation_says_none() {
        let err = timeout(None);
        assert!(err.to_string().contains("last state: none"));
        assert_eq!(err.last_label(), None);
    }

    /// Story: a probe failure surfaces the caller's own error type unchanged
    #[test]
    fn story_probe_error_passes_through() {
        let err: TestError = WaitError::Probe {
            description: "port p-1".to_string(),
            attempt: 3,
            source: Refused,
        };
        assert!(err.to_string().contains("attempt 3"));
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.description(), "port p-1");
        assert_eq!(err.into_probe_error(), Some(Refused));
    }

    #[test]
    fn cancellation_is_distinct_from_timeout() {
        let err: TestError = WaitError::Cancelled {
            description: "instance vm-1".to_string(),
            attempts: 2,
            elapsed: Duration::from_secs(5),
            last_label: Some("ACTIVE".to_string()),
        };
        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("cancelled after 2 probes"));
        assert!(err.into_probe_error().is_none());
    }

    #[test]
    fn unexpected_state_carries_snapshot() {
        let err: TestError = WaitError::UnexpectedState {
            description: "instance vm-1".to_string(),
            label: "ERROR".to_string(),
            expected: vec!["ACTIVE".to_string()],
            attempt: 1,
            snapshot: "vm-1 in ERROR".to_string(),
        };
        assert!(err.to_string().contains("unexpected state 'ERROR'"));
        assert_eq!(err.last_label(), Some("ERROR"));
        assert_eq!(err.into_last_snapshot().as_deref(), Some("vm-1 in ERROR"));
    }

    #[test]
    fn invalid_spec_exposes_source() {
        let err: TestError = WaitError::InvalidSpec {
            description: "network net-1".to_string(),
            source: SpecError::EmptyTarget,
        };
        assert!(err.to_string().contains("target state set must not be empty"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
