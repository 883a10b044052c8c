//! Status + health label composition
//!
//! Some waits only count as converged when the resource reports the target
//! status *and* a healthy health sub-condition. The engine sees one label per
//! probe, so the two are folded into one label here before classification.

/// Health value meaning the resource is fully healthy
pub const HEALTH_OK: &str = "OK";

/// Label reported while the target status is reached but health is not yet OK
pub const HEALTH_WARNING: &str = "WARNING";

/// Folds a status and a health sub-condition into one label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthGate<'a> {
    /// Health value that lets the target status through
    pub healthy: &'a str,
    /// Label substituted while the target status is held back by health
    pub degraded: &'a str,
}

impl Default for HealthGate<'_> {
    fn default() -> Self {
        Self {
            healthy: HEALTH_OK,
            degraded: HEALTH_WARNING,
        }
    }
}

impl HealthGate<'_> {
    /// Label for a resource in `status` with optional `health`.
    ///
    /// Returns `target` only when the status is the target and health is
    /// healthy. Every other combination maps to the degraded label, so interim
    /// statuses never reach classification as unknown labels.
    pub fn label(&self, status: &str, health: Option<&str>, target: &str) -> String {
        match health {
            Some(h) if status == target && h == self.healthy => target.to_string(),
            _ => self.degraded.to_string(),
        }
    }
}

/// [`HealthGate::label`] with the default `OK` / `WARNING` vocabulary
pub fn compose_health(status: &str, health: Option<&str>, target: &str) -> String {
    HealthGate::default().label(status, health, target)
}
