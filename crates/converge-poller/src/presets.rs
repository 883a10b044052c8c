//! Wait presets for common power-systems lifecycle operations
//!
//! Each preset encodes what "done" looks like for one kind of request:
//! a network is ready once it has a VLAN assigned, an attached port is
//! active once it is bound to an instance, and instance actions converge
//! when the instance reports the matching status with OK health.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::health::HEALTH_WARNING;
use crate::spec::WaitSpec;

/// Pending label while a resource is being built
pub const STATE_BUILD: &str = "build";
/// Pending label while the control plane retries internally
pub const STATE_RETRY: &str = "retry";
/// Target label for a network with an assigned VLAN
pub const STATE_NETWORK_READY: &str = "NETWORK_READY";
/// Instance or port is up
pub const STATE_ACTIVE: &str = "ACTIVE";
/// Instance is powered off
pub const STATE_SHUTOFF: &str = "SHUTOFF";

/// Timeout for instance actions (2 hours)
pub const INSTANCE_OPERATION_TIMEOUT: Duration = Duration::from_secs(120 * 60);

/// Unknown instance action name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown instance action '{0}'")]
pub struct UnknownAction(pub String);

/// Action requested on a virtual server instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceAction {
    /// Power on
    Start,
    /// Graceful power off
    Stop,
    /// Power off without OS shutdown
    ImmediateShutdown,
    /// OS-level reboot
    SoftReboot,
    /// Power-cycle reboot
    HardReboot,
    /// Reset the recorded instance state
    ResetState,
}

impl InstanceAction {
    /// Status the instance reports once the action has completed.
    ///
    /// `None` for actions whose completion is not observable through status.
    pub fn target_status(self) -> Option<&'static str> {
        match self {
            InstanceAction::Stop | InstanceAction::ImmediateShutdown => Some(STATE_SHUTOFF),
            InstanceAction::Start | InstanceAction::SoftReboot | InstanceAction::HardReboot => {
                Some(STATE_ACTIVE)
            }
            InstanceAction::ResetState => None,
        }
    }

    /// API name of the action
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceAction::Start => "start",
            InstanceAction::Stop => "stop",
            InstanceAction::ImmediateShutdown => "immediate-shutdown",
            InstanceAction::SoftReboot => "soft-reboot",
            InstanceAction::HardReboot => "hard-reboot",
            InstanceAction::ResetState => "reset-state",
        }
    }
}

impl fmt::Display for InstanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(InstanceAction::Start),
            "stop" => Ok(InstanceAction::Stop),
            "immediate-shutdown" => Ok(InstanceAction::ImmediateShutdown),
            "soft-reboot" => Ok(InstanceAction::SoftReboot),
            "hard-reboot" => Ok(InstanceAction::HardReboot),
            "reset-state" => Ok(InstanceAction::ResetState),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Network becomes ready once its VLAN identifier is assigned
pub fn network_ready(timeout: Duration) -> WaitSpec {
    WaitSpec::new([STATE_RETRY, STATE_BUILD], [STATE_NETWORK_READY])
        .with_initial_delay(Duration::from_secs(10))
        .with_poll_interval(Duration::from_secs(10))
        .with_timeout(timeout)
}

/// Network port is active once it is attached to an instance
pub fn port_attached(timeout: Duration) -> WaitSpec {
    WaitSpec::new([STATE_RETRY, STATE_BUILD], [STATE_ACTIVE])
        .with_initial_delay(Duration::from_secs(10))
        .with_poll_interval(Duration::from_secs(10 * 60))
        .with_timeout(timeout)
}

/// Wait for an instance action to take effect.
///
/// Probes should fold health into the label with [`crate::compose_health`],
/// so the target status is only reported once health is OK and every other
/// reading, including interim statuses such as `BUILD`, reads as `WARNING`.
pub fn instance_operation(action: InstanceAction) -> Option<WaitSpec> {
    let target = action.target_status()?;
    Some(
        WaitSpec::new([STATE_ACTIVE, STATE_SHUTOFF, HEALTH_WARNING], [target])
            .with_initial_delay(Duration::from_secs(60))
            .with_poll_interval(Duration::from_secs(120))
            .with_timeout(INSTANCE_OPERATION_TIMEOUT),
    )
}
