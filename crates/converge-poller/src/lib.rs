//! Convergence polling for asynchronous control-plane operations
//!
//! Control planes accept lifecycle requests (create, delete, start, stop)
//! immediately and converge in the background. This crate provides the one
//! reusable piece every call site needs: a bounded, cancellable loop that
//! probes the resource's status, classifies the label it reports, and resolves
//! to the converged snapshot or a classified [`WaitError`].
//!
//! # Example
//!
//! ```ignore
//! use converge_poller::{wait_for_state, Observation, WaitSpec};
//! use std::time::Duration;
//!
//! let spec = WaitSpec::new(["build", "retry"], ["NETWORK_READY"])
//!     .with_poll_interval(Duration::from_secs(10))
//!     .with_timeout(Duration::from_secs(300));
//!
//! let network = wait_for_state("network net-123", &spec, |_cancel| async {
//!     let network = client.get_network("net-123").await?;
//!     let label = if network.vlan_id.is_some() { "NETWORK_READY" } else { "build" };
//!     Ok::<_, ClientError>(Observation::found(network, label))
//! })
//! .await?;
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod health;
pub mod observation;
pub mod presets;
pub mod schedule;
pub mod spec;
pub mod wait;

pub use error::WaitError;
pub use health::{compose_health, HealthGate};
pub use observation::Observation;
pub use spec::{SpecError, StateClass, UnknownStatePolicy, WaitSpec};
pub use wait::{wait_for_absence, wait_for_state, wait_for_state_with_cancel};

pub use tokio_util::sync::CancellationToken;
