//! Error types for the CLI

use converge_poller::WaitError;

use crate::probe::ProbeError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Exit status for a wait that ran out of time
pub const EXIT_TIMEOUT: u8 = 2;
/// Exit status for an unexpected state or a resource that never appeared
pub const EXIT_FAILED_STATE: u8 = 3;
/// Exit status after Ctrl-C
pub const EXIT_CANCELLED: u8 = 130;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid wait spec file {path}: {message}")]
    SpecFile { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("failed to initialize logging: {0}")]
    Telemetry(String),

    #[error(transparent)]
    Wait(#[from] WaitError<String, ProbeError>),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Wait(WaitError::Timeout { .. }) => EXIT_TIMEOUT,
            Error::Wait(WaitError::UnexpectedState { .. } | WaitError::NotFound { .. }) => {
                EXIT_FAILED_STATE
            }
            Error::Wait(WaitError::Cancelled { .. }) => EXIT_CANCELLED,
            _ => 1,
        }
    }
}
