//! Command-backed status probe
//!
//! Each probe runs the user's command once. A zero exit status means the
//! resource was read; its stdout is the snapshot and the status label is taken
//! from it. A configurable exit status means "not found". Anything else is a
//! probe error, which ends the wait.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use converge_poller::Observation;
use thiserror::Error;
use tokio::process::Command;
use tracing::trace;

/// Errors from a single command probe
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run probe command: {0}")]
    Spawn(#[from] io::Error),

    #[error("probe command exited with status {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("probe command was terminated by a signal")]
    Killed,

    #[error("probe output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no status label at JSON pointer '{pointer}'")]
    MissingLabel { pointer: String },

    #[error("probe command printed no status label")]
    EmptyOutput,
}

/// Captured result of one command run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status, `None` if terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a command to completion
///
/// Abstracted so probe logic can be tested without spawning processes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv[0]` with the remaining arguments
    async fn run(&self, argv: &[String]) -> io::Result<CommandOutput>;
}

/// [`CommandRunner`] backed by real child processes.
///
/// The child is killed if the probe future is dropped mid-run, which happens
/// when the wait is cancelled or times out.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty probe command"))?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Where the status label lives in the command's stdout
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LabelSource {
    /// First non-empty line, trimmed
    #[default]
    FirstLine,
    /// Value at an RFC 6901 JSON pointer (e.g. `/status/phase`)
    JsonPointer(String),
}

impl LabelSource {
    /// Extract the status label from command output
    pub fn extract(&self, stdout: &str) -> Result<String, ProbeError> {
        match self {
            LabelSource::FirstLine => stdout
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
                .ok_or(ProbeError::EmptyOutput),
            LabelSource::JsonPointer(pointer) => {
                let doc: serde_json::Value = serde_json::from_str(stdout)?;
                match doc.pointer(pointer) {
                    Some(serde_json::Value::String(s)) => Ok(s.clone()),
                    Some(v @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => {
                        Ok(v.to_string())
                    }
                    _ => Err(ProbeError::MissingLabel {
                        pointer: pointer.clone(),
                    }),
                }
            }
        }
    }
}

/// Probe that runs a command and classifies its output
pub struct CommandProbe<R> {
    runner: R,
    argv: Vec<String>,
    label_source: LabelSource,
    not_found_exit_code: Option<i32>,
}

impl<R: CommandRunner> CommandProbe<R> {
    pub fn new(runner: R, argv: Vec<String>) -> Self {
        Self {
            runner,
            argv,
            label_source: LabelSource::default(),
            not_found_exit_code: None,
        }
    }

    pub fn with_label_source(mut self, source: LabelSource) -> Self {
        self.label_source = source;
        self
    }

    /// Treat this exit status as "resource not found" instead of a failure
    pub fn with_not_found_exit_code(mut self, code: Option<i32>) -> Self {
        self.not_found_exit_code = code;
        self
    }

    /// Run the command once and turn its result into an observation
    pub async fn observe(&self) -> Result<Observation<String>, ProbeError> {
        let output = self.runner.run(&self.argv).await?;

        match output.code {
            Some(0) => {}
            Some(code) if Some(code) == self.not_found_exit_code => {
                trace!(code, "Probe command reported resource not found");
                return Ok(Observation::not_found());
            }
            Some(code) => {
                return Err(ProbeError::Exit {
                    code,
                    stderr: output.stderr.trim().to_string(),
                })
            }
            None => return Err(ProbeError::Killed),
        }

        let label = self.label_source.extract(&output.stdout)?;
        trace!(state = %label, "Probe command reported state");
        Ok(Observation::found(output.stdout, label))
    }
}
