//! The convergence polling loop
//!
//! A session probes sequentially, sleeping between probes according to its
//! [`PollSchedule`]. Three things can interrupt it at any suspension point:
//! the caller's cancellation token, the overall deadline, or a terminal
//! classification of the probe result. The in-flight probe future is raced
//! against the first two and dropped when they win, and the token handed to
//! the probe is cancelled when the session returns.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WaitError;
use crate::observation::Observation;
use crate::schedule::PollSchedule;
use crate::spec::{StateClass, UnknownStatePolicy, WaitSpec};

/// Stand-in for "no deadline" when `timeout` overflows the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Wait until the probe reports a target label.
///
/// Equivalent to [`wait_for_state_with_cancel`] with a token that is never
/// cancelled.
pub async fn wait_for_state<T, E, F, Fut>(
    description: &str,
    spec: &WaitSpec,
    probe: F,
) -> Result<T, WaitError<T, E>>
where
    T: Debug,
    E: std::error::Error + 'static,
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<Observation<T>, E>>,
{
    wait_for_state_with_cancel(description, spec, &CancellationToken::new(), probe).await
}

/// Wait until the probe reports a target label, or `cancel` fires.
///
/// # Arguments
/// * `description` - Human-readable name of the resource, used in logs and errors
/// * `spec` - Label sets and timing for this session
/// * `cancel` - Caller cancellation; a child of it is passed to every probe call
/// * `probe` - Performs exactly one status query per call
///
/// # Returns
/// The snapshot that carried the target label, or the error that ended the session.
pub async fn wait_for_state_with_cancel<T, E, F, Fut>(
    description: &str,
    spec: &WaitSpec,
    cancel: &CancellationToken,
    probe: F,
) -> Result<T, WaitError<T, E>>
where
    T: Debug,
    E: std::error::Error + 'static,
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<Observation<T>, E>>,
{
    spec.validate().map_err(|source| WaitError::InvalidSpec {
        description: description.to_string(),
        source,
    })?;

    let mut session = Session::new(description, spec, false);
    match session.run(cancel, probe).await? {
        Resolution::Converged(snapshot) => Ok(snapshot),
        // Absence only resolves a deletion wait
        Resolution::Absent => Err(WaitError::NotFound {
            description: description.to_string(),
            checks: session.not_found_streak,
        }),
    }
}

/// Wait until the resource is gone.
///
/// A [`Observation::NotFound`] probe result is success. If `spec.target` is
/// non-empty, a target label is accepted as well (e.g. a terminal `DELETED`
/// status that some control planes report before dropping the record).
pub async fn wait_for_absence<T, E, F, Fut>(
    description: &str,
    spec: &WaitSpec,
    cancel: &CancellationToken,
    probe: F,
) -> Result<(), WaitError<T, E>>
where
    T: Debug,
    E: std::error::Error + 'static,
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<Observation<T>, E>>,
{
    spec.validate_for_absence()
        .map_err(|source| WaitError::InvalidSpec {
            description: description.to_string(),
            source,
        })?;

    Session::new(description, spec, true)
        .run(cancel, probe)
        .await
        .map(|_| ())
}

enum Resolution<T> {
    Converged(T),
    Absent,
}

enum Step<T> {
    Continue,
    Done(Resolution<T>),
}

/// Mutable state of one running wait. Never shared, never outlives the call.
struct Session<'a, T> {
    description: &'a str,
    spec: &'a WaitSpec,
    accept_absence: bool,
    started: Instant,
    deadline: Instant,
    attempts: u32,
    last_label: Option<String>,
    last_snapshot: Option<T>,
    not_found_streak: u32,
    target_streak: u32,
}

impl<'a, T: Debug> Session<'a, T> {
    fn new(description: &'a str, spec: &'a WaitSpec, accept_absence: bool) -> Self {
        let started = Instant::now();
        let deadline = started
            .checked_add(spec.timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        Self {
            description,
            spec,
            accept_absence,
            started,
            deadline,
            attempts: 0,
            last_label: None,
            last_snapshot: None,
            not_found_streak: 0,
            target_streak: 0,
        }
    }

    async fn run<E, F, Fut>(
        &mut self,
        cancel: &CancellationToken,
        mut probe: F,
    ) -> Result<Resolution<T>, WaitError<T, E>>
    where
        E: std::error::Error + 'static,
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<Observation<T>, E>>,
    {
        let probe_token = cancel.child_token();
        // Stops any work the probe left running once the session resolves
        let _probe_guard = probe_token.clone().drop_guard();
        let mut schedule = PollSchedule::from_spec(self.spec);

        if !self.spec.initial_delay.is_zero() {
            debug!(
                resource = %self.description,
                delay_ms = self.spec.initial_delay.as_millis() as u64,
                "Delaying first probe"
            );
            self.suspend(self.spec.initial_delay, cancel).await?;
        }

        loop {
            if Instant::now() >= self.deadline {
                return Err(self.timed_out());
            }

            self.attempts += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled()),
                _ = sleep_until(self.deadline) => return Err(self.timed_out()),
                result = probe(probe_token.clone()) => result,
            };

            let observation = match result {
                Ok(observation) => observation,
                Err(source) => {
                    warn!(
                        resource = %self.description,
                        attempt = self.attempts,
                        error = %source,
                        "Probe failed, aborting wait"
                    );
                    return Err(WaitError::Probe {
                        description: self.description.to_string(),
                        attempt: self.attempts,
                        source,
                    });
                }
            };

            if let Step::Done(resolution) = self.observe(observation)? {
                return Ok(resolution);
            }

            let delay = schedule.next_delay();
            self.suspend(delay, cancel).await?;
        }
    }

    /// Classify one observation and update the streak counters
    fn observe<E>(&mut self, observation: Observation<T>) -> Result<Step<T>, WaitError<T, E>>
    where
        E: std::error::Error + 'static,
    {
        let (snapshot, label) = match observation {
            Observation::NotFound => return self.observe_missing(),
            Observation::Found { snapshot, label } => (snapshot, label),
        };
        self.not_found_streak = 0;

        debug!(
            resource = %self.description,
            attempt = self.attempts,
            state = %label,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Probe observed state"
        );

        match self.spec.classify(&label) {
            StateClass::Target => {
                self.target_streak += 1;
                if self.target_streak >= self.spec.continuous_target_occurrence {
                    info!(
                        resource = %self.description,
                        state = %label,
                        attempts = self.attempts,
                        elapsed_ms = self.started.elapsed().as_millis() as u64,
                        "Resource reached target state"
                    );
                    return Ok(Step::Done(Resolution::Converged(snapshot)));
                }
            }
            StateClass::Pending => self.target_streak = 0,
            StateClass::Unknown => {
                self.target_streak = 0;
                match self.spec.unknown_state {
                    UnknownStatePolicy::Pending => {
                        warn!(
                            resource = %self.description,
                            state = %label,
                            "Unexpected state, treating as pending"
                        );
                    }
                    UnknownStatePolicy::Fail => {
                        warn!(
                            resource = %self.description,
                            state = %label,
                            "Unexpected state, aborting wait"
                        );
                        return Err(WaitError::UnexpectedState {
                            description: self.description.to_string(),
                            label,
                            expected: self.spec.target.clone(),
                            attempt: self.attempts,
                            snapshot,
                        });
                    }
                }
            }
        }

        self.last_label = Some(label);
        self.last_snapshot = Some(snapshot);
        Ok(Step::Continue)
    }

    fn observe_missing<E>(&mut self) -> Result<Step<T>, WaitError<T, E>>
    where
        E: std::error::Error + 'static,
    {
        self.target_streak = 0;

        if self.accept_absence {
            info!(
                resource = %self.description,
                attempts = self.attempts,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "Resource is gone"
            );
            return Ok(Step::Done(Resolution::Absent));
        }

        self.not_found_streak += 1;
        if self.not_found_streak > self.spec.not_found_checks {
            warn!(
                resource = %self.description,
                checks = self.not_found_streak,
                "Resource still not found, aborting wait"
            );
            return Err(WaitError::NotFound {
                description: self.description.to_string(),
                checks: self.not_found_streak,
            });
        }

        debug!(
            resource = %self.description,
            attempt = self.attempts,
            checks = self.not_found_streak,
            "Resource not found yet"
        );
        Ok(Step::Continue)
    }

    /// Sleep for `delay`, cut short by cancellation or the deadline
    async fn suspend<E>(
        &mut self,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), WaitError<T, E>>
    where
        E: std::error::Error + 'static,
    {
        let wake = Instant::now()
            .checked_add(delay)
            .map_or(self.deadline, |wake| wake.min(self.deadline));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(self.cancelled()),
            _ = sleep_until(wake) => Ok(()),
        }
    }

    fn timed_out<E>(&mut self) -> WaitError<T, E>
    where
        E: std::error::Error + 'static,
    {
        let elapsed = self.started.elapsed();
        warn!(
            resource = %self.description,
            attempts = self.attempts,
            state = self.last_label.as_deref().unwrap_or("none"),
            elapsed_ms = elapsed.as_millis() as u64,
            "Timed out waiting for target state"
        );
        WaitError::Timeout {
            description: self.description.to_string(),
            timeout: self.spec.timeout,
            elapsed,
            attempts: self.attempts,
            expected: self.spec.target.clone(),
            last_label: self.last_label.take(),
            last_snapshot: self.last_snapshot.take(),
        }
    }

    fn cancelled<E>(&mut self) -> WaitError<T, E>
    where
        E: std::error::Error + 'static,
    {
        debug!(
            resource = %self.description,
            attempts = self.attempts,
            "Wait cancelled"
        );
        WaitError::Cancelled {
            description: self.description.to_string(),
            attempts: self.attempts,
            elapsed: self.started.elapsed(),
            last_label: self.last_label.clone(),
        }
    }
}
