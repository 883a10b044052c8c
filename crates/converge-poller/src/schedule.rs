//! Inter-probe interval schedule
//!
//! The interval starts at the spec's poll interval and optionally grows
//! geometrically after every probe, capped at the spec's max interval.
//! Jitter only ever lengthens a sleep, so the poll interval stays a hard floor.

use std::time::Duration;

use rand::Rng;

use crate::spec::WaitSpec;

/// Produces the sleep between consecutive probes of one session.
#[derive(Clone, Debug)]
pub struct PollSchedule {
    current: Duration,
    min: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
}

impl PollSchedule {
    /// Build the schedule described by `spec`
    pub fn from_spec(spec: &WaitSpec) -> Self {
        Self {
            current: spec.poll_interval,
            min: spec.poll_interval,
            max: spec.effective_max_interval(),
            multiplier: spec.backoff,
            jitter: spec.jitter,
        }
    }

    /// Delay to sleep before the next probe; advances the backoff
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;

        let delay = if self.jitter {
            // 1.0x to 1.5x, never below the floor
            let factor = rand::thread_rng().gen_range(1.0..1.5);
            self.scaled(base, factor).max(base)
        } else {
            base
        };

        if self.multiplier > 1.0 {
            self.current = self.scaled(base, self.multiplier).max(self.min);
        }

        delay
    }

    /// `base * factor`, capped at `max`; saturates to `max` when out of range
    fn scaled(&self, base: Duration, factor: f64) -> Duration {
        Duration::try_from_secs_f64(base.as_secs_f64() * factor)
            .map_or(self.max, |d| d.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> WaitSpec {
        WaitSpec::new(["build"], ["ready"]).with_poll_interval(Duration::from_secs(10))
    }

    #[test]
    fn fixed_interval_by_default() {
        let mut schedule = PollSchedule::from_spec(&spec());
        for _ in 0..5 {
            assert_eq!(schedule.next_delay(), Duration::from_secs(10));
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let spec = spec().with_backoff(2.0, Duration::from_secs(45));
        let mut schedule = PollSchedule::from_spec(&spec);

        let delays: Vec<_> = (0..5).map(|_| schedule.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(40),
                Duration::from_secs(45),
                Duration::from_secs(45),
            ]
        );
    }

    #[test]
    fn jitter_stays_within_floor_and_cap() {
        let spec = spec()
            .with_backoff(1.5, Duration::from_secs(30))
            .with_jitter(true);
        let mut schedule = PollSchedule::from_spec(&spec);

        for _ in 0..50 {
            let delay = schedule.next_delay();
            assert!(delay >= Duration::from_secs(10), "slept {:?}", delay);
            assert!(delay <= Duration::from_secs(30), "slept {:?}", delay);
        }
    }

    #[test]
    fn huge_interval_saturates_instead_of_overflowing() {
        let spec = WaitSpec::new(["build"], ["ready"])
            .with_poll_interval(Duration::from_secs(u64::MAX))
            .with_jitter(true);
        assert!(spec.validate().is_ok());

        let mut schedule = PollSchedule::from_spec(&spec);
        for _ in 0..3 {
            assert_eq!(schedule.next_delay(), Duration::from_secs(u64::MAX));
        }

        let mut spec = spec.with_jitter(false);
        spec.backoff = 2.0;
        let mut schedule = PollSchedule::from_spec(&spec);
        for _ in 0..3 {
            assert_eq!(schedule.next_delay(), Duration::from_secs(u64::MAX));
        }
    }

    #[test]
    fn uncapped_backoff_uses_default_ceiling() {
        let mut spec = spec();
        spec.backoff = 10.0;
        let mut schedule = PollSchedule::from_spec(&spec);

        let last = (0..10).map(|_| schedule.next_delay()).last().unwrap();
        assert_eq!(last, crate::spec::DEFAULT_MAX_INTERVAL);
    }
}
