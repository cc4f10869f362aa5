//! Stage duration recording.

use chrono::{DateTime, Utc};

use quiver_domain::{Stage, StageTimings};

use crate::ports::Clock;

/// Records per-stage durations while a run executes.
///
/// Durations come from the injected clock, so tests drive them
/// deterministically. The total is wall-clock from construction to
/// `finish`, independent of the per-stage sum.
pub struct TimingRecorder {
    started_at: DateTime<Utc>,
    entries: Vec<(Stage, u64)>,
}

impl TimingRecorder {
    /// Starts recording at the clock's current time.
    #[must_use]
    pub fn new(clock: &dyn Clock) -> Self {
        Self {
            started_at: clock.now(),
            entries: Vec::new(),
        }
    }

    /// Returns the recording start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Records a stage that ran from `start` until now, returning the
    /// elapsed milliseconds.
    pub fn record(&mut self, clock: &dyn Clock, stage: Stage, start: DateTime<Utc>) -> u64 {
        let elapsed = millis_between(start, clock.now());
        self.entries.push((stage, elapsed));
        elapsed
    }

    /// Finalizes into immutable timings.
    #[must_use]
    pub fn finish(self, clock: &dyn Clock) -> StageTimings {
        let total = millis_between(self.started_at, clock.now());
        StageTimings::new(self.entries, total)
    }
}

/// Saturating millisecond difference; a clock stepping backwards yields
/// zero rather than wrapping.
fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().try_into().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct SteppingClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl SteppingClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Utc::now()),
            }
        }

        fn advance(&self, ms: i64) {
            if let Ok(mut now) = self.now.lock() {
                *now += TimeDelta::milliseconds(ms);
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            self.now.lock().map(|n| *n).unwrap_or_else(|e| *e.into_inner())
        }
    }

    #[test]
    fn records_stage_durations_from_the_clock() {
        let clock = SteppingClock::new();
        let mut recorder = TimingRecorder::new(&clock);

        let start = clock.now();
        clock.advance(120);
        recorder.record(&clock, Stage::Request, start);

        clock.advance(30);
        let timings = recorder.finish(&clock);
        assert_eq!(timings.get(Stage::Request), Some(120));
        assert_eq!(timings.total_ms(), 150);
        assert_eq!(timings.get(Stage::PreScript), None);
    }

    #[test]
    fn backwards_clock_clamps_to_zero() {
        let clock = SteppingClock::new();
        let mut recorder = TimingRecorder::new(&clock);
        let start = clock.now();
        clock.advance(-500);
        recorder.record(&clock, Stage::Test, start);
        let timings = recorder.finish(&clock);
        assert_eq!(timings.get(Stage::Test), Some(0));
    }
}
