//! System clock adapter.

use chrono::{DateTime, Utc};

use quiver_application::ports::Clock;

/// Wall-clock implementation of the [`Clock`] port.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a system clock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
