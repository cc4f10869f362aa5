//! Time source port.

use chrono::{DateTime, Utc};

/// Supplies the wall-clock instants the pipeline stamps runs and stage
/// timings with.
///
/// Injected instead of read ambiently so tests can step time and assert
/// exact durations.
pub trait Clock: Send + Sync {
    /// The current UTC time.
    fn now(&self) -> DateTime<Utc>;
}
