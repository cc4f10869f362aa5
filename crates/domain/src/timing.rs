//! Per-stage execution timings.

use serde::{Deserialize, Serialize};

/// One phase of the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Pre-request script.
    PreScript,
    /// Network send/receive.
    Request,
    /// Response normalization and structured parse.
    ParseResponse,
    /// Post-response script.
    PostScript,
    /// Assertions and test script.
    Test,
}

impl Stage {
    /// Returns the stage name used in displays and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreScript => "preScript",
            Self::Request => "request",
            Self::ParseResponse => "parseResponse",
            Self::PostScript => "postScript",
            Self::Test => "test",
        }
    }
}

/// Ordered stage durations for one run.
///
/// A stage appears only if it executed; absence means "not executed",
/// not zero. `total` is wall-clock from pipeline start to terminal
/// state, independent of the per-stage sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StageTimings {
    entries: Vec<(Stage, u64)>,
    total_ms: u64,
}

impl StageTimings {
    /// Builds timings from recorded entries and the overall wall-clock.
    #[must_use]
    pub const fn new(entries: Vec<(Stage, u64)>, total_ms: u64) -> Self {
        Self { entries, total_ms }
    }

    /// Returns the duration of a stage, if it executed.
    #[must_use]
    pub fn get(&self, stage: Stage) -> Option<u64> {
        self.entries
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, ms)| *ms)
    }

    /// Returns the recorded stages in execution order.
    #[must_use]
    pub fn entries(&self) -> &[(Stage, u64)] {
        &self.entries
    }

    /// Wall-clock duration of the whole run in milliseconds.
    #[must_use]
    pub const fn total_ms(&self) -> u64 {
        self.total_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn skipped_stages_are_absent() {
        let timings = StageTimings::new(vec![(Stage::Request, 120), (Stage::Test, 3)], 130);
        assert_eq!(timings.get(Stage::Request), Some(120));
        assert_eq!(timings.get(Stage::PreScript), None);
        assert_eq!(timings.total_ms(), 130);
    }

    #[test]
    fn entries_preserve_order() {
        let timings = StageTimings::new(
            vec![(Stage::PreScript, 1), (Stage::Request, 2)],
            3,
        );
        let stages: Vec<_> = timings.entries().iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, vec![Stage::PreScript, Stage::Request]);
    }
}
