//! The execution pipeline state machine.

use serde::{Deserialize, Serialize};

/// State of one run of the execution pipeline.
///
/// Stages advance strictly in order; `Cancelled` and `Failed` are
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run in progress.
    #[default]
    Idle,
    /// Resolving scopes and substituting placeholders.
    Interpolating,
    /// Pre-request script is executing.
    RunningPreScript,
    /// The transport call is in flight.
    Sending,
    /// Normalizing and parsing the raw response.
    ParsingResponse,
    /// Post-response script is executing.
    RunningPostScript,
    /// Assertions and test script are executing.
    RunningTests,
    /// Terminal: the pipeline finished.
    Completed,
    /// Terminal: a transport-level failure short-circuited the run.
    Failed,
    /// Terminal: the run was cancelled.
    Cancelled,
}

impl RunState {
    /// Returns whether this is a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns the state that follows in the happy path, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Interpolating),
            Self::Interpolating => Some(Self::RunningPreScript),
            Self::RunningPreScript => Some(Self::Sending),
            Self::Sending => Some(Self::ParsingResponse),
            Self::ParsingResponse => Some(Self::RunningPostScript),
            Self::RunningPostScript => Some(Self::RunningTests),
            Self::RunningTests => Some(Self::Completed),
            Self::Completed | Self::Failed | Self::Cancelled => None,
        }
    }

    /// Returns whether advancing to `target` is a legal transition.
    ///
    /// Terminal states accept no further transitions; any non-terminal
    /// state may jump to `Cancelled` or `Failed`.
    #[must_use]
    pub const fn may_advance_to(self, target: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match target {
            Self::Cancelled | Self::Failed => true,
            other => match self.next() {
                Some(next) => next as u8 == other as u8,
                None => false,
            },
        }
    }

    /// Returns the state name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Interpolating => "interpolating",
            Self::RunningPreScript => "running_pre_script",
            Self::Sending => "sending",
            Self::ParsingResponse => "parsing_response",
            Self::RunningPostScript => "running_post_script",
            Self::RunningTests => "running_tests",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_strictly_ordered() {
        let mut state = RunState::Idle;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(state.may_advance_to(next));
            state = next;
            seen.push(state);
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(state, RunState::Completed);
    }

    #[test]
    fn cancel_reachable_from_any_non_terminal_state() {
        assert!(RunState::Sending.may_advance_to(RunState::Cancelled));
        assert!(RunState::Interpolating.may_advance_to(RunState::Failed));
        assert!(!RunState::Completed.may_advance_to(RunState::Cancelled));
        assert!(!RunState::Cancelled.may_advance_to(RunState::Cancelled));
    }

    #[test]
    fn stage_skips_are_not_legal_happy_path_moves() {
        assert!(!RunState::Interpolating.may_advance_to(RunState::Sending));
    }
}
