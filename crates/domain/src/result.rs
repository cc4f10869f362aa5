//! The immutable record of one completed run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assertion::TestResults;
use crate::id::{RequestId, RunId};
use crate::response::ResponseData;
use crate::scripting::{LogEntry, ScriptFailure};
use crate::state::RunState;
use crate::timing::{Stage, StageTimings};

/// Category of a fatal run failure, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The resolved URL could not be parsed.
    InvalidUrl,
    /// DNS resolution failed.
    Dns,
    /// Connection could not be established.
    ConnectionFailed,
    /// Connection was refused.
    ConnectionRefused,
    /// The transport-level request timed out.
    Timeout,
    /// TLS negotiation failed.
    Tls,
    /// The request body could not be encoded.
    InvalidBody,
    /// The redirect limit was exceeded.
    TooManyRedirects,
    /// Unexpected failure.
    Other,
}

/// A fatal failure attached to a `Failed` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
}

impl FailureInfo {
    /// Creates failure info.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// An unresolved `{{placeholder}}` left verbatim during interpolation.
///
/// Not an error; surfaced so the UI can flag the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolationWarning {
    /// The request field the placeholder appeared in (e.g. "url").
    pub field: String,
    /// The placeholder name that did not resolve.
    pub placeholder: String,
}

/// Debug log entries captured during one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLog {
    /// The stage the entries belong to.
    pub stage: Stage,
    /// Captured entries, in order.
    pub entries: Vec<LogEntry>,
}

/// The complete, immutable record of one run.
///
/// Built exactly once when the run reaches a terminal state and handed
/// to the response store, which owns it from then on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The request this run belongs to.
    pub request_id: RequestId,
    /// Unique identifier of this run.
    pub run_id: RunId,
    /// Terminal state: `Completed`, `Failed`, or `Cancelled`.
    pub state: RunState,
    /// The response, if the send stage completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseData>,
    /// Per-stage timings; skipped stages are absent.
    pub timings: StageTimings,
    /// Debug logs grouped by stage.
    #[serde(default)]
    pub logs: Vec<StageLog>,
    /// Merged test-stage results, if the test stage ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestResults>,
    /// Pre-request script failure, if any. Non-fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_script_error: Option<ScriptFailure>,
    /// Post-response script failure, if any. Non-fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_script_error: Option<ScriptFailure>,
    /// Test script failure, if any. Non-fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_script_error: Option<ScriptFailure>,
    /// Fatal failure info; set only when `state` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
    /// Unresolved placeholder annotations.
    #[serde(default)]
    pub warnings: Vec<InterpolationWarning>,
    /// `bru.setNextRequest` hint for collection runners.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_request: Option<String>,
    /// When the run started.
    pub sent_at: DateTime<Utc>,
    /// When the run reached its terminal state.
    pub completed_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Returns whether the run reached `Completed`.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Returns whether the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state == RunState::Cancelled
    }

    /// Returns the log entries for one stage, if any were captured.
    #[must_use]
    pub fn stage_log(&self, stage: Stage) -> Option<&[LogEntry]> {
        self.logs
            .iter()
            .find(|l| l.stage == stage)
            .map(|l| l.entries.as_slice())
    }
}
