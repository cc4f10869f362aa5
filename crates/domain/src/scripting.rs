//! Pre-request, post-response, and test scripting.
//!
//! Scripts are written in a small line-oriented DSL. Each statement maps
//! to one [`ScriptCommand`]; the command set IS the sandbox capability
//! surface. Anything outside it (host globals, filesystem, network) is
//! unreachable by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assertion::{AssertionResult, ComparisonOperator};
use crate::scope::LayerKind;

/// A script attached to a request, folder, or collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Script {
    /// The script source.
    pub content: String,
    /// Disabled scripts are kept but never run.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl Default for Script {
    fn default() -> Self {
        Self {
            content: String::new(),
            enabled: true,
        }
    }
}

impl Script {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a script with content.
    #[must_use]
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            enabled: true,
        }
    }

    /// Returns whether the script has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Returns the source if the script is enabled and non-empty.
    #[must_use]
    pub fn runnable_source(&self) -> Option<&str> {
        (self.enabled && !self.is_empty()).then_some(self.content.as_str())
    }
}

/// The scripts attached to one node of the collection tree.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RequestScripts {
    /// Runs before the request is sent.
    #[serde(default, skip_serializing_if = "Script::is_empty")]
    pub pre_request: Script,
    /// Runs after the response is parsed.
    #[serde(default, skip_serializing_if = "Script::is_empty")]
    pub post_response: Script,
    /// Test script, run in the test stage (request-level only).
    #[serde(default, skip_serializing_if = "Script::is_empty")]
    pub tests: Script,
}

impl RequestScripts {
    /// Creates empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pre-request script.
    #[must_use]
    pub fn with_pre_request(mut self, script: Script) -> Self {
        self.pre_request = script;
        self
    }

    /// Sets the post-response script.
    #[must_use]
    pub fn with_post_response(mut self, script: Script) -> Self {
        self.post_response = script;
        self
    }

    /// Sets the test script.
    #[must_use]
    pub fn with_tests(mut self, script: Script) -> Self {
        self.tests = script;
        self
    }
}

/// Which pipeline stage a script runs in.
///
/// Each stage exposes a defined subset of the capability surface:
/// `req.*` mutators are pre-request only, `res.*` accessors need a
/// response, and `test`/`assert` need a test-capable stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStage {
    /// Before the request is sent.
    PreRequest,
    /// After the response is parsed.
    PostResponse,
    /// Test stage (assertion-capable).
    Test,
}

impl ScriptStage {
    /// Returns whether `test`/`assert` commands are allowed here.
    #[must_use]
    pub const fn is_test_capable(self) -> bool {
        matches!(self, Self::PostResponse | Self::Test)
    }
}

/// An operand of a `test`/`assert` comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operand {
    /// A literal value; may contain `{{placeholders}}`.
    Literal {
        /// The literal text.
        value: String,
    },
    /// `res.status` — the response status code.
    ResStatus,
    /// `res.body` — the response body text.
    ResBody,
    /// `res.responseTime` — transport-observed duration in milliseconds.
    ResResponseTime,
    /// `res.headers.<name>` — a response header value.
    ResHeader {
        /// Header name, matched case-insensitively.
        name: String,
    },
    /// `res.body.<path>` — a dotted path into the parsed response body.
    ResBodyPath {
        /// Dotted path below the body root.
        path: String,
    },
    /// `env.<name>` / `collection.<name>` / `folder.<name>` /
    /// `request.<name>` / `process.<name>` — a read targeting one scope
    /// layer, bypassing the innermost-wins lookup.
    LayerVar {
        /// Which layer to read from.
        layer: LayerKind,
        /// Variable name within that layer.
        name: String,
    },
    /// `bru.envName` — the selected environment's name.
    EnvName,
}

impl Operand {
    /// Creates a literal operand.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }
}

/// One parsed statement of the script DSL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ScriptCommand {
    /// `bru.setVar(name, value)` — write a runtime variable.
    SetVar {
        /// Variable name.
        name: String,
        /// Value, interpolated before the write.
        value: String,
    },
    /// `bru.deleteVar(name)` — delete a runtime variable.
    DeleteVar {
        /// Variable name.
        name: String,
    },
    /// `bru.setEnvVar(name, value)` — write into the environment layer.
    SetEnvVar {
        /// Variable name.
        name: String,
        /// Value, interpolated before the write.
        value: String,
    },
    /// `bru.setNextRequest(name)` — hint for collection runners.
    SetNextRequest {
        /// Name of the request to run next.
        name: String,
    },
    /// `bru.sleep(ms)` — awaited pause, observes cancellation.
    Sleep {
        /// Duration in milliseconds.
        millis: u64,
    },
    /// `req.setHeader(name, value)` — pre-request only.
    SetHeader {
        /// Header name.
        name: String,
        /// Header value.
        value: String,
    },
    /// `req.setUrl(url)` — pre-request only.
    SetUrl {
        /// New URL.
        url: String,
    },
    /// `req.setMethod(method)` — pre-request only.
    SetMethod {
        /// Method name, parsed case-insensitively.
        method: String,
    },
    /// `req.setBody(text)` — pre-request only; replaces the body content.
    SetRequestBody {
        /// New body text.
        body: String,
    },
    /// `req.setTimeout(ms)` — pre-request only.
    SetTimeout {
        /// Timeout in milliseconds.
        millis: u64,
    },
    /// `req.disableParsingResponseJson()` — skip the structured parse.
    DisableParsingResponseJson,
    /// `res.setBody(text)` — post-response only; rewrites the body.
    SetResponseBody {
        /// New body text.
        body: String,
    },
    /// `log(message)` — captured into the stage debug log.
    Log {
        /// Message, interpolated before capture.
        message: String,
    },
    /// `test(description, lhs, op, rhs)` — records an assertion result.
    Test {
        /// Human-readable description.
        description: String,
        /// Left operand.
        lhs: Operand,
        /// Comparison operator.
        op: ComparisonOperator,
        /// Right operand.
        rhs: Operand,
    },
    /// `assert(lhs, op, rhs)` — like `test`, but a failure also stops
    /// the remaining statements of the script.
    Assert {
        /// Left operand.
        lhs: Operand,
        /// Comparison operator.
        op: ComparisonOperator,
        /// Right operand.
        rhs: Operand,
    },
}

/// A captured console-style log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock capture time.
    pub at: DateTime<Utc>,
    /// The logged message.
    pub message: String,
}

impl LogEntry {
    /// Creates a log entry stamped with the current wall clock.
    #[must_use]
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

/// Why a script stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptFailureKind {
    /// The source failed to parse.
    Parse,
    /// A statement failed at runtime (bad capability use, failed assert).
    Runtime,
    /// The stage exceeded its wall-clock budget.
    Timeout,
}

/// A stage-scoped script error. Never fatal to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFailure {
    /// Failure category.
    pub kind: ScriptFailureKind,
    /// Human-readable message.
    pub message: String,
    /// Source line, where known. Relative to the originating script when
    /// `origin` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// The script the failure came from, where the stage ran several
    /// concatenated sources (`collection`, `folder:<name>`, `request`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ScriptFailure {
    /// Creates a parse failure.
    #[must_use]
    pub fn parse(message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            kind: ScriptFailureKind::Parse,
            message: message.into(),
            line,
            origin: None,
        }
    }

    /// Creates a runtime failure.
    #[must_use]
    pub fn runtime(message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            kind: ScriptFailureKind::Runtime,
            message: message.into(),
            line,
            origin: None,
        }
    }

    /// Creates a timeout failure.
    #[must_use]
    pub fn timeout(budget_ms: u64) -> Self {
        Self {
            kind: ScriptFailureKind::Timeout,
            message: format!("script exceeded its {budget_ms} ms budget"),
            line: None,
            origin: None,
        }
    }
}

/// Everything a sandbox invocation produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptOutcome {
    /// Captured log lines, in order.
    pub logs: Vec<LogEntry>,
    /// Assertion results from `test`/`assert` commands.
    pub assertions: Vec<AssertionResult>,
    /// The stage error, if the script failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScriptFailure>,
    /// Value of the last `bru.setNextRequest` call, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_request: Option<String>,
}

impl ScriptOutcome {
    /// Creates an empty outcome.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an outcome that failed before any statement ran.
    #[must_use]
    pub fn failed(failure: ScriptFailure) -> Self {
        Self {
            error: Some(failure),
            ..Self::default()
        }
    }
}
