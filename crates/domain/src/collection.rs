//! Read-only snapshots supplied by the collection/persistence layer.
//!
//! The pipeline never touches collection files; it receives these
//! snapshots at execution start and treats them as immutable (the
//! runtime variable layer is the only mutable scope during a run).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::RequestId;
use crate::request::{AuthConfig, RequestDefinition};
use crate::scripting::{RequestScripts, ScriptFailure};

/// Default limits applied when a request has no overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDefaults {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Redirect limit.
    pub max_redirects: u32,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_redirects: 10,
        }
    }
}

/// Snapshot of a collection root: variables, scripts, and auth defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CollectionSnapshot {
    /// Collection name.
    pub name: String,
    /// Collection-level variables.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    /// Collection-level scripts, run before folder and request scripts.
    #[serde(default)]
    pub scripts: RequestScripts,
    /// Auth applied when a request uses `AuthConfig::Inherit`.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Defaults for timeout and redirects.
    #[serde(default)]
    pub defaults: RequestDefaults,
}

/// Snapshot of one folder on the chain from collection root to request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FolderSnapshot {
    /// Folder name.
    pub name: String,
    /// Folder-level variables.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    /// Folder-level scripts.
    #[serde(default)]
    pub scripts: RequestScripts,
}

/// Snapshot of the selected environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EnvironmentSnapshot {
    /// Environment name (e.g. "staging").
    pub name: String,
    /// Environment variables.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

/// Everything the orchestrator needs to execute one request.
///
/// Folder chain ordering is outer → inner; collections are trees, so the
/// chain is acyclic by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Stable identifier of the open request.
    pub request_id: RequestId,
    /// Collection root snapshot.
    pub collection: CollectionSnapshot,
    /// Folder chain, outermost first.
    #[serde(default)]
    pub folders: Vec<FolderSnapshot>,
    /// Selected environment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentSnapshot>,
    /// The request to execute.
    pub request: RequestDefinition,
    /// Session variables carried over from earlier runs (runtime seed).
    #[serde(default)]
    pub session: HashMap<String, Value>,
}

impl RequestContext {
    /// Creates a minimal context for a standalone request.
    #[must_use]
    pub fn standalone(request: RequestDefinition) -> Self {
        Self {
            request_id: RequestId::new(),
            collection: CollectionSnapshot::default(),
            folders: Vec::new(),
            environment: None,
            request,
            session: HashMap::new(),
        }
    }

    /// Concatenates pre-request script sources, outer → inner.
    #[must_use]
    pub fn pre_request_source(&self) -> ScriptSource {
        let mut source = ScriptSource::default();
        if let Some(text) = self.collection.scripts.pre_request.runnable_source() {
            source.push("collection", text);
        }
        for folder in &self.folders {
            if let Some(text) = folder.scripts.pre_request.runnable_source() {
                source.push(format!("folder:{}", folder.name), text);
            }
        }
        if let Some(text) = self.request.scripts.pre_request.runnable_source() {
            source.push("request", text);
        }
        source
    }

    /// Concatenates post-response script sources, outer → inner.
    #[must_use]
    pub fn post_response_source(&self) -> ScriptSource {
        let mut source = ScriptSource::default();
        if let Some(text) = self.collection.scripts.post_response.runnable_source() {
            source.push("collection", text);
        }
        for folder in &self.folders {
            if let Some(text) = folder.scripts.post_response.runnable_source() {
                source.push(format!("folder:{}", folder.name), text);
            }
        }
        if let Some(text) = self.request.scripts.post_response.runnable_source() {
            source.push("request", text);
        }
        source
    }

    /// Returns the request's test script source, if runnable.
    #[must_use]
    pub fn test_source(&self) -> ScriptSource {
        let mut source = ScriptSource::default();
        if let Some(text) = self.request.scripts.tests.runnable_source() {
            source.push("request", text);
        }
        source
    }
}

/// One stage's concatenated script text, with the line span each
/// contributing script occupies so failures can be traced back to the
/// script they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSource {
    text: String,
    segments: Vec<SourceSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceSegment {
    origin: String,
    start_line: usize,
    lines: usize,
}

impl ScriptSource {
    fn push(&mut self, origin: impl Into<String>, source: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        let start_line = self.text.lines().count() + 1;
        self.text.push_str(source);
        self.segments.push(SourceSegment {
            origin: origin.into(),
            start_line,
            lines: source.lines().count(),
        });
    }

    /// Returns whether no script contributed any text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The concatenated text, one contributing script per span.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Rewrites a failure's line to be relative to the script that
    /// contributed it and tags the failure with that script's origin.
    pub fn attribute(&self, failure: &mut ScriptFailure) {
        let Some(line) = failure.line else { return };
        let segment = self
            .segments
            .iter()
            .find(|s| line >= s.start_line && line < s.start_line + s.lines);
        if let Some(segment) = segment {
            failure.origin = Some(segment.origin.clone());
            failure.line = Some(line - segment.start_line + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpMethod;
    use crate::scripting::Script;

    #[test]
    fn pre_request_source_concatenates_outer_to_inner() {
        let mut ctx = RequestContext::standalone(RequestDefinition::new(
            HttpMethod::Get,
            "https://api.test",
        ));
        ctx.collection.scripts.pre_request = Script::with_content("log(\"collection\")");
        ctx.folders.push(FolderSnapshot {
            name: "users".to_string(),
            scripts: RequestScripts::new()
                .with_pre_request(Script::with_content("log(\"folder\")")),
            ..FolderSnapshot::default()
        });
        ctx.request.scripts.pre_request = Script::with_content("log(\"request\")");

        let source = ctx.pre_request_source();
        let lines: Vec<_> = source.text().lines().collect();
        assert_eq!(
            lines,
            vec![
                "log(\"collection\")",
                "log(\"folder\")",
                "log(\"request\")"
            ]
        );
    }

    #[test]
    fn disabled_scripts_are_skipped() {
        let mut ctx = RequestContext::standalone(RequestDefinition::new(
            HttpMethod::Get,
            "https://api.test",
        ));
        let mut script = Script::with_content("log(\"off\")");
        script.enabled = false;
        ctx.request.scripts.pre_request = script;
        assert!(ctx.pre_request_source().is_empty());
    }

    #[test]
    fn failures_attribute_to_the_contributing_script() {
        let mut ctx = RequestContext::standalone(RequestDefinition::new(
            HttpMethod::Get,
            "https://api.test",
        ));
        ctx.collection.scripts.pre_request = Script::with_content("log(\"collection\")");
        ctx.request.scripts.pre_request =
            Script::with_content("log(\"first\")\nbogus(\"second\")");

        let source = ctx.pre_request_source();
        let mut failure = ScriptFailure::parse("unknown command 'bogus'", Some(3));
        source.attribute(&mut failure);

        assert_eq!(failure.origin.as_deref(), Some("request"));
        assert_eq!(failure.line, Some(2));
    }

    #[test]
    fn attribution_handles_sources_with_trailing_newlines() {
        let mut ctx = RequestContext::standalone(RequestDefinition::new(
            HttpMethod::Get,
            "https://api.test",
        ));
        ctx.collection.scripts.pre_request = Script::with_content("log(\"a\")\nlog(\"b\")\n");
        ctx.request.scripts.pre_request = Script::with_content("bogus(1)");

        let source = ctx.pre_request_source();
        let failing_line = source
            .text()
            .lines()
            .position(|l| l.starts_with("bogus"))
            .map(|i| i + 1);
        let mut failure = ScriptFailure::parse("unknown command 'bogus'", failing_line);
        source.attribute(&mut failure);

        assert_eq!(failure.origin.as_deref(), Some("request"));
        assert_eq!(failure.line, Some(1));
    }
}
