//! Quiver Domain - Core execution pipeline types
//!
//! This crate defines the domain model for the Quiver request execution
//! engine. All types here are pure Rust with no I/O dependencies.

pub mod assertion;
pub mod collection;
pub mod error;
pub mod id;
pub mod request;
pub mod response;
pub mod result;
pub mod scope;
pub mod scripting;
pub mod state;
pub mod timing;

pub use assertion::{
    Assertion, AssertionResult, ComparisonOperator, StatusExpectation, TestResults,
};
pub use collection::{
    CollectionSnapshot, EnvironmentSnapshot, FolderSnapshot, RequestContext, RequestDefaults,
    ScriptSource,
};
pub use error::{DomainError, DomainResult};
pub use id::{RequestId, RunId};
pub use request::{
    ApiKeyPlacement, AuthConfig, Header, HttpMethod, RequestBody, RequestDefinition, RequestDraft,
};
pub use response::{ResponseData, TlsInfo};
pub use result::{ExecutionResult, FailureInfo, FailureKind, InterpolationWarning, StageLog};
pub use scope::{LayerKind, ResolvedScope, ScopeLayer};
pub use scripting::{
    LogEntry, Operand, RequestScripts, Script, ScriptCommand, ScriptFailure, ScriptFailureKind,
    ScriptOutcome, ScriptStage,
};
pub use state::RunState;
pub use timing::{Stage, StageTimings};
