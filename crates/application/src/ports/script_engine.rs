//! Script engine port.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use quiver_domain::{RequestDraft, ResolvedScope, ResponseData, ScriptOutcome, ScriptStage};

/// Everything one sandbox invocation may touch.
///
/// The borrows define the capability surface per stage: the draft is
/// mutable only before the send, and a response exists only afterwards.
/// The scope's runtime layer is the one mutable variable store.
pub struct ScriptInvocation<'a> {
    /// Which stage is running.
    pub stage: ScriptStage,
    /// The run's variable scope; script writes land in the runtime or
    /// environment layer.
    pub scope: &'a mut ResolvedScope,
    /// The request draft; `req.*` mutators apply here pre-request.
    pub draft: &'a mut RequestDraft,
    /// The parsed response, present in post-response and test stages.
    pub response: Option<&'a mut ResponseData>,
}

/// Port for running a script stage inside the sandbox.
///
/// A script error is returned inside the outcome, never as an `Err`;
/// script failures are stage-scoped and the pipeline continues.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Runs `source` under the stage's capability surface, observing
    /// `cancel` between statements and during sleeps, within
    /// `budget_ms` of wall-clock.
    async fn run(
        &self,
        source: &str,
        invocation: ScriptInvocation<'_>,
        cancel: CancellationToken,
        budget_ms: u64,
    ) -> ScriptOutcome;
}
