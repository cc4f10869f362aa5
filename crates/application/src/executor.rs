//! The execution pipeline orchestrator.
//!
//! Drives one run through its stages: scope resolution and
//! interpolation, pre-request script, transport send, response parse,
//! post-response script, then assertions and the test script. The
//! cancellation token is checked at every stage boundary; a fired token
//! seals the run as `Cancelled` with whatever was produced so far.
//! Script failures are stage-scoped and never abort the pipeline;
//! transport failures are fatal.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use tracing::debug;

use quiver_domain::{
    ApiKeyPlacement, AssertionResult, AuthConfig, ExecutionResult, FailureInfo, InterpolationWarning,
    LogEntry, RequestContext, RequestDraft, RequestId, ResolvedScope, ResponseData, RunId,
    RunState, ScriptFailure, ScriptOutcome, ScriptStage, Stage, StageLog, TestResults,
};

use crate::cancel::CancellationRegistry;
use crate::interpolate::Interpolator;
use crate::ports::{Clock, ScriptEngine, ScriptInvocation, TestRunner, Transport};
use crate::scope::ScopeResolver;
use crate::store::ResponseStore;
use crate::timing::TimingRecorder;

/// Default wall-clock budget for one script stage.
pub const DEFAULT_SCRIPT_TIMEOUT_MS: u64 = 5_000;

/// Tunables for the execution engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Per-stage script budget in milliseconds.
    pub script_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            script_timeout_ms: DEFAULT_SCRIPT_TIMEOUT_MS,
        }
    }
}

/// Everything accumulated while a run is in flight, sealed into an
/// [`ExecutionResult`] exactly once.
struct PendingRun {
    request_id: RequestId,
    run_id: RunId,
    sent_at: DateTime<Utc>,
    response: Option<ResponseData>,
    logs: Vec<StageLog>,
    tests: Option<TestResults>,
    pre_script_error: Option<ScriptFailure>,
    post_script_error: Option<ScriptFailure>,
    test_script_error: Option<ScriptFailure>,
    error: Option<FailureInfo>,
    warnings: Vec<InterpolationWarning>,
    next_request: Option<String>,
}

impl PendingRun {
    fn new(request_id: RequestId, run_id: RunId, sent_at: DateTime<Utc>) -> Self {
        Self {
            request_id,
            run_id,
            sent_at,
            response: None,
            logs: Vec::new(),
            tests: None,
            pre_script_error: None,
            post_script_error: None,
            test_script_error: None,
            error: None,
            warnings: Vec::new(),
            next_request: None,
        }
    }

    fn push_logs(&mut self, stage: Stage, entries: Vec<LogEntry>) {
        if !entries.is_empty() {
            self.logs.push(StageLog { stage, entries });
        }
    }

    /// Folds a sandbox outcome into the run, routing the error to the
    /// right stage slot.
    fn absorb(&mut self, stage: Stage, outcome: ScriptOutcome) -> Vec<AssertionResult> {
        self.push_logs(stage, outcome.logs);
        if outcome.next_request.is_some() {
            self.next_request = outcome.next_request;
        }
        match stage {
            Stage::PreScript => self.pre_script_error = outcome.error,
            Stage::PostScript => self.post_script_error = outcome.error,
            Stage::Test => self.test_script_error = outcome.error,
            Stage::Request | Stage::ParseResponse => {}
        }
        outcome.assertions
    }
}

/// Runs requests through the pipeline and records their results.
///
/// Generic over its ports so tests drive it with in-memory fakes.
pub struct ExecutionEngine<T, S, R, C> {
    transport: T,
    scripts: S,
    tests: R,
    clock: C,
    resolver: ScopeResolver,
    store: Arc<ResponseStore>,
    registry: CancellationRegistry,
    config: EngineConfig,
}

impl<T, S, R, C> ExecutionEngine<T, S, R, C>
where
    T: Transport,
    S: ScriptEngine,
    R: TestRunner,
    C: Clock,
{
    /// Creates an engine with default tunables.
    #[must_use]
    pub fn new(
        transport: T,
        scripts: S,
        tests: R,
        clock: C,
        resolver: ScopeResolver,
        store: Arc<ResponseStore>,
    ) -> Self {
        Self {
            transport,
            scripts,
            tests,
            clock,
            resolver,
            store,
            registry: CancellationRegistry::new(),
            config: EngineConfig::default(),
        }
    }

    /// Overrides the engine tunables.
    #[must_use]
    pub const fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the store this engine records into.
    #[must_use]
    pub const fn store(&self) -> &Arc<ResponseStore> {
        &self.store
    }

    /// Cancels the in-flight run for a request, if any. A no-op when
    /// nothing is in flight.
    pub fn cancel(&self, request_id: RequestId) {
        self.registry.cancel(request_id);
    }

    /// Executes one request end to end and records the result.
    ///
    /// Sending again for the same request cancels the run already in
    /// flight; the superseded run records its `Cancelled` result before
    /// this run records its own, so the latest result is always this
    /// run's.
    pub async fn send(&self, context: RequestContext) -> Arc<ExecutionResult> {
        let request_id = context.request_id;
        let run_id = RunId::new();
        let handle = self.registry.begin(request_id, run_id);
        // Serializes with the superseded run's result recording.
        let _gate = handle.acquire().await;

        let mut recorder = TimingRecorder::new(&self.clock);
        let mut pending = PendingRun::new(request_id, run_id, recorder.started_at());
        let mut state = RunState::Idle;
        debug!(%request_id, %run_id, "run started");

        if handle.token.is_cancelled() {
            return self.seal(pending, advance(&mut state, RunState::Cancelled), recorder);
        }
        advance(&mut state, RunState::Interpolating);
        let mut scope = self.resolver.resolve(&context);
        let mut draft =
            RequestDraft::from_definition(&context.request, &context.collection.defaults);
        pending.warnings = Interpolator::new(&scope).interpolate_draft(&mut draft);
        apply_auth(
            &mut draft,
            context.request.auth.effective(&context.collection.auth),
            &scope,
        );
        debug!(%request_id, url = %draft.url, state = state.as_str(), "request resolved");

        if handle.token.is_cancelled() {
            return self.seal(pending, advance(&mut state, RunState::Cancelled), recorder);
        }
        advance(&mut state, RunState::RunningPreScript);
        let pre_source = context.pre_request_source();
        if !pre_source.is_empty() {
            let start = self.clock.now();
            let mut outcome = self
                .scripts
                .run(
                    pre_source.text(),
                    ScriptInvocation {
                        stage: ScriptStage::PreRequest,
                        scope: &mut scope,
                        draft: &mut draft,
                        response: None,
                    },
                    handle.token.clone(),
                    self.config.script_timeout_ms,
                )
                .await;
            if let Some(error) = outcome.error.as_mut() {
                pre_source.attribute(error);
            }
            recorder.record(&self.clock, Stage::PreScript, start);
            pending.absorb(Stage::PreScript, outcome);
        }

        if handle.token.is_cancelled() {
            return self.seal(pending, advance(&mut state, RunState::Cancelled), recorder);
        }
        advance(&mut state, RunState::Sending);
        let start = self.clock.now();
        let sent = self.transport.send(&draft, handle.token.clone()).await;
        recorder.record(&self.clock, Stage::Request, start);
        let mut response = match sent {
            Ok(response) => response,
            Err(error) if error.is_aborted() => {
                return self.seal(pending, advance(&mut state, RunState::Cancelled), recorder);
            }
            Err(error) => {
                pending.error = Some(FailureInfo::new(error.kind(), error.to_string()));
                return self.seal(pending, advance(&mut state, RunState::Failed), recorder);
            }
        };
        debug!(%request_id, status = response.status, state = state.as_str(), "response received");

        if handle.token.is_cancelled() {
            pending.response = Some(response);
            return self.seal(pending, advance(&mut state, RunState::Cancelled), recorder);
        }
        advance(&mut state, RunState::ParsingResponse);
        let start = self.clock.now();
        if draft.parse_response_json {
            response.parse_body();
        }
        recorder.record(&self.clock, Stage::ParseResponse, start);

        let mut assertions: Vec<AssertionResult> = Vec::new();
        if handle.token.is_cancelled() {
            pending.response = Some(response);
            return self.seal(pending, advance(&mut state, RunState::Cancelled), recorder);
        }
        advance(&mut state, RunState::RunningPostScript);
        let post_source = context.post_response_source();
        if !post_source.is_empty() {
            let start = self.clock.now();
            let mut outcome = self
                .scripts
                .run(
                    post_source.text(),
                    ScriptInvocation {
                        stage: ScriptStage::PostResponse,
                        scope: &mut scope,
                        draft: &mut draft,
                        response: Some(&mut response),
                    },
                    handle.token.clone(),
                    self.config.script_timeout_ms,
                )
                .await;
            if let Some(error) = outcome.error.as_mut() {
                post_source.attribute(error);
            }
            recorder.record(&self.clock, Stage::PostScript, start);
            assertions.extend(pending.absorb(Stage::PostScript, outcome));
        }

        if handle.token.is_cancelled() {
            pending.response = Some(response);
            return self.seal(pending, advance(&mut state, RunState::Cancelled), recorder);
        }
        advance(&mut state, RunState::RunningTests);
        let test_source = context.test_source();
        let has_tests = !context.request.assertions.is_empty() || !test_source.is_empty();
        if has_tests {
            let start = self.clock.now();
            assertions.splice(
                0..0,
                self.tests.run(&context.request.assertions, &response),
            );
            if !test_source.is_empty() {
                let mut outcome = self
                    .scripts
                    .run(
                        test_source.text(),
                        ScriptInvocation {
                            stage: ScriptStage::Test,
                            scope: &mut scope,
                            draft: &mut draft,
                            response: Some(&mut response),
                        },
                        handle.token.clone(),
                        self.config.script_timeout_ms,
                    )
                    .await;
                if let Some(error) = outcome.error.as_mut() {
                    test_source.attribute(error);
                }
                assertions.extend(pending.absorb(Stage::Test, outcome));
            }
            let elapsed = recorder.record(&self.clock, Stage::Test, start);
            pending.tests = Some(TestResults::new(assertions, elapsed));
        } else if !assertions.is_empty() {
            pending.tests = Some(TestResults::new(assertions, 0));
        }

        pending.response = Some(response);
        let terminal = if handle.token.is_cancelled() {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        self.seal(pending, advance(&mut state, terminal), recorder)
    }

    /// Finalizes the run exactly once: freezes timings, records into
    /// the store, and releases the cancellation slot.
    fn seal(
        &self,
        pending: PendingRun,
        state: RunState,
        recorder: TimingRecorder,
    ) -> Arc<ExecutionResult> {
        let completed_at = self.clock.now();
        let timings = recorder.finish(&self.clock);
        debug!(
            request_id = %pending.request_id,
            run_id = %pending.run_id,
            state = state.as_str(),
            total_ms = timings.total_ms(),
            "run sealed"
        );

        let result = ExecutionResult {
            request_id: pending.request_id,
            run_id: pending.run_id,
            state,
            response: pending.response,
            timings,
            logs: pending.logs,
            tests: pending.tests,
            pre_script_error: pending.pre_script_error,
            post_script_error: pending.post_script_error,
            test_script_error: pending.test_script_error,
            error: pending.error,
            warnings: pending.warnings,
            next_request: pending.next_request,
            sent_at: pending.sent_at,
            completed_at,
        };

        let shared = self.store.record(result);
        self.registry.release(pending.request_id, pending.run_id);
        shared
    }
}

/// Moves the tracked pipeline state to `target`, enforcing the
/// [`RunState`] transition rules. Stages with nothing to do still pass
/// through their state, so only the jump to `Cancelled`/`Failed` skips
/// ahead.
fn advance(state: &mut RunState, target: RunState) -> RunState {
    debug_assert!(
        state.may_advance_to(target),
        "illegal run state transition: {} -> {}",
        state.as_str(),
        target.as_str()
    );
    *state = target;
    target
}

/// Applies the effective auth to the draft, interpolating its values.
///
/// Explicit draft headers set by the user or a script keep priority:
/// auth never overwrites an existing `Authorization` header.
fn apply_auth(draft: &mut RequestDraft, auth: &AuthConfig, scope: &ResolvedScope) {
    let interpolator = Interpolator::new(scope);
    let resolve = |value: &str| interpolator.interpolate(value).text;

    match auth {
        AuthConfig::None | AuthConfig::Inherit => {}
        AuthConfig::Basic { username, password } => {
            if draft.header("authorization").is_none() {
                let credentials =
                    BASE64.encode(format!("{}:{}", resolve(username), resolve(password)));
                draft.set_header("Authorization", format!("Basic {credentials}"));
            }
        }
        AuthConfig::Bearer { token } => {
            if draft.header("authorization").is_none() {
                draft.set_header("Authorization", format!("Bearer {}", resolve(token)));
            }
        }
        AuthConfig::ApiKey {
            key,
            value,
            placement,
        } => match placement {
            ApiKeyPlacement::Header => draft.set_header(&resolve(key), resolve(value)),
            ApiKeyPlacement::Query => draft.add_query_param(resolve(key), resolve(value)),
        },
    }
}
