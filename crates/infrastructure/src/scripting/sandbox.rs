//! The script sandbox.
//!
//! Executes parsed DSL statements against the capability surface the
//! invocation exposes. There is no host access of any kind: a statement
//! can only touch the scope, the draft, and the response handed to it.
//! The cancellation token is observed between statements and during
//! sleeps, and the whole stage runs under a wall-clock budget.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use quiver_application::ports::{ScriptEngine, ScriptInvocation};
use quiver_application::Interpolator;
use quiver_domain::scope::stringify;
use quiver_domain::{
    AssertionResult, ComparisonOperator, HttpMethod, LayerKind, LogEntry, Operand, RequestBody,
    ResponseData, ScriptCommand, ScriptFailure, ScriptOutcome, ScriptStage,
};

use super::parser::parse_script;
use crate::compare;

/// DSL implementation of the [`ScriptEngine`] port.
#[derive(Debug, Clone, Copy, Default)]
pub struct DslSandbox;

impl DslSandbox {
    /// Creates a sandbox.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptEngine for DslSandbox {
    async fn run(
        &self,
        source: &str,
        mut invocation: ScriptInvocation<'_>,
        cancel: CancellationToken,
        budget_ms: u64,
    ) -> ScriptOutcome {
        let statements = match parse_script(source) {
            Ok(statements) => statements,
            Err(error) => {
                return ScriptOutcome::failed(ScriptFailure::parse(
                    error.to_string(),
                    Some(error.line()),
                ));
            }
        };

        let mut outcome = ScriptOutcome::new();
        let budget = Duration::from_millis(budget_ms);
        let timed_out = tokio::time::timeout(
            budget,
            execute(&statements, &mut invocation, &cancel, &mut outcome),
        )
        .await
        .is_err();

        if timed_out {
            outcome.error = Some(ScriptFailure::timeout(budget_ms));
        }
        debug!(
            stage = ?invocation.stage,
            statements = statements.len(),
            failed = outcome.error.is_some(),
            "script stage finished"
        );
        outcome
    }
}

async fn execute(
    statements: &[(usize, ScriptCommand)],
    invocation: &mut ScriptInvocation<'_>,
    cancel: &CancellationToken,
    outcome: &mut ScriptOutcome,
) {
    for (line, command) in statements {
        if cancel.is_cancelled() {
            return;
        }
        if let Err(failure) = apply(*line, command, invocation, cancel, outcome).await {
            outcome.error = Some(failure);
            return;
        }
    }
}

/// Runs one statement. An `Err` stops the remaining statements.
async fn apply(
    line: usize,
    command: &ScriptCommand,
    invocation: &mut ScriptInvocation<'_>,
    cancel: &CancellationToken,
    outcome: &mut ScriptOutcome,
) -> Result<(), ScriptFailure> {
    match command {
        ScriptCommand::SetVar { name, value } => {
            let value = resolve(invocation, value);
            invocation.scope.set_runtime(name.clone(), value.into());
        }
        ScriptCommand::DeleteVar { name } => invocation.scope.delete_runtime(name),
        ScriptCommand::SetEnvVar { name, value } => {
            let value = resolve(invocation, value);
            invocation
                .scope
                .set_environment_var(name.clone(), value.into());
        }
        ScriptCommand::SetNextRequest { name } => {
            outcome.next_request = Some(resolve(invocation, name));
        }
        ScriptCommand::Sleep { millis } => {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(Duration::from_millis(*millis)) => {}
            }
        }
        ScriptCommand::SetHeader { name, value } => {
            require_pre_request(invocation.stage, "req.setHeader", line)?;
            let value = resolve(invocation, value);
            invocation.draft.set_header(name, value);
        }
        ScriptCommand::SetUrl { url } => {
            require_pre_request(invocation.stage, "req.setUrl", line)?;
            invocation.draft.url = resolve(invocation, url);
        }
        ScriptCommand::SetMethod { method } => {
            require_pre_request(invocation.stage, "req.setMethod", line)?;
            invocation.draft.method = method
                .parse::<HttpMethod>()
                .map_err(|e| ScriptFailure::runtime(e.to_string(), Some(line)))?;
        }
        ScriptCommand::SetRequestBody { body } => {
            require_pre_request(invocation.stage, "req.setBody", line)?;
            let content = resolve(invocation, body);
            set_body_content(&mut invocation.draft.body, content);
        }
        ScriptCommand::SetTimeout { millis } => {
            require_pre_request(invocation.stage, "req.setTimeout", line)?;
            invocation.draft.timeout_ms = *millis;
        }
        ScriptCommand::DisableParsingResponseJson => {
            require_pre_request(invocation.stage, "req.disableParsingResponseJson", line)?;
            invocation.draft.parse_response_json = false;
        }
        ScriptCommand::SetResponseBody { body } => {
            let content = resolve(invocation, body);
            let Some(response) = invocation.response.as_deref_mut() else {
                return Err(ScriptFailure::runtime(
                    "res.setBody needs a response",
                    Some(line),
                ));
            };
            response.set_body_text(content);
        }
        ScriptCommand::Log { message } => {
            let message = resolve(invocation, message);
            outcome.logs.push(LogEntry::now(message));
        }
        ScriptCommand::Test {
            description,
            lhs,
            op,
            rhs,
        } => {
            require_test_capable(invocation.stage, "test", line)?;
            let description = resolve(invocation, description);
            outcome
                .assertions
                .push(check(&description, lhs, *op, rhs, invocation));
        }
        ScriptCommand::Assert { lhs, op, rhs } => {
            require_test_capable(invocation.stage, "assert", line)?;
            let description = format!(
                "assert {} {} {}",
                operand_display(lhs),
                op.symbol(),
                operand_display(rhs)
            );
            let result = check(&description, lhs, *op, rhs, invocation);
            let passed = result.passed;
            outcome.assertions.push(result);
            if !passed {
                return Err(ScriptFailure::runtime(
                    format!("{description} failed"),
                    Some(line),
                ));
            }
        }
    }
    Ok(())
}

/// Evaluates one comparison into an assertion result.
fn check(
    description: &str,
    lhs: &Operand,
    op: ComparisonOperator,
    rhs: &Operand,
    invocation: &ScriptInvocation<'_>,
) -> AssertionResult {
    let lhs = match eval_operand(lhs, invocation) {
        Ok(value) => value,
        Err(message) => return AssertionResult::fail(description, message),
    };
    let rhs = match eval_operand(rhs, invocation) {
        Ok(value) => value,
        Err(message) => return AssertionResult::fail(description, message),
    };

    match compare::evaluate(&lhs, op, &rhs) {
        Ok(true) => AssertionResult::pass_with_value(description, lhs),
        Ok(false) => AssertionResult::fail_with_value(
            description,
            lhs,
            format!("expected {} {rhs}", op.symbol()),
        ),
        Err(message) => AssertionResult::fail_with_value(description, lhs, message),
    }
}

fn eval_operand(
    operand: &Operand,
    invocation: &ScriptInvocation<'_>,
) -> Result<String, String> {
    match operand {
        Operand::Literal { value } => {
            Ok(Interpolator::new(invocation.scope).interpolate(value).text)
        }
        Operand::ResStatus => Ok(response_of(invocation)?.status.to_string()),
        Operand::ResBody => Ok(response_of(invocation)?.body_text()),
        Operand::ResResponseTime => Ok(response_of(invocation)?.elapsed_ms.to_string()),
        Operand::ResHeader { name } => response_of(invocation)?
            .header(name)
            .map(ToString::to_string)
            .ok_or_else(|| format!("header '{name}' not present")),
        Operand::ResBodyPath { path } => response_of(invocation)?
            .body_path(path)
            .map(stringify)
            .ok_or_else(|| format!("body path '{path}' not found")),
        Operand::LayerVar { layer, name } => invocation
            .scope
            .layer_var(*layer, name)
            .map(|value| stringify(&value))
            .ok_or_else(|| format!("'{name}' not set in the {} scope", layer.as_str())),
        Operand::EnvName => invocation
            .scope
            .environment_name()
            .map(ToString::to_string)
            .ok_or_else(|| "no environment selected".to_string()),
    }
}

fn response_of<'r>(invocation: &'r ScriptInvocation<'_>) -> Result<&'r ResponseData, String> {
    invocation
        .response
        .as_deref()
        .ok_or_else(|| "no response available".to_string())
}

fn operand_display(operand: &Operand) -> String {
    match operand {
        Operand::Literal { value } => value.clone(),
        Operand::ResStatus => "res.status".to_string(),
        Operand::ResBody => "res.body".to_string(),
        Operand::ResResponseTime => "res.responseTime".to_string(),
        Operand::ResHeader { name } => format!("res.headers.{name}"),
        Operand::ResBodyPath { path } => format!("res.body.{path}"),
        Operand::LayerVar { layer, name } => format!("{}.{name}", layer_root(*layer)),
        Operand::EnvName => "bru.envName".to_string(),
    }
}

/// The accessor root the parser maps to each scope layer.
const fn layer_root(kind: LayerKind) -> &'static str {
    match kind {
        LayerKind::Environment => "env",
        other => other.as_str(),
    }
}

/// Interpolates a textual argument against the invocation scope.
fn resolve(invocation: &ScriptInvocation<'_>, value: &str) -> String {
    Interpolator::new(invocation.scope).interpolate(value).text
}

/// Replaces the body content in place, keeping the body mode where the
/// mode is textual.
fn set_body_content(body: &mut RequestBody, content: String) {
    match body {
        RequestBody::Json { content: existing }
        | RequestBody::Xml { content: existing }
        | RequestBody::Text { content: existing } => *existing = content,
        RequestBody::GraphQl { query, .. } => *query = content,
        RequestBody::None | RequestBody::Form { .. } => {
            *body = RequestBody::Text { content };
        }
    }
}

fn require_pre_request(
    stage: ScriptStage,
    command: &str,
    line: usize,
) -> Result<(), ScriptFailure> {
    if stage == ScriptStage::PreRequest {
        Ok(())
    } else {
        Err(ScriptFailure::runtime(
            format!("{command} is only available before the request is sent"),
            Some(line),
        ))
    }
}

fn require_test_capable(
    stage: ScriptStage,
    command: &str,
    line: usize,
) -> Result<(), ScriptFailure> {
    if stage.is_test_capable() {
        Ok(())
    } else {
        Err(ScriptFailure::runtime(
            format!("{command} needs a response stage"),
            Some(line),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quiver_domain::{
        RequestDefaults, RequestDefinition, RequestDraft, ResolvedScope, ScopeLayer,
        ScriptFailureKind,
    };
    use serde_json::json;

    fn draft() -> RequestDraft {
        RequestDraft::from_definition(
            &RequestDefinition::new(HttpMethod::Get, "https://api.test"),
            &RequestDefaults::default(),
        )
    }

    fn json_response(body: &str) -> ResponseData {
        let mut response = ResponseData::new(
            200,
            "OK",
            vec![("Content-Type".to_string(), "application/json".to_string())],
            body.as_bytes().to_vec(),
            42,
        );
        response.parse_body();
        response
    }

    async fn run_stage(
        source: &str,
        stage: ScriptStage,
        scope: &mut ResolvedScope,
        draft: &mut RequestDraft,
        response: Option<&mut ResponseData>,
    ) -> ScriptOutcome {
        DslSandbox::new()
            .run(
                source,
                ScriptInvocation {
                    stage,
                    scope,
                    draft,
                    response,
                },
                CancellationToken::new(),
                5_000,
            )
            .await
    }

    #[tokio::test]
    async fn set_var_writes_the_runtime_layer() {
        let mut scope = ResolvedScope::new();
        let mut draft = draft();
        let outcome = run_stage(
            r#"bru.setVar("token", "abc")"#,
            ScriptStage::PreRequest,
            &mut scope,
            &mut draft,
            None,
        )
        .await;
        assert!(outcome.error.is_none());
        assert_eq!(scope.lookup_str("token"), Some("abc".to_string()));
    }

    #[tokio::test]
    async fn req_mutators_change_the_draft() {
        let mut scope = ResolvedScope::new();
        scope.set_runtime("trace", json!("t-1"));
        let mut draft = draft();
        let outcome = run_stage(
            concat!(
                "req.setHeader(\"X-Trace\", \"{{trace}}\")\n",
                "req.setMethod(\"post\")\n",
                "req.setTimeout(900)\n",
                "req.disableParsingResponseJson()"
            ),
            ScriptStage::PreRequest,
            &mut scope,
            &mut draft,
            None,
        )
        .await;
        assert!(outcome.error.is_none());
        assert_eq!(draft.header("x-trace"), Some("t-1"));
        assert_eq!(draft.method, HttpMethod::Post);
        assert_eq!(draft.timeout_ms, 900);
        assert!(!draft.parse_response_json);
    }

    #[tokio::test]
    async fn req_mutators_are_rejected_after_the_send() {
        let mut scope = ResolvedScope::new();
        let mut draft = draft();
        let mut response = json_response("{}");
        let outcome = run_stage(
            r#"req.setUrl("https://elsewhere.test")"#,
            ScriptStage::PostResponse,
            &mut scope,
            &mut draft,
            Some(&mut response),
        )
        .await;
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, ScriptFailureKind::Runtime);
        assert_eq!(error.line, Some(1));
    }

    #[tokio::test]
    async fn test_command_records_results_without_stopping() {
        let mut scope = ResolvedScope::new();
        let mut draft = draft();
        let mut response = json_response(r#"{"count": 3}"#);
        let outcome = run_stage(
            concat!(
                "test(\"status ok\", res.status, ==, 200)\n",
                "test(\"count high\", res.body.count, >, 10)\n",
                "log(\"done\")"
            ),
            ScriptStage::Test,
            &mut scope,
            &mut draft,
            Some(&mut response),
        )
        .await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.assertions.len(), 2);
        assert!(outcome.assertions[0].passed);
        assert!(!outcome.assertions[1].passed);
        assert_eq!(outcome.logs.len(), 1);
    }

    #[tokio::test]
    async fn layer_reads_bypass_runtime_shadowing() {
        let mut scope = ResolvedScope::from_layers(vec![
            ScopeLayer::new(
                LayerKind::Collection,
                [("host".to_string(), json!("collection.test"))].into(),
            ),
            ScopeLayer::named(
                LayerKind::Environment,
                "staging",
                [("host".to_string(), json!("staging.test"))].into(),
            ),
        ]);
        scope.set_runtime("host", json!("runtime.test"));
        let mut draft = draft();
        let mut response = json_response("{}");
        let outcome = run_stage(
            concat!(
                "test(\"env host\", env.host, ==, staging.test)\n",
                "test(\"collection host\", collection.host, ==, collection.test)\n",
                "test(\"env name\", bru.envName, ==, staging)"
            ),
            ScriptStage::Test,
            &mut scope,
            &mut draft,
            Some(&mut response),
        )
        .await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.assertions.len(), 3);
        assert!(outcome.assertions.iter().all(|a| a.passed));
    }

    #[tokio::test]
    async fn layer_read_of_an_unset_name_fails_the_check() {
        let mut scope = ResolvedScope::new();
        scope.set_runtime("host", json!("runtime.test"));
        let mut draft = draft();
        let mut response = json_response("{}");
        let outcome = run_stage(
            "test(\"env host\", env.host, ==, runtime.test)",
            ScriptStage::Test,
            &mut scope,
            &mut draft,
            Some(&mut response),
        )
        .await;
        assert!(outcome.error.is_none());
        assert!(!outcome.assertions[0].passed);
    }

    #[tokio::test]
    async fn failed_assert_stops_remaining_statements() {
        let mut scope = ResolvedScope::new();
        let mut draft = draft();
        let mut response = json_response("{}");
        let outcome = run_stage(
            concat!(
                "assert(res.status, ==, 500)\n",
                "log(\"unreachable\")"
            ),
            ScriptStage::PostResponse,
            &mut scope,
            &mut draft,
            Some(&mut response),
        )
        .await;
        assert_eq!(outcome.assertions.len(), 1);
        assert!(!outcome.assertions[0].passed);
        assert!(outcome.logs.is_empty());
        assert_eq!(outcome.error.unwrap().kind, ScriptFailureKind::Runtime);
    }

    #[tokio::test]
    async fn res_set_body_rewrites_and_reparses() {
        let mut scope = ResolvedScope::new();
        let mut draft = draft();
        let mut response = json_response(r#"{"a": 1}"#);
        let outcome = run_stage(
            r#"res.setBody("{\"a\": 2}")"#,
            ScriptStage::PostResponse,
            &mut scope,
            &mut draft,
            Some(&mut response),
        )
        .await;
        assert!(outcome.error.is_none());
        assert_eq!(response.body_path("a"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn parse_error_reports_the_line() {
        let mut scope = ResolvedScope::new();
        let mut draft = draft();
        let outcome = run_stage(
            "log(\"ok\")\nbogus(1)",
            ScriptStage::PreRequest,
            &mut scope,
            &mut draft,
            None,
        )
        .await;
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, ScriptFailureKind::Parse);
        assert_eq!(error.line, Some(2));
        // Parse failures run nothing.
        assert!(outcome.logs.is_empty());
    }

    #[tokio::test]
    async fn budget_overrun_times_out() {
        let mut scope = ResolvedScope::new();
        let mut draft = draft();
        let outcome = DslSandbox::new()
            .run(
                "bru.sleep(60000)",
                ScriptInvocation {
                    stage: ScriptStage::PreRequest,
                    scope: &mut scope,
                    draft: &mut draft,
                    response: None,
                },
                CancellationToken::new(),
                20,
            )
            .await;
        assert_eq!(outcome.error.unwrap().kind, ScriptFailureKind::Timeout);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_sleep() {
        let mut scope = ResolvedScope::new();
        let mut draft = draft();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = DslSandbox::new()
            .run(
                "bru.sleep(60000)\nlog(\"after\")",
                ScriptInvocation {
                    stage: ScriptStage::PreRequest,
                    scope: &mut scope,
                    draft: &mut draft,
                    response: None,
                },
                cancel,
                5_000,
            )
            .await;
        // Cancelled before any statement ran.
        assert!(outcome.logs.is_empty());
        assert!(outcome.error.is_none());
    }
}
