//! Declarative assertion evaluation.

use quiver_domain::scope::stringify;
use quiver_domain::{Assertion, AssertionResult, ResponseData};

use quiver_application::ports::TestRunner;

use crate::compare;

/// Evaluates a request's declarative assertions against the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionRunner;

impl AssertionRunner {
    /// Creates an assertion runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn evaluate(assertion: &Assertion, response: &ResponseData) -> AssertionResult {
        let description = assertion.description();
        match assertion {
            Assertion::Status { expected } => {
                let actual = response.status.to_string();
                if expected.matches(response.status) {
                    AssertionResult::pass_with_value(description, actual)
                } else {
                    AssertionResult::fail_with_value(
                        description,
                        actual,
                        format!("expected status {}", expected.describe()),
                    )
                }
            }
            Assertion::ResponseTime { max_ms } => {
                let actual = response.elapsed_ms;
                if actual <= *max_ms {
                    AssertionResult::pass_with_value(description, format!("{actual}ms"))
                } else {
                    AssertionResult::fail_with_value(
                        description,
                        format!("{actual}ms"),
                        format!("took longer than {max_ms}ms"),
                    )
                }
            }
            Assertion::HeaderExists { name, value } => match response.header(name) {
                None => AssertionResult::fail(description, format!("header '{name}' not present")),
                Some(actual) => match value {
                    Some(expected) if actual != expected => AssertionResult::fail_with_value(
                        description,
                        actual,
                        format!("expected '{expected}'"),
                    ),
                    _ => AssertionResult::pass_with_value(description, actual),
                },
            },
            Assertion::HeaderMatches { name, pattern } => match response.header(name) {
                None => AssertionResult::fail(description, format!("header '{name}' not present")),
                Some(actual) => match compare::evaluate(
                    actual,
                    quiver_domain::ComparisonOperator::Matches,
                    pattern,
                ) {
                    Ok(true) => AssertionResult::pass_with_value(description, actual),
                    Ok(false) => AssertionResult::fail_with_value(
                        description,
                        actual,
                        format!("did not match /{pattern}/"),
                    ),
                    Err(message) => AssertionResult::fail(description, message),
                },
            },
            Assertion::BodyContains { text } => {
                if response.body_text().contains(text.as_str()) {
                    AssertionResult::pass(description)
                } else {
                    AssertionResult::fail(description, format!("'{text}' not found in body"))
                }
            }
            Assertion::BodyMatches { pattern } => {
                let body = response.body_text();
                match compare::evaluate(
                    &body,
                    quiver_domain::ComparisonOperator::Matches,
                    pattern,
                ) {
                    Ok(true) => AssertionResult::pass(description),
                    Ok(false) => {
                        AssertionResult::fail(description, format!("body did not match /{pattern}/"))
                    }
                    Err(message) => AssertionResult::fail(description, message),
                }
            }
            Assertion::JsonField {
                path,
                operator,
                value,
            } => match response.body_path(path) {
                None => AssertionResult::fail(description, format!("body path '{path}' not found")),
                Some(actual) => {
                    let actual = stringify(actual);
                    let expected = stringify(value);
                    match compare::evaluate(&actual, *operator, &expected) {
                        Ok(true) => AssertionResult::pass_with_value(description, actual),
                        Ok(false) => AssertionResult::fail_with_value(
                            description,
                            actual,
                            format!("expected {} {expected}", operator.symbol()),
                        ),
                        Err(message) => AssertionResult::fail_with_value(description, actual, message),
                    }
                }
            },
            Assertion::IsJson => {
                if serde_json::from_slice::<serde_json::Value>(&response.body).is_ok() {
                    AssertionResult::pass(description)
                } else {
                    AssertionResult::fail(description, "body is not valid JSON")
                }
            }
        }
    }
}

impl TestRunner for AssertionRunner {
    fn run(&self, assertions: &[Assertion], response: &ResponseData) -> Vec<AssertionResult> {
        assertions
            .iter()
            .map(|assertion| Self::evaluate(assertion, response))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quiver_domain::{ComparisonOperator, StatusExpectation};
    use serde_json::json;

    fn response() -> ResponseData {
        let mut response = ResponseData::new(
            201,
            "Created",
            vec![("Content-Type".to_string(), "application/json".to_string())],
            br#"{"data": {"id": 7, "name": "quiver"}}"#.to_vec(),
            85,
        );
        response.parse_body();
        response
    }

    #[test]
    fn status_range_assertion() {
        let results = AssertionRunner::new().run(
            &[Assertion::Status {
                expected: StatusExpectation::success(),
            }],
            &response(),
        );
        assert!(results[0].passed);
        assert_eq!(results[0].actual.as_deref(), Some("201"));
    }

    #[test]
    fn json_field_comparisons() {
        let runner = AssertionRunner::new();
        let results = runner.run(
            &[
                Assertion::JsonField {
                    path: "data.id".to_string(),
                    operator: ComparisonOperator::GreaterThan,
                    value: json!(5),
                },
                Assertion::JsonField {
                    path: "data.name".to_string(),
                    operator: ComparisonOperator::Equals,
                    value: json!("other"),
                },
                Assertion::JsonField {
                    path: "data.missing".to_string(),
                    operator: ComparisonOperator::Equals,
                    value: json!(1),
                },
            ],
            &response(),
        );
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert!(!results[2].passed);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn header_and_body_assertions() {
        let runner = AssertionRunner::new();
        let results = runner.run(
            &[
                Assertion::HeaderExists {
                    name: "content-type".to_string(),
                    value: None,
                },
                Assertion::HeaderMatches {
                    name: "content-type".to_string(),
                    pattern: "json$".to_string(),
                },
                Assertion::BodyContains {
                    text: "quiver".to_string(),
                },
                Assertion::IsJson,
            ],
            &response(),
        );
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn response_time_bound() {
        let results = AssertionRunner::new().run(
            &[Assertion::ResponseTime { max_ms: 50 }],
            &response(),
        );
        assert!(!results[0].passed);
        assert_eq!(results[0].actual.as_deref(), Some("85ms"));
    }

    #[test]
    fn failures_do_not_short_circuit() {
        let results = AssertionRunner::new().run(
            &[
                Assertion::Status {
                    expected: StatusExpectation::Exact(200),
                },
                Assertion::IsJson,
            ],
            &response(),
        );
        assert!(!results[0].passed);
        assert!(results[1].passed);
    }
}
