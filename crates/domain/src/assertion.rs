//! Declarative assertions and unified test results.
//!
//! Declarative assertions attached to a request and `test(...)` commands
//! in scripts both produce [`AssertionResult`]s, merged into one
//! [`TestResults`] per run.

use serde::{Deserialize, Serialize};

/// Expected status code value or range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StatusExpectation {
    /// Exact status code.
    Exact(u16),
    /// Inclusive range of status codes.
    Range {
        /// Minimum status code.
        min: u16,
        /// Maximum status code.
        max: u16,
    },
}

impl StatusExpectation {
    /// Returns whether a status code matches.
    #[must_use]
    pub fn matches(&self, status: u16) -> bool {
        match self {
            Self::Exact(expected) => status == *expected,
            Self::Range { min, max } => status >= *min && status <= *max,
        }
    }

    /// Any 2xx status.
    #[must_use]
    pub const fn success() -> Self {
        Self::Range { min: 200, max: 299 }
    }

    /// Renders the expectation for messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Exact(code) => format!("= {code}"),
            Self::Range { min, max } => format!("in {min}-{max}"),
        }
    }
}

impl Default for StatusExpectation {
    fn default() -> Self {
        Self::success()
    }
}

/// Comparison operators shared by assertions and script tests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    /// Equal to.
    Equals,
    /// Not equal to.
    NotEquals,
    /// Greater than (numeric).
    GreaterThan,
    /// Greater than or equal (numeric).
    GreaterThanOrEqual,
    /// Less than (numeric).
    LessThan,
    /// Less than or equal (numeric).
    LessThanOrEqual,
    /// Substring containment.
    Contains,
    /// Regex match.
    Matches,
}

impl ComparisonOperator {
    /// Returns the operator's symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Contains => "contains",
            Self::Matches => "matches",
        }
    }

    /// Parses an operator from its symbol.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" | "eq" => Some(Self::Equals),
            "!=" | "neq" => Some(Self::NotEquals),
            ">" | "gt" => Some(Self::GreaterThan),
            ">=" | "gte" => Some(Self::GreaterThanOrEqual),
            "<" | "lt" => Some(Self::LessThan),
            "<=" | "lte" => Some(Self::LessThanOrEqual),
            "contains" => Some(Self::Contains),
            "matches" => Some(Self::Matches),
            _ => None,
        }
    }
}

/// A declarative assertion evaluated against a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    /// Response status matches the expectation.
    Status {
        /// Expected code or range.
        expected: StatusExpectation,
    },
    /// Transport-observed response time is at most `max_ms`.
    ResponseTime {
        /// Maximum allowed milliseconds.
        max_ms: u64,
    },
    /// A header exists, optionally with an exact value.
    HeaderExists {
        /// Header name (case-insensitive).
        name: String,
        /// Optional expected value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// A header value matches a regex pattern.
    HeaderMatches {
        /// Header name.
        name: String,
        /// Regex pattern.
        pattern: String,
    },
    /// Body text contains a substring.
    BodyContains {
        /// Text to search for.
        text: String,
    },
    /// Body text matches a regex pattern.
    BodyMatches {
        /// Regex pattern.
        pattern: String,
    },
    /// A dotted path into the parsed JSON body compares to a value.
    JsonField {
        /// Dotted path below the body root (e.g. `data.user.id`).
        path: String,
        /// Comparison operator.
        operator: ComparisonOperator,
        /// Value to compare against.
        value: serde_json::Value,
    },
    /// Body parses as JSON.
    IsJson,
}

impl Assertion {
    /// Human-readable description used in result displays.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Status { expected } => format!("status {}", expected.describe()),
            Self::ResponseTime { max_ms } => format!("response time <= {max_ms}ms"),
            Self::HeaderExists {
                name,
                value: Some(v),
            } => format!("header '{name}' equals '{v}'"),
            Self::HeaderExists { name, value: None } => format!("header '{name}' exists"),
            Self::HeaderMatches { name, pattern } => {
                format!("header '{name}' matches /{pattern}/")
            }
            Self::BodyContains { text } => format!("body contains '{text}'"),
            Self::BodyMatches { pattern } => format!("body matches /{pattern}/"),
            Self::JsonField {
                path,
                operator,
                value,
            } => format!("body.{path} {} {value}", operator.symbol()),
            Self::IsJson => "body is valid JSON".to_string(),
        }
    }
}

/// Result of one assertion or script test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionResult {
    /// What was checked.
    pub description: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Actual value found, for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// Error message if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssertionResult {
    /// Creates a passed result.
    #[must_use]
    pub fn pass(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            passed: true,
            actual: None,
            error: None,
        }
    }

    /// Creates a passed result with the actual value.
    #[must_use]
    pub fn pass_with_value(description: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            actual: Some(actual.into()),
            ..Self::pass(description)
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn fail(description: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            passed: false,
            actual: None,
            error: Some(error.into()),
        }
    }

    /// Creates a failed result with the actual value.
    #[must_use]
    pub fn fail_with_value(
        description: impl Into<String>,
        actual: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            actual: Some(actual.into()),
            ..Self::fail(description, error)
        }
    }
}

/// Merged results of the test stage for one run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestResults {
    /// Individual results, declarative assertions first.
    pub results: Vec<AssertionResult>,
    /// Total checks run.
    pub total: usize,
    /// Passed checks.
    pub passed: usize,
    /// Failed checks.
    pub failed: usize,
    /// Test stage duration in milliseconds.
    pub duration_ms: u64,
}

impl TestResults {
    /// Builds results from individual outcomes.
    #[must_use]
    pub fn new(results: Vec<AssertionResult>, duration_ms: u64) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            results,
            total,
            passed,
            failed: total - passed,
            duration_ms,
        }
    }

    /// Returns whether every check passed.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_expectation_matching() {
        assert!(StatusExpectation::Exact(200).matches(200));
        assert!(!StatusExpectation::Exact(200).matches(201));
        assert!(StatusExpectation::success().matches(204));
        assert!(!StatusExpectation::success().matches(301));
    }

    #[test]
    fn operator_symbols_round_trip() {
        for op in [
            ComparisonOperator::Equals,
            ComparisonOperator::NotEquals,
            ComparisonOperator::GreaterThan,
            ComparisonOperator::GreaterThanOrEqual,
            ComparisonOperator::LessThan,
            ComparisonOperator::LessThanOrEqual,
            ComparisonOperator::Contains,
            ComparisonOperator::Matches,
        ] {
            assert_eq!(ComparisonOperator::from_symbol(op.symbol()), Some(op));
        }
    }

    #[test]
    fn assertion_descriptions() {
        let assertion = Assertion::Status {
            expected: StatusExpectation::Exact(200),
        };
        assert_eq!(assertion.description(), "status = 200");

        let assertion = Assertion::BodyContains {
            text: "ok".to_string(),
        };
        assert_eq!(assertion.description(), "body contains 'ok'");
    }

    #[test]
    fn test_results_tally() {
        let results = TestResults::new(
            vec![
                AssertionResult::pass("a"),
                AssertionResult::fail("b", "boom"),
            ],
            12,
        );
        assert_eq!(results.total, 2);
        assert_eq!(results.passed, 1);
        assert_eq!(results.failed, 1);
        assert!(!results.all_passed());
    }
}
