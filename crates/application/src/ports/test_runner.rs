//! Declarative assertion runner port.

use quiver_domain::{Assertion, AssertionResult, ResponseData};

/// Port for evaluating a request's declarative assertions against the
/// response. Runs at the start of the test stage, before the test
/// script, so declarative results come first in the merged list.
pub trait TestRunner: Send + Sync {
    /// Evaluates every assertion, in order. Never short-circuits; one
    /// failing assertion does not hide the rest.
    fn run(&self, assertions: &[Assertion], response: &ResponseData) -> Vec<AssertionResult>;
}
