//! Comparison evaluation shared by the sandbox and the assertion runner.

use quiver_domain::ComparisonOperator;

/// Evaluates a comparison over textual operands.
///
/// Equality falls back to string comparison when either side is not
/// numeric; ordering operators require both sides to be numeric.
///
/// # Errors
///
/// Returns a message when the operands cannot be compared (non-numeric
/// ordering, invalid regex).
pub fn evaluate(lhs: &str, op: ComparisonOperator, rhs: &str) -> Result<bool, String> {
    match op {
        ComparisonOperator::Equals => Ok(loose_eq(lhs, rhs)),
        ComparisonOperator::NotEquals => Ok(!loose_eq(lhs, rhs)),
        ComparisonOperator::GreaterThan => numeric(lhs, rhs).map(|(l, r)| l > r),
        ComparisonOperator::GreaterThanOrEqual => numeric(lhs, rhs).map(|(l, r)| l >= r),
        ComparisonOperator::LessThan => numeric(lhs, rhs).map(|(l, r)| l < r),
        ComparisonOperator::LessThanOrEqual => numeric(lhs, rhs).map(|(l, r)| l <= r),
        ComparisonOperator::Contains => Ok(lhs.contains(rhs)),
        ComparisonOperator::Matches => regex::Regex::new(rhs)
            .map(|re| re.is_match(lhs))
            .map_err(|e| format!("invalid pattern /{rhs}/: {e}")),
    }
}

/// Numeric equality when both sides parse, string equality otherwise.
fn loose_eq(lhs: &str, rhs: &str) -> bool {
    match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(l), Ok(r)) => (l - r).abs() < f64::EPSILON,
        _ => lhs == rhs,
    }
}

fn numeric(lhs: &str, rhs: &str) -> Result<(f64, f64), String> {
    let l = lhs
        .parse::<f64>()
        .map_err(|_| format!("'{lhs}' is not numeric"))?;
    let r = rhs
        .parse::<f64>()
        .map_err(|_| format!("'{rhs}' is not numeric"))?;
    Ok((l, r))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_numeric_when_both_sides_parse() {
        assert!(evaluate("200", ComparisonOperator::Equals, "200.0").unwrap());
        assert!(evaluate("ok", ComparisonOperator::Equals, "ok").unwrap());
        assert!(!evaluate("ok", ComparisonOperator::Equals, "200").unwrap());
    }

    #[test]
    fn ordering_requires_numbers() {
        assert!(evaluate("404", ComparisonOperator::GreaterThan, "400").unwrap());
        assert!(evaluate("abc", ComparisonOperator::LessThan, "1").is_err());
    }

    #[test]
    fn contains_and_matches() {
        assert!(evaluate("hello world", ComparisonOperator::Contains, "world").unwrap());
        assert!(evaluate("v1.2.3", ComparisonOperator::Matches, r"^v\d+").unwrap());
        assert!(evaluate("x", ComparisonOperator::Matches, "[unclosed").is_err());
    }
}
