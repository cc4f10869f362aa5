//! Placeholder substitution against a resolved scope.
//!
//! Substitution is repeated while resolved values themselves contain
//! placeholders, up to a fixed depth so self-referential variables
//! terminate. Unresolved placeholders stay verbatim and are reported,
//! never treated as errors.

use serde_json::Value;

use quiver_domain::{
    InterpolationWarning, RequestBody, RequestDraft, ResolvedScope,
};

use super::parser::{has_placeholders, parse_placeholders};

/// Maximum substitution passes before a reference chain is treated as
/// cyclic.
pub const MAX_DEPTH: usize = 10;

/// Result of interpolating one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolated {
    /// The substituted text.
    pub text: String,
    /// Placeholder names that did not resolve, in encounter order.
    pub unresolved: Vec<String>,
}

/// Substitutes `{{placeholders}}` from a run's scope.
pub struct Interpolator<'a> {
    scope: &'a ResolvedScope,
}

impl<'a> Interpolator<'a> {
    /// Creates an interpolator over the scope.
    #[must_use]
    pub const fn new(scope: &'a ResolvedScope) -> Self {
        Self { scope }
    }

    /// Interpolates one string.
    ///
    /// Runs repeated passes while substitutions keep introducing new
    /// placeholders; after [`MAX_DEPTH`] passes whatever remains is
    /// left verbatim and reported unresolved.
    #[must_use]
    pub fn interpolate(&self, input: &str) -> Interpolated {
        let mut text = input.to_string();

        for _ in 0..MAX_DEPTH {
            if !has_placeholders(&text) {
                break;
            }
            let (next, substituted) = self.substitute_pass(&text);
            text = next;
            if !substituted {
                break;
            }
        }

        let unresolved = parse_placeholders(&text)
            .into_iter()
            .map(|r| r.name)
            .collect();
        Interpolated { text, unresolved }
    }

    /// One substitution pass. Returns the new text and whether any
    /// reference resolved.
    fn substitute_pass(&self, input: &str) -> (String, bool) {
        let references = parse_placeholders(input);
        if references.is_empty() {
            return (input.to_string(), false);
        }

        let mut result = String::with_capacity(input.len());
        let mut last_end = 0;
        let mut substituted = false;

        for reference in &references {
            result.push_str(&input[last_end..reference.span.start]);
            if let Some(value) = self.scope.lookup_str(&reference.name) {
                result.push_str(&value);
                substituted = true;
            } else {
                result.push_str(&input[reference.span.clone()]);
            }
            last_end = reference.span.end;
        }
        result.push_str(&input[last_end..]);

        (result, substituted)
    }

    /// Interpolates every string leaf of a structured value.
    #[must_use]
    pub fn interpolate_value(&self, value: &Value, unresolved: &mut Vec<String>) -> Value {
        match value {
            Value::String(s) => {
                let result = self.interpolate(s);
                unresolved.extend(result.unresolved);
                Value::String(result.text)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.interpolate_value(item, unresolved))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.interpolate_value(v, unresolved)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Interpolates every textual field of a request draft in place.
    ///
    /// Returns one warning per unresolved placeholder, tagged with the
    /// field it appeared in.
    pub fn interpolate_draft(&self, draft: &mut RequestDraft) -> Vec<InterpolationWarning> {
        let mut warnings = Vec::new();

        let url = self.interpolate(&draft.url);
        record(&mut warnings, "url", url.unresolved);
        draft.url = url.text;

        for header in &mut draft.headers {
            let value = self.interpolate(&header.value);
            record(
                &mut warnings,
                &format!("header:{}", header.name),
                value.unresolved,
            );
            header.value = value.text;
        }

        for (name, value) in &mut draft.query_params {
            let resolved = self.interpolate(value);
            record(&mut warnings, &format!("query:{name}"), resolved.unresolved);
            *value = resolved.text;
        }

        let body_unresolved = self.interpolate_body(&mut draft.body);
        record(&mut warnings, "body", body_unresolved);

        warnings
    }

    fn interpolate_body(&self, body: &mut RequestBody) -> Vec<String> {
        let mut unresolved = Vec::new();
        match body {
            RequestBody::None => {}
            RequestBody::Json { content }
            | RequestBody::Xml { content }
            | RequestBody::Text { content } => {
                let result = self.interpolate(content);
                unresolved.extend(result.unresolved);
                *content = result.text;
            }
            RequestBody::GraphQl { query, variables } => {
                let result = self.interpolate(query);
                unresolved.extend(result.unresolved);
                *query = result.text;
                let resolved = self.interpolate(variables);
                unresolved.extend(resolved.unresolved);
                *variables = resolved.text;
            }
            RequestBody::Form { fields } => {
                for (_, value) in fields.iter_mut() {
                    let result = self.interpolate(value);
                    unresolved.extend(result.unresolved);
                    *value = result.text;
                }
            }
        }
        unresolved
    }
}

fn record(warnings: &mut Vec<InterpolationWarning>, field: &str, unresolved: Vec<String>) {
    for placeholder in unresolved {
        warnings.push(InterpolationWarning {
            field: field.to_string(),
            placeholder,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quiver_domain::{Header, HttpMethod, RequestDefaults, RequestDefinition};
    use serde_json::json;

    fn scope(pairs: &[(&str, Value)]) -> ResolvedScope {
        let mut scope = ResolvedScope::new();
        for (name, value) in pairs {
            scope.set_runtime((*name).to_string(), value.clone());
        }
        scope
    }

    #[test]
    fn substitutes_from_the_scope() {
        let scope = scope(&[("host", json!("api.test")), ("id", json!(7))]);
        let result = Interpolator::new(&scope).interpolate("https://{{host}}/users/{{id}}");
        assert_eq!(result.text, "https://api.test/users/7");
        assert!(result.unresolved.is_empty());
    }

    #[test]
    fn unresolved_placeholders_stay_verbatim() {
        let scope = scope(&[]);
        let result = Interpolator::new(&scope).interpolate("https://{{host}}/x");
        assert_eq!(result.text, "https://{{host}}/x");
        assert_eq!(result.unresolved, vec!["host".to_string()]);
    }

    #[test]
    fn nested_references_resolve_transitively() {
        let scope = scope(&[
            ("url", json!("https://{{host}}/api")),
            ("host", json!("{{region}}.test")),
            ("region", json!("eu")),
        ]);
        let result = Interpolator::new(&scope).interpolate("{{url}}");
        assert_eq!(result.text, "https://eu.test/api");
    }

    #[test]
    fn cyclic_references_terminate() {
        let scope = scope(&[("a", json!("{{b}}")), ("b", json!("{{a}}"))]);
        let result = Interpolator::new(&scope).interpolate("{{a}}");
        // Depth exhausted; whatever remains is reported, not looped on.
        assert_eq!(result.unresolved.len(), 1);
    }

    #[test]
    fn dotted_paths_reach_into_structured_values() {
        let scope = scope(&[("user", json!({"id": 42}))]);
        let result = Interpolator::new(&scope).interpolate("/users/{{user.id}}");
        assert_eq!(result.text, "/users/42");
    }

    #[test]
    fn draft_fields_are_interpolated_with_tagged_warnings() {
        let scope = scope(&[("host", json!("api.test"))]);
        let mut definition =
            RequestDefinition::new(HttpMethod::Post, "https://{{host}}/users");
        definition
            .headers
            .push(Header::new("Authorization", "Bearer {{token}}"));
        definition.body = RequestBody::json(r#"{"name": "{{name}}"}"#);

        let mut draft = RequestDraft::from_definition(&definition, &RequestDefaults::default());
        let warnings = Interpolator::new(&scope).interpolate_draft(&mut draft);

        assert_eq!(draft.url, "https://api.test/users");
        let fields: Vec<_> = warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["header:Authorization", "body"]);
        assert_eq!(warnings[0].placeholder, "token");
    }

    #[test]
    fn structured_values_interpolate_recursively() {
        let scope = scope(&[("env", json!("prod"))]);
        let mut unresolved = Vec::new();
        let value = Interpolator::new(&scope)
            .interpolate_value(&json!({"tags": ["{{env}}", "{{region}}"]}), &mut unresolved);
        assert_eq!(value, json!({"tags": ["prod", "{{region}}"]}));
        assert_eq!(unresolved, vec!["region".to_string()]);
    }
}
