//! Request definition and the resolved draft sent to the transport.

mod auth;
mod body;
mod method;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use auth::{ApiKeyPlacement, AuthConfig};
pub use body::RequestBody;
pub use method::HttpMethod;

use crate::assertion::Assertion;
use crate::collection::RequestDefaults;
use crate::scripting::RequestScripts;

/// A single request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header value, may contain `{{placeholders}}`.
    pub value: String,
    /// Disabled headers are kept in the definition but never sent.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl Header {
    /// Creates an enabled header.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

/// A request as authored in the collection tree.
///
/// Read-only input to the pipeline: execution interpolates a
/// [`RequestDraft`] copy and never mutates the definition in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RequestDefinition {
    /// Display name.
    pub name: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// URL template, may contain `{{placeholders}}`.
    pub url: String,
    /// Headers, order preserved.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Typed body.
    #[serde(default)]
    pub body: RequestBody,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Pre-request / post-response / test scripts.
    #[serde(default)]
    pub scripts: RequestScripts,
    /// Declarative assertions evaluated in the test stage.
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    /// Request-level variables.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    /// Per-request timeout override in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Per-request redirect limit override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<u32>,
}

impl RequestDefinition {
    /// Creates a definition with the given method and URL template.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Self::default()
        }
    }

    /// Returns an iterator over the enabled headers.
    pub fn enabled_headers(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter().filter(|h| h.enabled)
    }
}

/// The resolved, mutable copy of a request that flows through one run.
///
/// Interpolation writes the substituted fields here, pre-request scripts
/// mutate it through the `req.*` capability, and the transport reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDraft {
    /// HTTP method.
    pub method: HttpMethod,
    /// Fully interpolated URL.
    pub url: String,
    /// Headers to send, order preserved.
    pub headers: Vec<Header>,
    /// Extra query parameters appended by auth or scripts.
    #[serde(default)]
    pub query_params: Vec<(String, String)>,
    /// Interpolated body.
    pub body: RequestBody,
    /// Effective request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Effective redirect limit.
    pub max_redirects: u32,
    /// Whether the parse stage should attempt a structured JSON parse.
    pub parse_response_json: bool,
}

impl RequestDraft {
    /// Builds a draft from a definition and the run's effective defaults.
    ///
    /// Only enabled headers are carried over; interpolation happens
    /// afterwards, field by field.
    #[must_use]
    pub fn from_definition(definition: &RequestDefinition, defaults: &RequestDefaults) -> Self {
        Self {
            method: definition.method,
            url: definition.url.clone(),
            headers: definition.enabled_headers().cloned().collect(),
            query_params: Vec::new(),
            body: definition.body.clone(),
            timeout_ms: definition.timeout_ms.unwrap_or(defaults.timeout_ms),
            max_redirects: definition.max_redirects.unwrap_or(defaults.max_redirects),
            parse_response_json: true,
        }
    }

    /// Sets a header, replacing an existing one with the same name
    /// (case-insensitive) or appending.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self
            .headers
            .iter_mut()
            .find(|h| h.name.eq_ignore_ascii_case(name))
        {
            existing.value = value;
        } else {
            self.headers.push(Header::new(name, value));
        }
    }

    /// Returns the value of a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Appends a query parameter.
    pub fn add_query_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query_params.push((name.into(), value.into()));
    }

    /// Returns the URL with any appended query parameters attached.
    ///
    /// Names and values are url-encoded, so reserved characters in an
    /// appended value cannot split into extra parameters.
    #[must_use]
    pub fn full_url(&self) -> String {
        if self.query_params.is_empty() {
            return self.url.clone();
        }
        let Ok(encoded) = serde_urlencoded::to_string(&self.query_params) else {
            return self.url.clone();
        };
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{encoded}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn draft() -> RequestDraft {
        RequestDraft::from_definition(
            &RequestDefinition::new(HttpMethod::Get, "https://api.test/users"),
            &RequestDefaults::default(),
        )
    }

    #[test]
    fn draft_carries_only_enabled_headers() {
        let mut definition = RequestDefinition::new(HttpMethod::Get, "https://api.test");
        definition.headers.push(Header::new("X-Keep", "1"));
        definition.headers.push(Header {
            name: "X-Drop".to_string(),
            value: "1".to_string(),
            enabled: false,
        });

        let draft = RequestDraft::from_definition(&definition, &RequestDefaults::default());
        assert_eq!(draft.headers.len(), 1);
        assert_eq!(draft.headers[0].name, "X-Keep");
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut draft = draft();
        draft.set_header("Content-Type", "text/plain");
        draft.set_header("content-type", "application/json");
        assert_eq!(draft.headers.len(), 1);
        assert_eq!(draft.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn full_url_appends_query_params() {
        let mut draft = draft();
        draft.add_query_param("page", "2");
        draft.add_query_param("limit", "10");
        assert_eq!(draft.full_url(), "https://api.test/users?page=2&limit=10");
    }

    #[test]
    fn full_url_encodes_reserved_characters() {
        let mut draft = draft();
        draft.add_query_param("api_key", "se cret&admin=true");
        assert_eq!(
            draft.full_url(),
            "https://api.test/users?api_key=se+cret%26admin%3Dtrue"
        );
    }

    #[test]
    fn full_url_respects_existing_query() {
        let mut draft = draft();
        draft.url = "https://api.test/users?active=true".to_string();
        draft.add_query_param("page", "2");
        assert_eq!(
            draft.full_url(),
            "https://api.test/users?active=true&page=2"
        );
    }

    #[test]
    fn timeout_override_wins_over_defaults() {
        let mut definition = RequestDefinition::new(HttpMethod::Get, "https://api.test");
        definition.timeout_ms = Some(1_000);
        let draft = RequestDraft::from_definition(&definition, &RequestDefaults::default());
        assert_eq!(draft.timeout_ms, 1_000);
    }
}
