//! Response data as observed by the pipeline.

use serde::{Deserialize, Serialize};

/// TLS details reported by the transport, where available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TlsInfo {
    /// Negotiated protocol version (e.g. "TLSv1.3").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Negotiated cipher suite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
}

/// A parsed response flowing through the post-script and test stages.
///
/// Headers are ordered name/value pairs with duplicates preserved as
/// repeated entries. The structured body form is populated by the parse
/// stage (keyed by content type) and may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponseData {
    /// HTTP status code.
    pub status: u16,
    /// Status text (e.g. "OK").
    pub status_text: String,
    /// Ordered headers, duplicates preserved.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Lazily parsed structured body, set by the parse stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<serde_json::Value>,
    /// Body size in bytes.
    pub size: usize,
    /// Transport-observed duration in milliseconds.
    pub elapsed_ms: u64,
    /// TLS details, if the transport reported them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsInfo>,
}

impl ResponseData {
    /// Creates response data from wire-level pieces.
    #[must_use]
    pub fn new(
        status: u16,
        status_text: impl Into<String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
        elapsed_ms: u64,
    ) -> Self {
        let size = body.len();
        Self {
            status,
            status_text: status_text.into(),
            headers,
            body,
            parsed: None,
            size,
            elapsed_ms,
            tls: None,
        }
    }

    /// Returns the first value of a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value of a header, in order.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns the Content-Type header value, if present.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Returns whether the content type indicates JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains("application/json") || ct.contains("+json"))
    }

    /// Returns the body as lossy UTF-8 text.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Attempts the structured parse keyed by content type, storing the
    /// result. Non-JSON and unparsable bodies leave `parsed` unset.
    pub fn parse_body(&mut self) {
        if self.is_json()
            && let Ok(value) = serde_json::from_slice(&self.body)
        {
            self.parsed = Some(value);
        }
    }

    /// Replaces the body text (the `res.setBody` capability). The
    /// structured form is invalidated and re-parsed.
    pub fn set_body_text(&mut self, body: impl Into<String>) {
        self.body = body.into().into_bytes();
        self.size = self.body.len();
        self.parsed = None;
        self.parse_body();
    }

    /// Walks a dotted path into the parsed body.
    #[must_use]
    pub fn body_path(&self, path: &str) -> Option<&serde_json::Value> {
        let mut current = self.parsed.as_ref()?;
        for segment in path.split('.') {
            current = match current {
                serde_json::Value::Object(map) => map.get(segment)?,
                serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns whether the status code is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}
