//! HTTP transport implementation using reqwest.
//!
//! This adapter implements the `Transport` port. It owns the wire
//! concerns: URL parsing, body encoding, default Content-Type, timeout
//! and redirect limits, and mapping reqwest failures onto transport
//! errors. Non-2xx statuses are responses, never errors, and a fired
//! cancellation token aborts the in-flight exchange.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use quiver_application::ports::{Transport, TransportError};
use quiver_domain::{HttpMethod, RequestBody, RequestDraft, ResponseData};

/// Transport adapter backed by `reqwest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    /// Creates a transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }

    /// Encodes the typed body into wire bytes.
    ///
    /// JSON-shaped bodies are validated before sending so a syntax error
    /// fails fast as `InvalidBody` instead of a confusing server error.
    fn encode_body(body: &RequestBody) -> Result<Option<String>, TransportError> {
        match body {
            RequestBody::None => Ok(None),
            RequestBody::Json { content } => {
                if !content.is_empty() {
                    let _: serde_json::Value = serde_json::from_str(content)
                        .map_err(|e| TransportError::InvalidBody(format!("invalid JSON: {e}")))?;
                }
                Ok(Some(content.clone()))
            }
            RequestBody::Xml { content } | RequestBody::Text { content } => {
                Ok(Some(content.clone()))
            }
            RequestBody::GraphQl { query, variables } => {
                let variables = if variables.trim().is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_json::from_str(variables).map_err(|e| {
                        TransportError::InvalidBody(format!("invalid GraphQL variables: {e}"))
                    })?
                };
                let envelope = serde_json::json!({
                    "query": query,
                    "variables": variables,
                });
                Ok(Some(envelope.to_string()))
            }
            RequestBody::Form { fields } => {
                let encoded = serde_urlencoded::to_string(fields).map_err(|e| {
                    TransportError::InvalidBody(format!("invalid form fields: {e}"))
                })?;
                Ok(Some(encoded))
            }
        }
    }

    /// Maps reqwest errors onto transport errors.
    fn map_error(error: &reqwest::Error, draft: &RequestDraft) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout(draft.timeout_ms);
        }

        let message = error.to_string();
        let lowered = message.to_lowercase();

        if error.is_connect() {
            if lowered.contains("dns") || lowered.contains("resolve") {
                return TransportError::Dns(message);
            }
            if lowered.contains("refused") {
                return TransportError::ConnectionRefused(message);
            }
            if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl")
            {
                return TransportError::Tls(message);
            }
            return TransportError::ConnectionFailed(message);
        }

        if error.is_redirect() {
            return TransportError::TooManyRedirects(draft.max_redirects);
        }

        TransportError::Other(message)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        draft: &RequestDraft,
        cancel: CancellationToken,
    ) -> Result<ResponseData, TransportError> {
        let url = draft.full_url();
        let parsed_url =
            Url::parse(&url).map_err(|e| TransportError::InvalidUrl(format!("{e}: {url}")))?;

        // The redirect policy is per-client in reqwest, and the limit is
        // per-run, so the client is built per send.
        let client = Client::builder()
            .user_agent(concat!("Quiver/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(
                draft.max_redirects as usize,
            ))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let mut builder = client
            .request(Self::to_reqwest_method(draft.method), parsed_url)
            .timeout(Duration::from_millis(draft.timeout_ms));

        for header in &draft.headers {
            builder = builder.header(&header.name, &header.value);
        }
        if let Some(content_type) = draft.body.content_type()
            && draft.header("content-type").is_none()
        {
            builder = builder.header("Content-Type", content_type);
        }
        if let Some(body) = Self::encode_body(&draft.body)? {
            builder = builder.body(body);
        }

        debug!(method = %draft.method, %url, timeout_ms = draft.timeout_ms, "dispatching request");
        let start = Instant::now();

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(TransportError::Aborted),
            result = builder.send() => result.map_err(|e| Self::map_error(&e, draft))?,
        };

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        // Ordered pairs; repeated names stay as separate entries.
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();

        let body = tokio::select! {
            () = cancel.cancelled() => return Err(TransportError::Aborted),
            result = response.bytes() => result
                .map_err(|e| TransportError::Other(format!("failed to read body: {e}")))?,
        };

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(ResponseData::new(
            status,
            status_text,
            headers,
            body.to_vec(),
            elapsed_ms,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn method_mapping() {
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Get),
            Method::GET
        );
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Patch),
            Method::PATCH
        );
    }

    #[test]
    fn invalid_json_body_is_rejected() {
        let result = ReqwestTransport::encode_body(&RequestBody::json("{not json"));
        assert!(matches!(result, Err(TransportError::InvalidBody(_))));
    }

    #[test]
    fn graphql_body_builds_an_envelope() {
        let body = ReqwestTransport::encode_body(&RequestBody::graphql(
            "query { me { id } }",
            r#"{"limit": 5}"#,
        ))
        .unwrap()
        .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["query"], "query { me { id } }");
        assert_eq!(parsed["variables"]["limit"], 5);

        let bare = ReqwestTransport::encode_body(&RequestBody::graphql("query { me }", ""))
            .unwrap()
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&bare).unwrap();
        assert!(parsed["variables"].is_null());
    }

    #[test]
    fn form_fields_are_url_encoded() {
        let body = ReqwestTransport::encode_body(&RequestBody::Form {
            fields: vec![
                ("name".to_string(), "a b".to_string()),
                ("tag".to_string(), "x&y".to_string()),
            ],
        })
        .unwrap()
        .unwrap();
        assert_eq!(body, "name=a+b&tag=x%26y");
    }

    #[test]
    fn empty_body_encodes_to_none() {
        assert!(ReqwestTransport::encode_body(&RequestBody::None)
            .unwrap()
            .is_none());
    }
}
