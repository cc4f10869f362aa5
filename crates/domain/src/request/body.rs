//! Typed request bodies.
//!
//! A body is typed by its mode; the pipeline interpolates the textual
//! content and the transport adapter encodes it onto the wire.

use serde::{Deserialize, Serialize};

/// HTTP request body, typed by mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RequestBody {
    /// No body.
    #[default]
    None,
    /// JSON body (content validated by the transport before sending).
    Json {
        /// JSON text, may contain `{{placeholders}}`.
        content: String,
    },
    /// XML body.
    Xml {
        /// XML text.
        content: String,
    },
    /// Plain text body.
    Text {
        /// Text content.
        content: String,
    },
    /// GraphQL body, sent as a `{"query": ..., "variables": ...}` envelope.
    GraphQl {
        /// GraphQL query document.
        query: String,
        /// Variables as a JSON object string; empty means no variables.
        #[serde(default)]
        variables: String,
    },
    /// URL-encoded form body.
    Form {
        /// Ordered form fields.
        fields: Vec<(String, String)>,
    },
}

impl RequestBody {
    /// Creates a JSON body.
    #[must_use]
    pub fn json(content: impl Into<String>) -> Self {
        Self::Json {
            content: content.into(),
        }
    }

    /// Creates a plain text body.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Creates a GraphQL body.
    #[must_use]
    pub fn graphql(query: impl Into<String>, variables: impl Into<String>) -> Self {
        Self::GraphQl {
            query: query.into(),
            variables: variables.into(),
        }
    }

    /// Returns whether there is no content to send.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Json { content } | Self::Xml { content } | Self::Text { content } => {
                content.is_empty()
            }
            Self::GraphQl { query, .. } => query.is_empty(),
            Self::Form { fields } => fields.is_empty(),
        }
    }

    /// Returns the default Content-Type for this body mode.
    #[must_use]
    pub const fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Json { .. } | Self::GraphQl { .. } => Some("application/json"),
            Self::Xml { .. } => Some("application/xml"),
            Self::Text { .. } => Some("text/plain"),
            Self::Form { .. } => Some("application/x-www-form-urlencoded"),
        }
    }
}
