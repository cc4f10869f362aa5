//! Request authentication configuration.

use serde::{Deserialize, Serialize};

/// Where an API key is placed on the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyPlacement {
    /// Sent as a request header.
    #[default]
    Header,
    /// Appended as a query parameter.
    Query,
}

/// Authentication configuration for a request or collection.
///
/// Values may contain `{{placeholders}}`; they are interpolated before
/// the auth is applied to the resolved request draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    #[default]
    None,
    /// Inherit from the enclosing collection.
    Inherit,
    /// HTTP Basic authentication.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The token placed after `Bearer `.
        token: String,
    },
    /// API key authentication.
    ApiKey {
        /// Header or query parameter name.
        key: String,
        /// Key value.
        value: String,
        /// Placement on the outgoing request.
        #[serde(default)]
        placement: ApiKeyPlacement,
    },
}

impl AuthConfig {
    /// Returns the effective auth, resolving `Inherit` against the
    /// collection-level default.
    #[must_use]
    pub fn effective<'a>(&'a self, collection_default: &'a Self) -> &'a Self {
        match self {
            Self::Inherit => collection_default,
            other => other,
        }
    }
}
