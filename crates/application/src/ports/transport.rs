//! Transport port for dispatching resolved requests.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use quiver_domain::{FailureKind, RequestDraft, ResponseData};

/// Errors a transport adapter can report.
///
/// Every variant except `Aborted` maps onto a [`FailureKind`] and makes
/// the run `Failed`; `Aborted` is the cancellation path and never
/// surfaces as a failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The resolved URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// DNS resolution failed.
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection was refused.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The request exceeded its timeout.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// TLS negotiation failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The body could not be encoded for the wire.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The redirect limit was exceeded.
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(u32),

    /// The in-flight request was cancelled.
    #[error("request aborted")]
    Aborted,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Maps this error onto a display failure category.
    ///
    /// `Aborted` has no category; callers handle it before mapping.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidUrl(_) => FailureKind::InvalidUrl,
            Self::Dns(_) => FailureKind::Dns,
            Self::ConnectionFailed(_) => FailureKind::ConnectionFailed,
            Self::ConnectionRefused(_) => FailureKind::ConnectionRefused,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Tls(_) => FailureKind::Tls,
            Self::InvalidBody(_) => FailureKind::InvalidBody,
            Self::TooManyRedirects(_) => FailureKind::TooManyRedirects,
            Self::Aborted | Self::Other(_) => FailureKind::Other,
        }
    }

    /// Returns whether this error is the cancellation path.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Port for sending a resolved request over the wire.
///
/// Implementations must honor the cancellation token: when it fires
/// mid-flight they drop the connection and return
/// [`TransportError::Aborted`]. Non-2xx statuses are responses, never
/// errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the draft and collects the raw response.
    async fn send(
        &self,
        draft: &RequestDraft,
        cancel: CancellationToken,
    ) -> Result<ResponseData, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(
        &self,
        draft: &RequestDraft,
        cancel: CancellationToken,
    ) -> Result<ResponseData, TransportError> {
        (**self).send(draft, cancel).await
    }
}
