use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by an [`Embedder`](crate::Embedder).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbedError {
    /// Configuration is inconsistent (e.g. API mode without an endpoint).
    #[error("invalid embedder config: {0}")]
    InvalidConfig(String),
    /// The request never produced an HTTP response (DNS, connect, reset).
    #[error("embedding request failed: {0}")]
    Request(String),
    /// The provider answered with a non-success status.
    #[error("embedding provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The provider answered with a body we could not turn into vectors.
    #[error("invalid embedding response: {0}")]
    Response(String),
    /// A batch call returned a different number of vectors than inputs.
    #[error("model returned {actual} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
    /// The call did not finish inside its time budget.
    #[error("embedding timed out after {0:?}")]
    Timeout(Duration),
}

impl EmbedError {
    /// Whether retrying the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbedError::Request(_) | EmbedError::Timeout(_) => true,
            EmbedError::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
            EmbedError::InvalidConfig(_)
            | EmbedError::Response(_)
            | EmbedError::CountMismatch { .. } => false,
        }
    }
}
