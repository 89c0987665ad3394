use std::time::Duration;

use embed::EmbedError;
use index::IndexError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures fetching or parsing the service-type catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog source failed: {0}")]
    Source(String),
}

/// Reasons a refresh was aborted. The previous snapshot stays active in every case.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("catalog load failed: {0}")]
    CatalogLoad(#[from] CatalogError),

    #[error("no service type could be resolved ({skipped} skipped)")]
    NothingResolved { skipped: usize },

    #[error("refresh exceeded its {0:?} budget")]
    Timeout(Duration),

    #[error("snapshot rejected: {0}")]
    Publish(#[from] IndexError),
}

/// Per-title failure reported inside an otherwise successful batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TitleError {
    #[error("embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("title embedding has zero norm")]
    DegenerateVector,

    #[error("title embedding has {actual} dimensions, index expects {expected}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("no service types loaded yet")]
    EmptyIndex,

    #[error("embedding timed out after {0:?}")]
    Timeout(Duration),
}

impl TitleError {
    /// Stable machine-readable kind used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            TitleError::EmbeddingFailure(_) => "embedding_failure",
            TitleError::DegenerateVector => "degenerate_vector",
            TitleError::InvalidDimension { .. } => "invalid_dimension",
            TitleError::EmptyIndex => "empty_index",
            TitleError::Timeout(_) => "timeout",
        }
    }

    pub fn marker(&self) -> ErrorMarker {
        ErrorMarker {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<EmbedError> for TitleError {
    fn from(e: EmbedError) -> Self {
        match e {
            EmbedError::Timeout(budget) => TitleError::Timeout(budget),
            other => TitleError::EmbeddingFailure(other.to_string()),
        }
    }
}

impl From<IndexError> for TitleError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::InvalidDimension { expected, actual } => {
                TitleError::InvalidDimension { expected, actual }
            }
            IndexError::EmptyIndex => TitleError::EmptyIndex,
            IndexError::DegenerateVector => TitleError::DegenerateVector,
            // Build-time and lock errors never come out of a query on a healthy index.
            other => TitleError::EmbeddingFailure(other.to_string()),
        }
    }
}

/// Serialized form of a [`TitleError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMarker {
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_errors_map_to_title_errors() {
        assert_eq!(
            TitleError::from(IndexError::EmptyIndex),
            TitleError::EmptyIndex
        );
        assert_eq!(
            TitleError::from(IndexError::InvalidDimension {
                expected: 3,
                actual: 2
            }),
            TitleError::InvalidDimension {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(
            TitleError::from(IndexError::DegenerateVector).kind(),
            "degenerate_vector"
        );
    }

    #[test]
    fn embed_timeout_keeps_its_kind() {
        let err = TitleError::from(EmbedError::Timeout(Duration::from_millis(50)));
        assert_eq!(err.kind(), "timeout");

        let err = TitleError::from(EmbedError::Request("reset".into()));
        assert_eq!(err.kind(), "embedding_failure");
        assert!(err.marker().message.contains("reset"));
    }

    #[test]
    fn refresh_error_messages() {
        let err = RefreshError::NothingResolved { skipped: 4 };
        assert_eq!(err.to_string(), "no service type could be resolved (4 skipped)");

        let err = RefreshError::from(CatalogError::Source("db down".into()));
        assert!(err.to_string().contains("db down"));
    }
}
