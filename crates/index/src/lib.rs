//! # titlecat index
//!
//! Holds the service-type catalog as an immutable, L2-normalised matrix and
//! answers exact top-K cosine similarity queries against it.
//!
//! ## Core pieces
//!
//! - [`EmbeddingSnapshot`]: the fully built catalog. Rows are normalised once
//!   at build time so a query is a single pass of dot products.
//! - [`EmbeddingIndex`]: owns the current snapshot behind a
//!   `RwLock<Arc<_>>`. Readers clone the `Arc` and rank against it without
//!   holding the lock, so a concurrent [`publish`](EmbeddingIndex::publish)
//!   never tears a query.
//! - [`VectorCache`]: advisory key-value persistence for embeddings, with an
//!   in-memory backend, a redb backend (feature `backend-redb`, on by default)
//!   and a Redis backend (feature `redis`).
//!
//! The catalog is small (tens to low thousands of rows), so ranking is brute
//! force. There is no approximate search.
//!
//! ## Example Usage
//!
//! ```
//! use index::{EmbeddingIndex, EmbeddingSnapshot, ServiceType};
//!
//! let snapshot = EmbeddingSnapshot::build(vec![
//!     ServiceType::new("plumbing", "pipes and drains", vec![1.0, 0.0]),
//!     ServiceType::new("legal", "contracts and disputes", vec![0.0, 1.0]),
//! ])
//! .unwrap();
//!
//! let index = EmbeddingIndex::new();
//! index.publish(snapshot).unwrap();
//!
//! let matches = index.top_k(&[0.9, 0.1], 1).unwrap();
//! assert_eq!(matches[0].service_type_id, "plumbing");
//! ```

mod cache;
mod query;
mod snapshot;

pub use cache::{CacheBackendConfig, CachedVector, InMemoryVectorCache, VectorCache};
#[cfg(feature = "backend-redb")]
pub use cache::redb::RedbVectorCache;
#[cfg(feature = "redis")]
pub use cache::redis::RedisVectorCache;
pub use query::{EmbeddingIndex, RankedMatch};
pub use snapshot::{is_degenerate, EmbeddingSnapshot, ServiceType};

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

/// Errors raised by snapshot construction and similarity queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// A vector's length disagrees with the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
    /// No snapshot with at least one entry has been published yet.
    #[error("index is empty: no service types have been published")]
    EmptyIndex,
    /// The vector has zero or non-finite L2 norm, so cosine is undefined.
    #[error("vector has zero or non-finite norm")]
    DegenerateVector,
    #[error("duplicate service type id `{0}`")]
    DuplicateServiceType(String),
    #[error("lock poisoned: {0}")]
    Lock(String),
}

/// Errors raised by [`VectorCache`] backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization encode error: {0}")]
    Encode(String),
    #[error("Serialization decode error: {0}")]
    Decode(String),
}

impl From<EncodeError> for CacheError {
    fn from(e: EncodeError) -> Self {
        CacheError::Encode(e.to_string())
    }
}

impl From<DecodeError> for CacheError {
    fn from(e: DecodeError) -> Self {
        CacheError::Decode(e.to_string())
    }
}

impl CacheError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}
