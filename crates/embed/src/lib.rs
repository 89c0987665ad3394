//! Embedding boundary for titlecat.
//!
//! Everything that turns text into a vector goes through the [`Embedder`]
//! trait. Two implementations ship here:
//!
//! - [`StubEmbedder`] - deterministic hash-derived vectors. No network, no
//!   model files; used by tests and offline runs.
//! - [`ApiEmbedder`] - calls a remote feature-extraction endpoint (Hugging
//!   Face, OpenAI, or a custom `{"texts": [...]}` service) with retry and
//!   backoff on transient failures.
//!
//! The dimensionality of the vectors is a property of the model and is fixed
//! out of band; callers are expected to check it.
//!
//! ## Quick example
//!
//! ```no_run
//! use embed::{Embedder, EmbedderConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let embedder = EmbedderConfig::default().build().unwrap();
//!     let vectors = embedder
//!         .embed_batch(&["plumber".to_string(), "lawyer".to_string()])
//!         .await
//!         .unwrap();
//!     assert_eq!(vectors.len(), 2);
//! }
//! ```
//!
//! ## Env vars to know
//!
//! - `TITLECAT_EMBED_API_URL` - Override the API endpoint
//! - `TITLECAT_EMBED_API_TOKEN` - Bearer token for the provider

pub mod config;
pub mod error;
pub mod retry;
mod serde_millis;

mod api;
mod normalize;
mod stub;

use async_trait::async_trait;

pub use crate::api::ApiEmbedder;
pub use crate::config::EmbedderConfig;
pub use crate::error::EmbedError;
pub use crate::retry::RetryConfig;
pub use crate::stub::StubEmbedder;

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Label of the underlying model, for logs and diagnostics.
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed several texts, returning one vector per input in input order.
    ///
    /// The default implementation calls [`embed`](Self::embed) sequentially;
    /// implementations with a native batch endpoint should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
