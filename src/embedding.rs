//! Batch-first embedding with per-item fallback, shared by refresh and categorize.

use embed::{EmbedError, Embedder};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::future::Future;
use std::time::Duration;

/// Run `fut` under `budget`, if any, reporting expiry as [`EmbedError::Timeout`].
pub(crate) async fn within<T, F>(budget: Option<Duration>, fut: F) -> Result<T, EmbedError>
where
    F: Future<Output = Result<T, EmbedError>>,
{
    match budget {
        Some(budget) => tokio::time::timeout(budget, fut)
            .await
            .unwrap_or(Err(EmbedError::Timeout(budget))),
        None => fut.await,
    }
}

/// Embed `texts`, one result per input in input order.
///
/// Tries a single batch call first. If it fails, times out, or returns the
/// wrong number of vectors, every text is embedded on its own, each under its
/// own budget, so one bad input cannot sink the rest. At most `concurrency`
/// single calls are in flight at once.
pub(crate) async fn embed_with_fallback(
    embedder: &dyn Embedder,
    texts: &[String],
    budget: Option<Duration>,
    concurrency: usize,
) -> Vec<Result<Vec<f32>, EmbedError>> {
    if texts.is_empty() {
        return Vec::new();
    }

    match within(budget, embedder.embed_batch(texts)).await {
        Ok(vectors) if vectors.len() == texts.len() => return vectors.into_iter().map(Ok).collect(),
        Ok(vectors) => tracing::warn!(
            expected = texts.len(),
            actual = vectors.len(),
            model = embedder.model_name(),
            "batch embedding returned wrong count; falling back to single calls"
        ),
        Err(error) => tracing::warn!(
            %error,
            batch = texts.len(),
            model = embedder.model_name(),
            "batch embedding failed; falling back to single calls"
        ),
    }

    let singles: Vec<_> = texts
        .iter()
        .map(|text| within(budget, embedder.embed(text)).boxed())
        .collect();
    stream::iter(singles)
        .buffered(concurrency.max(1))
        .collect()
        .await
}
