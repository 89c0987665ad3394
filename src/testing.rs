//! Deterministic collaborators for tests and local demos.

use async_trait::async_trait;
use embed::{EmbedError, Embedder};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Embedder driven by a lookup table.
///
/// Texts in the table map to their vector, texts marked with
/// [`failing`](Self::failing) error, and anything else errors too. A batch
/// call fails as a whole if any of its texts would fail, which mirrors how a
/// remote provider rejects a request. Calls are counted so tests can assert
/// on cache behaviour.
#[derive(Debug, Default)]
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
    model: Option<String>,
    delay: Option<Duration>,
    batch_calls: AtomicUsize,
    single_calls: AtomicUsize,
    texts_embedded: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    pub fn failing(mut self, text: impl Into<String>) -> Self {
        self.failing.insert(text.into());
        self
    }

    /// Report `name` from [`Embedder::model_name`] instead of `scripted`.
    pub fn with_model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(name.into());
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    /// Texts sent to the model across all calls.
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.batch_calls() + self.single_calls()
    }

    /// Most single `embed` calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn lookup(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if self.failing.contains(text) {
            return Err(EmbedError::Status {
                status: 500,
                body: format!("model failed on `{text}`"),
            });
        }
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EmbedError::Response(format!("no vector scripted for `{text}`")))
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or("scripted")
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        let _running = Running::enter(&self.in_flight, &self.peak_in_flight);
        self.pause().await;
        self.lookup(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        self.pause().await;
        texts.iter().map(|text| self.lookup(text)).collect()
    }
}

/// Counts a call as running until dropped, including when it is cancelled.
struct Running<'a>(&'a AtomicUsize);

impl<'a> Running<'a> {
    fn enter(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
