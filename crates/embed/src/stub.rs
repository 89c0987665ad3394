use async_trait::async_trait;
use fxhash::hash64;

use crate::normalize::normalize_l2;
use crate::{EmbedError, Embedder};

/// Deterministic embedder used for tests, demos and offline runs.
///
/// Generates sinusoid values derived from a hash of the input text, so equal
/// texts always map to equal vectors at negligible CPU cost. The vectors carry
/// no semantic meaning.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    model_name: String,
    dimension: usize,
    normalize: bool,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model_name: "stub".into(),
            dimension,
            normalize: true,
        }
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimension];
        let h = hash64(text.as_bytes());
        for (idx, value) in v.iter_mut().enumerate() {
            *value = ((h >> (idx % 32)) as f32 * 0.0001).sin();
        }
        if self.normalize {
            normalize_l2(&mut v);
        }
        v
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_has_requested_dimension() {
        let embedder = StubEmbedder::new(16);
        let v = embedder.embed("plumber").await.unwrap();
        assert_eq!(v.len(), 16);
    }

    #[tokio::test]
    async fn stub_is_deterministic() {
        let embedder = StubEmbedder::default();
        let a = embedder.embed("same text").await.unwrap();
        let b = embedder.embed("same text").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn stub_distinguishes_texts() {
        let embedder = StubEmbedder::default();
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("world").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn stub_normalizes_by_default() {
        let embedder = StubEmbedder::new(64);
        let v = embedder.embed("electrician").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm={norm}");
    }

    #[tokio::test]
    async fn stub_batch_matches_single_calls() {
        let embedder = StubEmbedder::new(32).with_normalize(false);
        let texts = vec!["first".to_string(), "second".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("first").await.unwrap());
        assert_eq!(batch[1], embedder.embed("second").await.unwrap());
    }

    #[tokio::test]
    async fn stub_values_are_sinusoids() {
        let embedder = StubEmbedder::new(128).with_normalize(false);
        let v = embedder.embed("Hello 世界").await.unwrap();
        assert!(v.iter().all(|x| (-1.0..=1.0).contains(x)));
        assert!(!v.iter().all(|&x| x == 0.0));
    }
}
