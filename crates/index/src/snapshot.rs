use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::SystemTime;

use crate::IndexError;

/// One catalog entry together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: String,
    pub description: String,
    /// Raw embedding as produced by the model (not necessarily unit length).
    pub embedding: Vec<f32>,
}

impl ServiceType {
    pub fn new(id: impl Into<String>, description: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            embedding,
        }
    }
}

/// L2 norm, or `None` when the vector cannot take part in cosine similarity.
///
/// Accumulates in f64: squares of finite f32 values neither underflow to zero
/// nor overflow there, so only a true zero vector or a NaN/infinite component
/// is rejected.
pub(crate) fn usable_norm(v: &[f32]) -> Option<f64> {
    let norm = v
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if norm.is_finite() && norm > 0.0 {
        Some(norm)
    } else {
        None
    }
}

/// `v` scaled by `1 / norm`, computed in f64.
pub(crate) fn unit(v: &[f32], norm: f64) -> impl Iterator<Item = f32> + '_ {
    v.iter().map(move |&x| (f64::from(x) / norm) as f32)
}

/// Whether `v` has zero or non-finite norm.
pub fn is_degenerate(v: &[f32]) -> bool {
    usable_norm(v).is_none()
}

/// Immutable, fully built set of service-type embeddings.
///
/// `matrix` is row-major with one L2-normalised row per entry, in catalog
/// order. A snapshot is never mutated after construction; the index replaces
/// it wholesale.
#[derive(Debug, Clone)]
pub struct EmbeddingSnapshot {
    entries: Vec<ServiceType>,
    matrix: Vec<f32>,
    dimension: usize,
    pub(crate) version: u64,
    built_at: SystemTime,
}

impl EmbeddingSnapshot {
    /// Snapshot with no entries. Queries against it fail with [`IndexError::EmptyIndex`].
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            matrix: Vec::new(),
            dimension: 0,
            version: 0,
            built_at: SystemTime::now(),
        }
    }

    /// Validate `entries` and build the normalised matrix.
    ///
    /// Fails on duplicate ids, on rows whose length differs from the first
    /// row, and on zero-norm rows.
    pub fn build(entries: Vec<ServiceType>) -> Result<Self, IndexError> {
        let Some(first) = entries.first() else {
            return Ok(Self::empty());
        };
        let dimension = first.embedding.len();

        let mut seen = HashSet::with_capacity(entries.len());
        let mut matrix = Vec::with_capacity(entries.len() * dimension);
        for entry in &entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(IndexError::DuplicateServiceType(entry.id.clone()));
            }
            if entry.embedding.len() != dimension {
                return Err(IndexError::InvalidDimension {
                    expected: dimension,
                    actual: entry.embedding.len(),
                });
            }
            let norm = usable_norm(&entry.embedding).ok_or(IndexError::DegenerateVector)?;
            matrix.extend(unit(&entry.embedding, norm));
        }

        Ok(Self {
            entries,
            matrix,
            dimension,
            version: 0,
            built_at: SystemTime::now(),
        })
    }

    pub fn entries(&self) -> &[ServiceType] {
        &self.entries
    }

    /// Vector length shared by every row; `0` for an empty snapshot.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Monotonic publish counter; `0` until the snapshot is published.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> SystemTime {
        self.built_at
    }

    pub fn get(&self, id: &str) -> Option<&ServiceType> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Normalised row `idx`.
    pub(crate) fn row(&self, idx: usize) -> &[f32] {
        let start = idx * self.dimension;
        &self.matrix[start..start + self.dimension]
    }

    /// Same entries in the same order. Ignores version and build time.
    pub fn same_content(&self, other: &EmbeddingSnapshot) -> bool {
        self.entries == other.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn st(id: &str, embedding: Vec<f32>) -> ServiceType {
        ServiceType::new(id, format!("{id} services"), embedding)
    }

    #[test]
    fn build_normalises_rows() {
        let snapshot = EmbeddingSnapshot::build(vec![st("a", vec![3.0, 4.0])]).unwrap();
        let row = snapshot.row(0);
        assert!((row[0] - 0.6).abs() < 1e-6);
        assert!((row[1] - 0.8).abs() < 1e-6);
        // Raw embedding is kept as delivered.
        assert_eq!(snapshot.entries()[0].embedding, vec![3.0, 4.0]);
    }

    #[test]
    fn build_rejects_duplicate_ids() {
        let err = EmbeddingSnapshot::build(vec![st("a", vec![1.0, 0.0]), st("a", vec![0.0, 1.0])])
            .unwrap_err();
        assert_eq!(err, IndexError::DuplicateServiceType("a".into()));
    }

    #[test]
    fn build_rejects_mixed_dimensions() {
        let err = EmbeddingSnapshot::build(vec![st("a", vec![1.0, 0.0]), st("b", vec![1.0])])
            .unwrap_err();
        assert_eq!(
            err,
            IndexError::InvalidDimension {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn build_rejects_zero_norm_rows() {
        let err = EmbeddingSnapshot::build(vec![st("a", vec![0.0, 0.0])]).unwrap_err();
        assert_eq!(err, IndexError::DegenerateVector);
    }

    #[test]
    fn build_of_nothing_is_empty() {
        let snapshot = EmbeddingSnapshot::build(Vec::new()).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.dimension(), 0);
        assert_eq!(snapshot.version(), 0);
    }

    #[test]
    fn degenerate_detection() {
        assert!(is_degenerate(&[0.0, 0.0]));
        assert!(is_degenerate(&[]));
        assert!(is_degenerate(&[f32::NAN, 1.0]));
        assert!(is_degenerate(&[f32::INFINITY]));
        assert!(!is_degenerate(&[1e-3, 0.0]));
    }

    #[test]
    fn extreme_but_finite_vectors_are_usable() {
        assert!(!is_degenerate(&[1e-30, 0.0]));
        assert!(!is_degenerate(&[f32::MIN_POSITIVE / 4.0]));
        assert!(!is_degenerate(&[f32::MAX, f32::MAX]));

        let snapshot = EmbeddingSnapshot::build(vec![
            st("tiny", vec![3e-25, 4e-25]),
            st("huge", vec![3e30, -4e30]),
        ])
        .unwrap();
        assert!((snapshot.row(0)[0] - 0.6).abs() < 1e-6);
        assert!((snapshot.row(0)[1] - 0.8).abs() < 1e-6);
        assert!((snapshot.row(1)[1] + 0.8).abs() < 1e-6);
    }

    #[test]
    fn same_content_ignores_metadata() {
        let a = EmbeddingSnapshot::build(vec![st("a", vec![1.0, 0.0])]).unwrap();
        let mut b = EmbeddingSnapshot::build(vec![st("a", vec![1.0, 0.0])]).unwrap();
        b.version = 7;
        assert!(a.same_content(&b));
        assert_eq!(a.get("a").map(|s| s.id.as_str()), Some("a"));
        assert!(a.get("missing").is_none());
    }
}
