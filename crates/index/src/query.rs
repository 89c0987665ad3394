use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::{Arc, OnceLock, RwLock};

use crate::snapshot::{unit, usable_norm};
use crate::{EmbeddingSnapshot, IndexError};

/// Result entry for a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    pub service_type_id: String,
    /// Cosine similarity in `[-1, 1]`, higher is more similar.
    pub score: f32,
}

/// Current catalog snapshot plus the top-K query over it.
///
/// The vector dimension is fixed for the lifetime of the index: either
/// configured up front with [`with_dimension`](Self::with_dimension) or taken
/// from the first non-empty snapshot published.
pub struct EmbeddingIndex {
    current: RwLock<Arc<EmbeddingSnapshot>>,
    dimension: OnceLock<usize>,
}

impl Default for EmbeddingIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingIndex {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(EmbeddingSnapshot::empty())),
            dimension: OnceLock::new(),
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        let index = Self::new();
        if dimension > 0 {
            let _ = index.dimension.set(dimension);
        }
        index
    }

    /// Fixed vector dimension, once known.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// The snapshot queries currently run against.
    pub fn snapshot(&self) -> Result<Arc<EmbeddingSnapshot>, IndexError> {
        self.current
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|_| IndexError::Lock("poisoned snapshot lock".into()))
    }

    pub fn len(&self) -> usize {
        self.snapshot().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically replace the current snapshot.
    ///
    /// Assigns the next version number and returns the published snapshot.
    /// Rejects a non-empty snapshot whose dimension differs from the index
    /// dimension; the previous snapshot stays active in that case.
    pub fn publish(
        &self,
        mut snapshot: EmbeddingSnapshot,
    ) -> Result<Arc<EmbeddingSnapshot>, IndexError> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| IndexError::Lock("poisoned snapshot lock".into()))?;

        if !snapshot.is_empty() {
            let expected = *self.dimension.get_or_init(|| snapshot.dimension());
            if snapshot.dimension() != expected {
                return Err(IndexError::InvalidDimension {
                    expected,
                    actual: snapshot.dimension(),
                });
            }
        }

        snapshot.version = guard.version() + 1;
        let published = Arc::new(snapshot);
        *guard = Arc::clone(&published);
        Ok(published)
    }

    /// Rank the catalog against `query` and return the best `k` matches.
    ///
    /// Errors are checked in order: [`IndexError::EmptyIndex`],
    /// [`IndexError::InvalidDimension`], [`IndexError::DegenerateVector`].
    /// `k` is clamped to the catalog size and `k == 0` yields no matches.
    /// Ties keep catalog order.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<RankedMatch>, IndexError> {
        self.snapshot()?.top_k(query, k)
    }

    /// [`top_k`](Self::top_k) for several queries against one captured snapshot.
    pub fn top_k_batch(
        &self,
        queries: &[Vec<f32>],
        k: usize,
    ) -> Result<Vec<Result<Vec<RankedMatch>, IndexError>>, IndexError> {
        let snapshot = self.snapshot()?;
        Ok(queries.iter().map(|q| snapshot.top_k(q, k)).collect())
    }
}

impl EmbeddingSnapshot {
    /// Brute-force cosine ranking against this snapshot.
    ///
    /// Same contract as [`EmbeddingIndex::top_k`]; use it to rank several
    /// queries against one captured snapshot.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<RankedMatch>, IndexError> {
        if self.is_empty() {
            return Err(IndexError::EmptyIndex);
        }
        if query.len() != self.dimension() {
            return Err(IndexError::InvalidDimension {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        let norm = usable_norm(query).ok_or(IndexError::DegenerateVector)?;
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        // Both sides unit length, so the dot product stays in [-1, 1] whatever
        // the query's magnitude.
        let query: Vec<f32> = unit(query, norm).collect();
        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|idx| (idx, dot(self.row(idx), &query)))
            .collect();
        // `sort_by` is stable, so equal scores stay in catalog order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        let entries = self.entries();
        Ok(scored
            .into_iter()
            .map(|(idx, score)| RankedMatch {
                service_type_id: entries[idx].id.clone(),
                score: score.clamp(-1.0, 1.0),
            })
            .collect())
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceType;
    use std::collections::HashSet;

    fn index_with(rows: Vec<(&str, Vec<f32>)>) -> EmbeddingIndex {
        let entries = rows
            .into_iter()
            .map(|(id, v)| ServiceType::new(id, format!("{id} work"), v))
            .collect();
        let index = EmbeddingIndex::new();
        index.publish(EmbeddingSnapshot::build(entries).unwrap()).unwrap();
        index
    }

    fn sample() -> EmbeddingIndex {
        index_with(vec![
            ("plumbing", vec![1.0, 0.0, 0.0]),
            ("legal", vec![0.0, 1.0, 0.0]),
            ("electrical", vec![0.7, 0.7, 0.0]),
            ("cleaning", vec![0.0, 0.0, 1.0]),
        ])
    }

    #[test]
    fn empty_index_rejects_queries() {
        let index = EmbeddingIndex::new();
        assert_eq!(index.top_k(&[1.0, 0.0], 3), Err(IndexError::EmptyIndex));
        assert!(index.is_empty());
        assert_eq!(index.dimension(), None);
    }

    #[test]
    fn results_are_bounded_sorted_and_unique() {
        let index = sample();
        let matches = index.top_k(&[0.9, 0.2, 0.1], 3).unwrap();

        assert_eq!(matches.len(), 3);
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
        let ids: HashSet<_> = matches.iter().map(|m| m.service_type_id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(matches[0].service_type_id, "plumbing");
    }

    #[test]
    fn tiny_and_huge_queries_rank_like_unit_ones() {
        let index = index_with(vec![("A", vec![1.0, 0.0]), ("B", vec![0.0, 1.0])]);

        let tiny = index.top_k(&[1e-25, 0.0], 1).unwrap();
        assert_eq!(tiny[0].service_type_id, "A");
        assert!((tiny[0].score - 1.0).abs() < 1e-6);

        let reference = index.top_k(&[1.0, 0.1], 2).unwrap();
        let huge = index.top_k(&[1e20, 1e19], 2).unwrap();
        assert_eq!(huge.len(), 2);
        for (h, r) in huge.iter().zip(&reference) {
            assert_eq!(h.service_type_id, r.service_type_id);
            assert!((h.score - r.score).abs() < 1e-6);
        }
        assert!((huge[0].score - 0.995).abs() < 1e-3);

        assert!(index.top_k(&[f32::MAX, f32::MAX], 1).is_ok());
    }

    #[test]
    fn exact_match_scores_one_regardless_of_scale() {
        let index = sample();
        let matches = index.top_k(&[0.0, 0.0, 5.0], 1).unwrap();
        assert_eq!(matches[0].service_type_id, "cleaning");
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn scaling_the_query_does_not_change_ranking() {
        let index = sample();
        let a = index.top_k(&[0.3, 0.5, 0.1], 4).unwrap();
        let b = index.top_k(&[0.6, 1.0, 0.2], 4).unwrap();
        let ids_a: Vec<_> = a.iter().map(|m| &m.service_type_id).collect();
        let ids_b: Vec<_> = b.iter().map(|m| &m.service_type_id).collect();
        assert_eq!(ids_a, ids_b);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x.score - y.score).abs() < 1e-6);
        }
    }

    #[test]
    fn k_is_clamped_and_zero_returns_nothing() {
        let index = sample();
        assert_eq!(index.top_k(&[1.0, 0.0, 0.0], 50).unwrap().len(), 4);
        assert!(index.top_k(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn zero_query_is_degenerate() {
        let index = sample();
        assert_eq!(
            index.top_k(&[0.0, 0.0, 0.0], 2),
            Err(IndexError::DegenerateVector)
        );
    }

    #[test]
    fn wrong_query_length_is_rejected() {
        let index = sample();
        assert_eq!(
            index.top_k(&[1.0, 0.0], 2),
            Err(IndexError::InvalidDimension {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn ties_keep_catalog_order() {
        let index = index_with(vec![
            ("first", vec![1.0, 0.0]),
            ("second", vec![2.0, 0.0]),
            ("third", vec![0.0, 1.0]),
        ]);
        let matches = index.top_k(&[1.0, 0.0], 2).unwrap();
        assert_eq!(matches[0].service_type_id, "first");
        assert_eq!(matches[1].service_type_id, "second");
    }

    #[test]
    fn two_category_example() {
        let index = index_with(vec![("A", vec![1.0, 0.0]), ("B", vec![0.0, 1.0])]);
        let matches = index.top_k(&[0.9, 0.1], 1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].service_type_id, "A");
        assert!((matches[0].score - 0.9939).abs() < 1e-3, "{}", matches[0].score);
    }

    #[test]
    fn publish_bumps_version_and_fixes_dimension() {
        let index = sample();
        assert_eq!(index.snapshot().unwrap().version(), 1);
        assert_eq!(index.dimension(), Some(3));

        let next = EmbeddingSnapshot::build(vec![ServiceType::new("x", "x", vec![0.0, 1.0, 0.0])])
            .unwrap();
        let published = index.publish(next).unwrap();
        assert_eq!(published.version(), 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn publish_rejects_dimension_change() {
        let index = sample();
        let wider =
            EmbeddingSnapshot::build(vec![ServiceType::new("x", "x", vec![1.0, 0.0, 0.0, 0.0])])
                .unwrap();
        assert_eq!(
            index.publish(wider).unwrap_err(),
            IndexError::InvalidDimension {
                expected: 3,
                actual: 4
            }
        );
        // Previous snapshot still serves.
        assert_eq!(index.len(), 4);
        assert_eq!(index.snapshot().unwrap().version(), 1);
    }

    #[test]
    fn configured_dimension_applies_to_first_publish() {
        let index = EmbeddingIndex::with_dimension(2);
        let snapshot =
            EmbeddingSnapshot::build(vec![ServiceType::new("x", "x", vec![1.0, 0.0, 0.0])])
                .unwrap();
        assert!(matches!(
            index.publish(snapshot),
            Err(IndexError::InvalidDimension { expected: 2, .. })
        ));
    }

    #[test]
    fn held_snapshot_survives_swap() {
        let index = sample();
        let before = index.snapshot().unwrap();
        index
            .publish(
                EmbeddingSnapshot::build(vec![ServiceType::new("only", "x", vec![1.0, 1.0, 1.0])])
                    .unwrap(),
            )
            .unwrap();

        let old = before.top_k(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(old.len(), 4);
        assert_eq!(index.top_k(&[1.0, 0.0, 0.0], 10).unwrap().len(), 1);
    }

    #[test]
    fn batch_reports_per_query_errors() {
        let index = sample();
        let results = index
            .top_k_batch(&[vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 0.0], vec![1.0]], 1)
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1], Err(IndexError::DegenerateVector));
        assert!(matches!(results[2], Err(IndexError::InvalidDimension { .. })));
    }
}
