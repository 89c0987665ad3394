//! Query facade: titles in, ranked service types out.

use embed::Embedder;
use index::{EmbeddingIndex, EmbeddingSnapshot, RankedMatch, VectorCache};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::config::CategorizeConfig;
use crate::embedding::embed_with_fallback;
use crate::TitleError;

/// One title to categorize on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TitleQuery {
    pub user_id: String,
    pub title: String,
}

impl TitleQuery {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
        }
    }

    /// Cache key for this title's vector under `model`.
    pub fn cache_key(&self, model: &str) -> String {
        format!("title:{model}:{}:{}", self.user_id, self.title)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TitleOutcome {
    Matches(Vec<RankedMatch>),
    Error(TitleError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleResult {
    pub user_id: String,
    pub title: String,
    pub outcome: TitleOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorizeResponse {
    /// Version of the snapshot every title was ranked against.
    pub snapshot_version: u64,
    /// One entry per distinct query, in first-seen order.
    pub results: Vec<TitleResult>,
}

impl CategorizeResponse {
    /// Whether every title failed only because no catalog is loaded yet.
    pub fn all_empty_index(&self) -> bool {
        !self.results.is_empty()
            && self
                .results
                .iter()
                .all(|r| r.outcome == TitleOutcome::Error(TitleError::EmptyIndex))
    }
}

pub struct CategorizationService {
    embedder: Arc<dyn Embedder>,
    index: Arc<EmbeddingIndex>,
    title_cache: Option<Arc<dyn VectorCache>>,
    config: CategorizeConfig,
}

impl CategorizationService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<EmbeddingIndex>,
        config: CategorizeConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            title_cache: None,
            config,
        }
    }

    /// Cache title vectors in `cache` when `title_cache_enabled` is set.
    pub fn with_title_cache(mut self, cache: Arc<dyn VectorCache>) -> Self {
        if self.config.title_cache_enabled {
            self.title_cache = Some(cache);
        }
        self
    }

    pub fn config(&self) -> &CategorizeConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    /// Ready once a non-empty snapshot has been published.
    pub fn is_ready(&self) -> bool {
        !self.index.is_empty()
    }

    /// Rank each distinct title against the current snapshot.
    ///
    /// Never fails as a whole: embedding and ranking errors are reported per
    /// title. Every title in one call sees the same snapshot.
    pub async fn categorize(&self, queries: &[TitleQuery], top_n: usize) -> CategorizeResponse {
        let started = Instant::now();

        let mut unique: Vec<&TitleQuery> = Vec::with_capacity(queries.len());
        let mut seen = HashSet::with_capacity(queries.len());
        for query in queries {
            if seen.insert(query) {
                unique.push(query);
            }
        }

        let snapshot = match self.index.snapshot() {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::error!(%error, "snapshot unavailable");
                let marker = TitleError::from(error);
                return CategorizeResponse {
                    snapshot_version: 0,
                    results: unique
                        .into_iter()
                        .map(|q| result(q, TitleOutcome::Error(marker.clone())))
                        .collect(),
                };
            }
        };

        if snapshot.is_empty() {
            tracing::debug!(titles = unique.len(), "categorize before first snapshot");
            return CategorizeResponse {
                snapshot_version: snapshot.version(),
                results: unique
                    .into_iter()
                    .map(|q| result(q, TitleOutcome::Error(TitleError::EmptyIndex)))
                    .collect(),
            };
        }

        let (vectors, cache_hits) = self.vectors_for(&unique, &snapshot).await;

        let mut failed = 0usize;
        let results: Vec<TitleResult> = unique
            .iter()
            .zip(vectors)
            .map(|(query, vector)| {
                let ranked = vector
                    .and_then(|v| snapshot.top_k(&v, top_n).map_err(TitleError::from));
                let outcome = match ranked {
                    Ok(matches) => TitleOutcome::Matches(matches),
                    Err(error) => {
                        failed += 1;
                        tracing::debug!(title = %query.title, %error, "title not categorized");
                        TitleOutcome::Error(error)
                    }
                };
                result(query, outcome)
            })
            .collect();

        tracing::info!(
            titles = results.len(),
            cache_hits,
            failed,
            snapshot_version = snapshot.version(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "categorized batch"
        );

        CategorizeResponse {
            snapshot_version: snapshot.version(),
            results,
        }
    }

    /// Title cache lookup, then one batch embed for the misses.
    async fn vectors_for(
        &self,
        queries: &[&TitleQuery],
        snapshot: &EmbeddingSnapshot,
    ) -> (Vec<Result<Vec<f32>, TitleError>>, usize) {
        let mut slots: Vec<Option<Result<Vec<f32>, TitleError>>> = vec![None; queries.len()];
        let mut misses = Vec::new();
        let mut cache_hits = 0usize;
        let model = self.embedder.model_name();

        for (idx, query) in queries.iter().enumerate() {
            let cached = match &self.title_cache {
                Some(cache) => match cache.get(&query.cache_key(model)).await {
                    Ok(hit) => hit,
                    Err(error) => {
                        tracing::warn!(
                            %error,
                            backend = cache.backend_name(),
                            "title cache read failed"
                        );
                        None
                    }
                },
                None => None,
            };
            match cached {
                // A vector cached under an older model shape is useless.
                Some(vector) if vector.len() == snapshot.dimension() => {
                    cache_hits += 1;
                    slots[idx] = Some(Ok(vector));
                }
                _ => misses.push(idx),
            }
        }

        if !misses.is_empty() {
            let texts: Vec<String> = misses
                .iter()
                .map(|&idx| queries[idx].title.clone())
                .collect();
            let results = embed_with_fallback(
                self.embedder.as_ref(),
                &texts,
                Some(self.config.embed_timeout()),
                self.config.embed_concurrency,
            )
            .await;

            for (&idx, embedded) in misses.iter().zip(results) {
                if let (Ok(vector), Some(cache)) = (&embedded, &self.title_cache) {
                    let key = queries[idx].cache_key(model);
                    let ttl = self.config.title_cache_ttl();
                    if let Err(error) = cache.put(&key, vector, ttl).await {
                        tracing::warn!(%error, "title cache write failed");
                    }
                }
                slots[idx] = Some(embedded.map_err(TitleError::from));
            }
        }

        let vectors = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(TitleError::EmbeddingFailure("not embedded".into())))
            })
            .collect();
        (vectors, cache_hits)
    }
}

fn result(query: &TitleQuery, outcome: TitleOutcome) -> TitleResult {
    TitleResult {
        user_id: query.user_id.clone(),
        title: query.title.clone(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedEmbedder;
    use index::{InMemoryVectorCache, ServiceType};

    fn two_category_index() -> Arc<EmbeddingIndex> {
        let index = Arc::new(EmbeddingIndex::new());
        index
            .publish(
                EmbeddingSnapshot::build(vec![
                    ServiceType::new("A", "plumbing", vec![1.0, 0.0]),
                    ServiceType::new("B", "legal", vec![0.0, 1.0]),
                ])
                .unwrap(),
            )
            .unwrap();
        index
    }

    fn matches(outcome: &TitleOutcome) -> &[RankedMatch] {
        match outcome {
            TitleOutcome::Matches(m) => m,
            TitleOutcome::Error(e) => panic!("unexpected error {e}"),
        }
    }

    #[tokio::test]
    async fn ranks_each_title() {
        let embedder = Arc::new(
            ScriptedEmbedder::new()
                .with("pipe fitter", vec![0.9, 0.1])
                .with("paralegal", vec![0.2, 0.8]),
        );
        let service = CategorizationService::new(
            embedder.clone(),
            two_category_index(),
            CategorizeConfig::default(),
        );

        let response = service
            .categorize(
                &[TitleQuery::new("u1", "pipe fitter"), TitleQuery::new("u1", "paralegal")],
                1,
            )
            .await;

        assert_eq!(response.snapshot_version, 1);
        assert_eq!(matches(&response.results[0].outcome)[0].service_type_id, "A");
        assert_eq!(matches(&response.results[1].outcome)[0].service_type_id, "B");
        assert_eq!(embedder.batch_calls(), 1);
    }

    #[tokio::test]
    async fn failing_title_does_not_abort_batch() {
        let embedder = Arc::new(
            ScriptedEmbedder::new()
                .with("pipe fitter", vec![0.9, 0.1])
                .failing("???")
                .with("zero", vec![0.0, 0.0]),
        );
        let service =
            CategorizationService::new(embedder, two_category_index(), CategorizeConfig::default());

        let response = service
            .categorize(
                &[
                    TitleQuery::new("u1", "pipe fitter"),
                    TitleQuery::new("u1", "???"),
                    TitleQuery::new("u1", "zero"),
                ],
                2,
            )
            .await;

        assert_eq!(matches(&response.results[0].outcome).len(), 2);
        assert!(matches!(
            response.results[1].outcome,
            TitleOutcome::Error(TitleError::EmbeddingFailure(_))
        ));
        assert_eq!(
            response.results[2].outcome,
            TitleOutcome::Error(TitleError::DegenerateVector)
        );
    }

    #[tokio::test]
    async fn duplicates_are_collapsed() {
        let embedder = Arc::new(ScriptedEmbedder::new().with("plumber", vec![1.0, 0.0]));
        let service = CategorizationService::new(
            embedder.clone(),
            two_category_index(),
            CategorizeConfig::default(),
        );

        let q = TitleQuery::new("u1", "plumber");
        let response = service.categorize(&[q.clone(), q.clone(), q], 1).await;
        assert_eq!(response.results.len(), 1);
        assert_eq!(embedder.texts_embedded(), 1);
    }

    #[tokio::test]
    async fn empty_index_reports_every_title() {
        let embedder = Arc::new(ScriptedEmbedder::new().with("plumber", vec![1.0, 0.0]));
        let service = CategorizationService::new(
            embedder.clone(),
            Arc::new(EmbeddingIndex::new()),
            CategorizeConfig::default(),
        );

        let response = service
            .categorize(&[TitleQuery::new("u1", "plumber"), TitleQuery::new("u2", "plumber")], 1)
            .await;
        assert!(response.all_empty_index());
        assert_eq!(embedder.total_calls(), 0);
        assert!(!service.is_ready());
    }

    #[tokio::test]
    async fn title_cache_avoids_second_embed() {
        let embedder = Arc::new(ScriptedEmbedder::new().with("plumber", vec![1.0, 0.0]));
        let cache = Arc::new(InMemoryVectorCache::new());
        let service = CategorizationService::new(
            embedder.clone(),
            two_category_index(),
            CategorizeConfig::default(),
        )
        .with_title_cache(cache.clone());

        let q = [TitleQuery::new("u1", "plumber")];
        service.categorize(&q, 1).await;
        service.categorize(&q, 1).await;

        assert_eq!(embedder.total_calls(), 1);
        assert_eq!(cache.get("title:scripted:u1:plumber").await.unwrap(), Some(vec![1.0, 0.0]));
    }

    #[tokio::test]
    async fn title_cache_can_be_disabled() {
        let embedder = Arc::new(ScriptedEmbedder::new().with("plumber", vec![1.0, 0.0]));
        let cache = Arc::new(InMemoryVectorCache::new());
        let config = CategorizeConfig {
            title_cache_enabled: false,
            ..CategorizeConfig::default()
        };
        let service = CategorizationService::new(embedder.clone(), two_category_index(), config)
            .with_title_cache(cache.clone());

        service.categorize(&[TitleQuery::new("u1", "plumber")], 1).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn slow_model_times_out_per_title() {
        let embedder = Arc::new(
            ScriptedEmbedder::new()
                .with("plumber", vec![1.0, 0.0])
                .with_delay(std::time::Duration::from_millis(200)),
        );
        let config = CategorizeConfig {
            embed_timeout_ms: 10,
            ..CategorizeConfig::default()
        };
        let service = CategorizationService::new(embedder, two_category_index(), config);

        let response = service.categorize(&[TitleQuery::new("u1", "plumber")], 1).await;
        assert!(matches!(
            response.results[0].outcome,
            TitleOutcome::Error(TitleError::Timeout(_))
        ));
    }
}
