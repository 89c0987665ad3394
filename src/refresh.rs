//! Catalog-to-snapshot refresh.
//!
//! One refresh walks `Idle -> Loading -> Resolving -> Swapping -> Idle`.
//! A failure in `Loading` or `Resolving` passes through `Failed` and back to
//! `Idle` with the previous snapshot untouched. The swap is the last,
//! synchronous step, so a refresh cut short by its time budget never
//! publishes anything.

use embed::Embedder;
use index::{is_degenerate, EmbeddingIndex, EmbeddingSnapshot, ServiceType, VectorCache};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::catalog::{CatalogEntry, CatalogLoader};
use crate::config::RefreshConfig;
use crate::embedding::embed_with_fallback;
use crate::RefreshError;

/// Where a refresh currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RefreshState {
    Idle = 0,
    Loading = 1,
    Resolving = 2,
    Swapping = 3,
    Failed = 4,
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RefreshState::Loading,
            2 => RefreshState::Resolving,
            3 => RefreshState::Swapping,
            4 => RefreshState::Failed,
            _ => RefreshState::Idle,
        }
    }
}

/// Summary of a published refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    /// Version of the snapshot this refresh published.
    pub version: u64,
    pub entries: usize,
    pub cache_hits: usize,
    pub recomputed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Published(RefreshReport),
    /// Another refresh was already running; nothing was done.
    Skipped,
}

/// Cache key for a service type's vector under `model`.
///
/// Includes the model name and a digest of the description, so switching
/// models or editing a description makes the old vector unreachable and
/// forces a recompute.
pub fn service_type_cache_key(model: &str, entry: &CatalogEntry) -> String {
    let digest = Sha256::digest(entry.description.as_bytes());
    format!("category:{model}:{}:{}", entry.id, &hex::encode(digest)[..16])
}

/// Clears the in-flight flag and resets the state when a refresh ends, however it ends.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    state: &'a AtomicU8,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool, state: &'a AtomicU8) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, state })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.store(RefreshState::Idle as u8, Ordering::Release);
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct Resolved {
    service_types: Vec<ServiceType>,
    cache_hits: usize,
    recomputed: usize,
    skipped: usize,
}

/// Sole writer of the [`EmbeddingIndex`] snapshot.
pub struct RefreshCoordinator {
    loader: CatalogLoader,
    embedder: Arc<dyn Embedder>,
    cache: Arc<dyn VectorCache>,
    index: Arc<EmbeddingIndex>,
    config: RefreshConfig,
    in_progress: AtomicBool,
    state: AtomicU8,
    last_report: RwLock<Option<RefreshReport>>,
    last_error: RwLock<Option<String>>,
}

impl RefreshCoordinator {
    pub fn new(
        loader: CatalogLoader,
        embedder: Arc<dyn Embedder>,
        cache: Arc<dyn VectorCache>,
        index: Arc<EmbeddingIndex>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            loader,
            embedder,
            cache,
            index,
            config,
            in_progress: AtomicBool::new(false),
            state: AtomicU8::new(RefreshState::Idle as u8),
            last_report: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Report of the most recent published refresh.
    pub fn last_report(&self) -> Option<RefreshReport> {
        self.last_report.read().ok().and_then(|guard| guard.clone())
    }

    /// Message of the most recent failed refresh, cleared by the next success.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().ok().and_then(|guard| guard.clone())
    }

    /// Rebuild the snapshot from the catalog and publish it.
    ///
    /// Returns [`RefreshOutcome::Skipped`] without doing anything if another
    /// refresh is in flight. On error the previous snapshot stays active.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let Some(_guard) = InFlight::acquire(&self.in_progress, &self.state) else {
            tracing::info!("refresh already in progress; skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        let started = Instant::now();
        let budget = self.config.timeout();
        let result = match tokio::time::timeout(budget, self.run(started)).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::Timeout(budget)),
        };

        match result {
            Ok(report) => {
                tracing::info!(
                    version = report.version,
                    entries = report.entries,
                    cache_hits = report.cache_hits,
                    recomputed = report.recomputed,
                    skipped = report.skipped,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "snapshot refreshed"
                );
                if let Ok(mut slot) = self.last_report.write() {
                    *slot = Some(report.clone());
                }
                if let Ok(mut slot) = self.last_error.write() {
                    *slot = None;
                }
                Ok(RefreshOutcome::Published(report))
            }
            Err(error) => {
                self.set_state(RefreshState::Failed);
                tracing::warn!(
                    %error,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "refresh failed; keeping previous snapshot"
                );
                if let Ok(mut slot) = self.last_error.write() {
                    *slot = Some(error.to_string());
                }
                Err(error)
            }
        }
    }

    async fn run(&self, started: Instant) -> Result<RefreshReport, RefreshError> {
        self.set_state(RefreshState::Loading);
        let catalog = self.loader.load().await?;

        self.set_state(RefreshState::Resolving);
        let resolved = self.resolve(&catalog).await;
        if resolved.service_types.is_empty() {
            return Err(RefreshError::NothingResolved {
                skipped: resolved.skipped,
            });
        }

        // No await past this point: build and publish happen in one poll.
        self.set_state(RefreshState::Swapping);
        let snapshot = EmbeddingSnapshot::build(resolved.service_types)?;
        let published = self.index.publish(snapshot)?;

        Ok(RefreshReport {
            version: published.version(),
            entries: published.len(),
            cache_hits: resolved.cache_hits,
            recomputed: resolved.recomputed,
            skipped: resolved.skipped,
            elapsed: started.elapsed(),
        })
    }

    /// Find a vector for every catalog entry: cache first, then the model.
    async fn resolve(&self, catalog: &[CatalogEntry]) -> Resolved {
        let model = self.embedder.model_name();
        let keys: Vec<String> = catalog
            .iter()
            .map(|entry| service_type_cache_key(model, entry))
            .collect();
        let mut dimension = self.index.dimension();
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; catalog.len()];
        let mut out = Resolved::default();

        let mut misses = Vec::new();
        for (idx, key) in keys.iter().enumerate() {
            match self.cache.get(key).await {
                Ok(Some(vector)) if dimension.is_none_or(|d| d == vector.len()) => {
                    dimension.get_or_insert(vector.len());
                    slots[idx] = Some(vector);
                    out.cache_hits += 1;
                }
                Ok(Some(vector)) => {
                    tracing::debug!(key = %key, len = vector.len(), "cached vector has stale dimension");
                    misses.push(idx);
                }
                Ok(None) => misses.push(idx),
                Err(error) => {
                    tracing::warn!(
                        key = %key,
                        backend = self.cache.backend_name(),
                        %error,
                        "cache read failed; recomputing"
                    );
                    misses.push(idx);
                }
            }
        }

        if !misses.is_empty() {
            let texts: Vec<String> = misses
                .iter()
                .map(|&idx| catalog[idx].description.clone())
                .collect();
            let results = embed_with_fallback(
                self.embedder.as_ref(),
                &texts,
                None,
                self.config.embed_concurrency,
            )
            .await;

            let ttl = self.config.cache_ttl();
            for (&idx, result) in misses.iter().zip(results) {
                let entry = &catalog[idx];
                match result {
                    Ok(vector) => {
                        if let Err(error) = self.cache.put(&keys[idx], &vector, ttl).await {
                            tracing::warn!(id = %entry.id, %error, "cache write failed");
                        }
                        slots[idx] = Some(vector);
                        out.recomputed += 1;
                    }
                    Err(error) => {
                        tracing::warn!(id = %entry.id, %error, "embedding failed; skipping service type");
                    }
                }
            }
        }

        for (entry, slot) in catalog.iter().zip(slots) {
            let Some(vector) = slot else {
                out.skipped += 1;
                continue;
            };
            let expected = *dimension.get_or_insert(vector.len());
            if vector.len() != expected {
                tracing::warn!(
                    id = %entry.id,
                    expected,
                    actual = vector.len(),
                    "dimension mismatch; skipping service type"
                );
                out.skipped += 1;
                continue;
            }
            if is_degenerate(&vector) {
                tracing::warn!(id = %entry.id, "zero-norm embedding; skipping service type");
                out.skipped += 1;
                continue;
            }
            out.service_types.push(ServiceType {
                id: entry.id.clone(),
                description: entry.description.clone(),
                embedding: vector,
            });
        }

        out
    }

    fn set_state(&self, state: RefreshState) {
        self.state.store(state as u8, Ordering::Release);
    }
}
