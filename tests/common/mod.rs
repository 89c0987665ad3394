//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use index::{EmbeddingIndex, InMemoryVectorCache, VectorCache};
use titlecat::testing::ScriptedEmbedder;
use titlecat::{
    CatalogEntry, CatalogError, CatalogLoader, CatalogSource, RefreshConfig, RefreshCoordinator,
    RefreshOutcome, RefreshReport, StaticCatalog,
};

/// Catalog whose source can be switched to fail, and optionally made slow.
pub struct FlakyCatalog {
    inner: StaticCatalog,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl FlakyCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            inner: StaticCatalog::new(entries),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn replace(&self, entries: Vec<CatalogEntry>) {
        self.inner.replace(entries).unwrap();
    }
}

#[async_trait]
impl CatalogSource for FlakyCatalog {
    async fn list_service_types(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Source("catalog database unreachable".into()));
        }
        self.inner.list_service_types().await
    }
}

/// The two-category catalog: A = "plumbing" -> [1, 0], B = "legal" -> [0, 1].
pub fn ab_catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("A", "plumbing"),
        CatalogEntry::new("B", "legal"),
    ]
}

pub fn ab_embedder() -> ScriptedEmbedder {
    ScriptedEmbedder::new()
        .with("plumbing", vec![1.0, 0.0])
        .with("legal", vec![0.0, 1.0])
        .with("pipe fitter", vec![0.9, 0.1])
        .with("contract attorney", vec![0.1, 0.9])
}

pub struct Harness {
    pub catalog: Arc<FlakyCatalog>,
    pub embedder: Arc<ScriptedEmbedder>,
    pub cache: Arc<dyn VectorCache>,
    pub index: Arc<EmbeddingIndex>,
    pub coordinator: Arc<RefreshCoordinator>,
}

pub fn harness(catalog: FlakyCatalog, embedder: ScriptedEmbedder) -> Harness {
    harness_with(
        catalog,
        embedder,
        Arc::new(InMemoryVectorCache::new()),
        RefreshConfig::default(),
    )
}

pub fn harness_with(
    catalog: FlakyCatalog,
    embedder: ScriptedEmbedder,
    cache: Arc<dyn VectorCache>,
    config: RefreshConfig,
) -> Harness {
    let catalog = Arc::new(catalog);
    let embedder = Arc::new(embedder);
    let index = Arc::new(EmbeddingIndex::new());
    let coordinator = Arc::new(RefreshCoordinator::new(
        CatalogLoader::new(catalog.clone()),
        embedder.clone(),
        cache.clone(),
        index.clone(),
        config,
    ));
    Harness {
        catalog,
        embedder,
        cache,
        index,
        coordinator,
    }
}

pub fn expect_published(outcome: RefreshOutcome) -> RefreshReport {
    match outcome {
        RefreshOutcome::Published(report) => report,
        RefreshOutcome::Skipped => panic!("refresh unexpectedly skipped"),
    }
}
