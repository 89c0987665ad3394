//! titlecat: categorize free-text job titles against a catalog of service types.
//!
//! Each service type has a precomputed embedding. A title is embedded with
//! the same model and ranked against the catalog by cosine similarity.
//!
//! The moving parts:
//!
//! - [`CatalogLoader`] fetches the authoritative service-type list from a
//!   [`CatalogSource`].
//! - [`RefreshCoordinator`] turns the catalog into an
//!   [`EmbeddingSnapshot`](index::EmbeddingSnapshot), reusing cached vectors
//!   where the description is unchanged, and swaps it into the
//!   [`EmbeddingIndex`](index::EmbeddingIndex).
//! - [`CategorizationService`] embeds incoming titles in one batch and asks
//!   the index for the top matches of each.
//!
//! Refresh and queries never block each other: queries clone the current
//! snapshot `Arc` and keep ranking against it while a refresh publishes the
//! next one.
//!
//! ```
//! use std::sync::Arc;
//! use titlecat::{CatalogEntry, StaticCatalog, Titlecat, TitleQuery, TitlecatConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut config = TitlecatConfig::default();
//! config.embedder.dimension = 32;
//!
//! let catalog = Arc::new(StaticCatalog::new(vec![
//!     CatalogEntry::new("plumbing", "plumber"),
//!     CatalogEntry::new("legal", "lawyer"),
//! ]));
//! let app = Titlecat::with_catalog(&config, catalog).await.unwrap();
//! app.refresh.refresh().await.unwrap();
//!
//! let response = app
//!     .categorize
//!     .categorize(&[TitleQuery::new("user-1", "plumber")], 1)
//!     .await;
//! assert_eq!(response.results.len(), 1);
//! # }
//! ```

pub mod catalog;
pub mod categorize;
pub mod config;
mod embedding;
pub mod error;
pub mod refresh;
pub mod testing;

use std::sync::Arc;

use embed::EmbedError;
use index::{CacheError, EmbeddingIndex, VectorCache};
use thiserror::Error;

pub use catalog::{CatalogEntry, CatalogLoader, CatalogSource, JsonFileCatalog, StaticCatalog};
pub use categorize::{
    CategorizationService, CategorizeResponse, TitleOutcome, TitleQuery, TitleResult,
};
pub use config::{
    CatalogConfig, CategorizeConfig, ConfigLoadError, IndexConfig, RefreshConfig, TitlecatConfig,
};
pub use error::{CatalogError, ErrorMarker, RefreshError, TitleError};
pub use refresh::{
    service_type_cache_key, RefreshCoordinator, RefreshOutcome, RefreshReport, RefreshState,
};

/// Failures wiring the components together at startup.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error("embedder: {0}")]
    Embedder(#[from] EmbedError),

    #[error("vector cache: {0}")]
    Cache(#[from] CacheError),
}

/// The assembled core: one index shared by the refresh writer and the query reader.
#[derive(Clone)]
pub struct Titlecat {
    pub index: Arc<EmbeddingIndex>,
    pub cache: Arc<dyn VectorCache>,
    pub refresh: Arc<RefreshCoordinator>,
    pub categorize: Arc<CategorizationService>,
}

impl Titlecat {
    /// Build everything from `config`, reading the catalog from `catalog.path`.
    ///
    /// Without a catalog path the catalog is empty and every refresh reports
    /// [`RefreshError::NothingResolved`].
    pub async fn from_config(config: &TitlecatConfig) -> Result<Self, InitError> {
        let source: Arc<dyn CatalogSource> = match &config.catalog.path {
            Some(path) => Arc::new(JsonFileCatalog::new(path)),
            None => {
                tracing::warn!("no catalog path configured; starting with an empty catalog");
                Arc::new(StaticCatalog::default())
            }
        };
        Self::with_catalog(config, source).await
    }

    /// Build everything from `config` around a caller-supplied catalog source.
    pub async fn with_catalog(
        config: &TitlecatConfig,
        source: Arc<dyn CatalogSource>,
    ) -> Result<Self, InitError> {
        config.validate()?;

        let embedder = config.embedder.clone().with_env_overrides().build()?;
        let cache = config.cache.build().await?;
        let index = Arc::new(match config.index.dimension {
            Some(dimension) => EmbeddingIndex::with_dimension(dimension),
            None => EmbeddingIndex::new(),
        });

        tracing::info!(
            model = embedder.model_name(),
            cache = cache.backend_name(),
            dimension = ?config.index.dimension,
            "titlecat core initialised"
        );

        let refresh = Arc::new(RefreshCoordinator::new(
            CatalogLoader::new(source),
            Arc::clone(&embedder),
            Arc::clone(&cache),
            Arc::clone(&index),
            config.refresh.clone(),
        ));
        let categorize = Arc::new(
            CategorizationService::new(embedder, Arc::clone(&index), config.categorize.clone())
                .with_title_cache(Arc::clone(&cache)),
        );

        Ok(Self {
            index,
            cache,
            refresh,
            categorize,
        })
    }
}
