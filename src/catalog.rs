//! Service-type catalog: where the authoritative list of categories comes from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::CatalogError;

/// A service type as delivered by the catalog store, before embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub description: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// Backing store listing the current service types.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_service_types(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}

/// Catalog held in memory. [`replace`](Self::replace) swaps the contents,
/// which the next refresh picks up.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn replace(&self, entries: Vec<CatalogEntry>) -> Result<(), CatalogError> {
        *self
            .entries
            .write()
            .map_err(|_| CatalogError::Source("poisoned lock".into()))? = entries;
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn list_service_types(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.entries
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| CatalogError::Source("poisoned lock".into()))
    }
}

/// Catalog read from a JSON array of `{"id", "description"}` objects.
///
/// The file is re-read on every call so edits land on the next refresh.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalog {
    async fn list_service_types(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Fetches the catalog and drops entries that cannot become part of a snapshot.
#[derive(Clone)]
pub struct CatalogLoader {
    source: Arc<dyn CatalogSource>,
}

impl CatalogLoader {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source }
    }

    /// Load the current catalog.
    ///
    /// Duplicate ids keep their first occurrence; blank ids and blank
    /// descriptions are dropped. Every drop is logged. An empty result is
    /// not an error here.
    pub async fn load(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let raw = self.source.list_service_types().await?;
        let fetched = raw.len();

        let mut seen = HashSet::with_capacity(raw.len());
        let mut entries = Vec::with_capacity(raw.len());
        for entry in raw {
            if entry.id.trim().is_empty() {
                tracing::warn!(description = %entry.description, "dropping service type with blank id");
                continue;
            }
            if entry.description.trim().is_empty() {
                tracing::warn!(id = %entry.id, "dropping service type with blank description");
                continue;
            }
            if !seen.insert(entry.id.clone()) {
                tracing::warn!(id = %entry.id, "dropping duplicate service type id");
                continue;
            }
            entries.push(entry);
        }

        tracing::debug!(fetched, kept = entries.len(), "catalog loaded");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn loader(entries: Vec<CatalogEntry>) -> CatalogLoader {
        CatalogLoader::new(Arc::new(StaticCatalog::new(entries)))
    }

    #[tokio::test]
    async fn load_keeps_valid_entries_in_order() {
        let entries = loader(vec![
            CatalogEntry::new("plumbing", "pipes"),
            CatalogEntry::new("legal", "contracts"),
        ])
        .load()
        .await
        .unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["plumbing", "legal"]);
    }

    #[tokio::test]
    async fn load_drops_duplicates_and_blanks() {
        let entries = loader(vec![
            CatalogEntry::new("plumbing", "pipes"),
            CatalogEntry::new("plumbing", "drains"),
            CatalogEntry::new("legal", "   "),
            CatalogEntry::new("", "orphan"),
            CatalogEntry::new("cleaning", "homes"),
        ])
        .load()
        .await
        .unwrap();

        assert_eq!(
            entries,
            vec![
                CatalogEntry::new("plumbing", "pipes"),
                CatalogEntry::new("cleaning", "homes"),
            ]
        );
    }

    #[tokio::test]
    async fn empty_catalog_is_not_an_error() {
        assert!(loader(Vec::new()).load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn static_catalog_replace_is_visible() {
        let catalog = Arc::new(StaticCatalog::new(vec![CatalogEntry::new("a", "x")]));
        let loader = CatalogLoader::new(catalog.clone());
        catalog.replace(vec![CatalogEntry::new("b", "y")]).unwrap();
        assert_eq!(loader.load().await.unwrap()[0].id, "b");
    }

    #[tokio::test]
    async fn json_file_catalog_reads_entries() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "plumbing", "description": "pipes"}}, {{"id": "legal", "description": "law"}}]"#
        )
        .unwrap();

        let catalog = JsonFileCatalog::new(file.path());
        let entries = catalog.list_service_types().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], CatalogEntry::new("legal", "law"));
    }

    #[tokio::test]
    async fn json_file_catalog_errors() {
        let missing = JsonFileCatalog::new("/nonexistent/catalog.json");
        assert!(matches!(
            missing.list_service_types().await,
            Err(CatalogError::Io(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let broken = JsonFileCatalog::new(file.path());
        assert!(matches!(
            broken.list_service_types().await,
            Err(CatalogError::Parse(_))
        ));
    }
}
