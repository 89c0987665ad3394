//! Redb-backed vector cache.
//!
//! Redb is a pure Rust embedded key-value store with ACID transactions, so
//! cached embeddings survive restarts without an external service. Its
//! transactions are blocking; every call is moved onto the blocking pool.
//!
//! # Configuration Example
//! ```yaml
//! cache:
//!   backend: "redb"
//!   path: "/data/titlecat-cache.redb"
//! ```

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{CachedVector, VectorCache};
use crate::CacheError;

const VECTOR_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("titlecat_vectors");

/// Persistent [`VectorCache`] stored in a single redb file.
///
/// The `Arc<Database>` is cloned into each blocking task; redb handles its
/// own locking and MVCC.
#[derive(Clone)]
pub struct RedbVectorCache {
    db: Arc<Database>,
}

impl RedbVectorCache {
    /// Open or create the database at `path` and make sure the table exists.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || -> Result<Database, CacheError> {
            let db = Database::create(&path).map_err(CacheError::backend)?;
            let write_txn = db.begin_write().map_err(CacheError::backend)?;
            {
                // Opening the table inside a write txn creates it.
                let _table = write_txn
                    .open_table(VECTOR_TABLE)
                    .map_err(CacheError::backend)?;
            }
            write_txn.commit().map_err(CacheError::backend)?;
            Ok(db)
        })
        .await
        .map_err(CacheError::backend)??;

        tracing::debug!("redb vector cache ready");
        Ok(Self { db: Arc::new(db) })
    }

    fn read_raw(db: &Database, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let read_txn = db.begin_read().map_err(CacheError::backend)?;
        let table = read_txn
            .open_table(VECTOR_TABLE)
            .map_err(CacheError::backend)?;
        let value = table.get(key).map_err(CacheError::backend)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn write_raw(db: &Database, key: &str, value: Option<&[u8]>) -> Result<(), CacheError> {
        let write_txn = db.begin_write().map_err(CacheError::backend)?;
        {
            let mut table = write_txn
                .open_table(VECTOR_TABLE)
                .map_err(CacheError::backend)?;
            match value {
                Some(bytes) => {
                    table.insert(key, bytes).map_err(CacheError::backend)?;
                }
                None => {
                    table.remove(key).map_err(CacheError::backend)?;
                }
            }
        }
        write_txn.commit().map_err(CacheError::backend)?;
        Ok(())
    }
}

#[async_trait]
impl VectorCache for RedbVectorCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<f32>>, CacheError> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Vec<f32>>, CacheError> {
            let Some(bytes) = Self::read_raw(&db, &key)? else {
                return Ok(None);
            };
            let entry = CachedVector::decode(&bytes)?;
            if entry.is_expired() {
                Self::write_raw(&db, &key, None)?;
                return Ok(None);
            }
            Ok(Some(entry.vector))
        })
        .await
        .map_err(CacheError::backend)?
    }

    async fn put(&self, key: &str, vector: &[f32], ttl: Duration) -> Result<(), CacheError> {
        let bytes = CachedVector::new(vector.to_vec(), ttl).encode()?;
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::write_raw(&db, &key, Some(&bytes)))
            .await
            .map_err(CacheError::backend)?
    }

    fn backend_name(&self) -> &'static str {
        "redb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn redb_cache_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let cache = RedbVectorCache::open(temp_file.path()).await.unwrap();

        cache
            .put("category:plumbing:ab12", &[0.1, 0.2, 0.3], Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            cache.get("category:plumbing:ab12").await.unwrap(),
            Some(vec![0.1, 0.2, 0.3])
        );
        assert_eq!(cache.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn redb_cache_survives_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let cache = RedbVectorCache::open(temp_file.path()).await.unwrap();
            cache.put("k", &[1.0, 2.0], Duration::ZERO).await.unwrap();
        }

        let reopened = RedbVectorCache::open(temp_file.path()).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some(vec![1.0, 2.0]));
    }

    #[tokio::test]
    async fn redb_cache_drops_expired_entries() {
        let temp_file = NamedTempFile::new().unwrap();
        let cache = RedbVectorCache::open(temp_file.path()).await.unwrap();

        cache.put("k", &[1.0], Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(RedbVectorCache::read_raw(&cache.db, "k").unwrap(), None);
    }

    #[tokio::test]
    async fn redb_cache_overwrites() {
        let temp_file = NamedTempFile::new().unwrap();
        let cache = RedbVectorCache::open(temp_file.path()).await.unwrap();

        cache.put("k", &[1.0], Duration::ZERO).await.unwrap();
        cache.put("k", &[2.0], Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(vec![2.0]));
    }
}
