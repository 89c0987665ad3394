//! Advisory persistence for embedding vectors.
//!
//! A cache hit saves one model call; a miss, an expired entry or a backend
//! error all mean "recompute". Nothing here decides which service types
//! exist.

#[cfg(feature = "backend-redb")]
pub mod redb;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::CacheError;

/// Key-value store mapping a cache key to an embedding vector.
#[async_trait]
pub trait VectorCache: Send + Sync {
    /// Fetch a live entry. Expired entries are reported as misses.
    async fn get(&self, key: &str) -> Result<Option<Vec<f32>>, CacheError>;

    /// Store `vector` under `key` for `ttl`. A zero `ttl` never expires.
    async fn put(&self, key: &str, vector: &[f32], ttl: Duration) -> Result<(), CacheError>;

    /// Short backend label for logs.
    fn backend_name(&self) -> &'static str;
}

/// On-disk envelope for a cached vector.
///
/// `expires_at_ms` is a Unix timestamp in milliseconds; `0` means no expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedVector {
    pub expires_at_ms: u64,
    pub vector: Vec<f32>,
}

impl CachedVector {
    pub fn new(vector: Vec<f32>, ttl: Duration) -> Self {
        let expires_at_ms = if ttl.is_zero() {
            0
        } else {
            now_ms().saturating_add(ttl.as_millis() as u64)
        };
        Self {
            expires_at_ms,
            vector,
        }
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at_ms != 0 && now_ms >= self.expires_at_ms
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }

    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        Ok(encode_to_vec(self, standard())?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        let (value, _) = decode_from_slice(bytes, standard())?;
        Ok(value)
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Selects and builds a [`VectorCache`] backend.
///
/// # Example
/// ```
/// use index::CacheBackendConfig;
///
/// // In-memory (for testing)
/// let config = CacheBackendConfig::in_memory();
///
/// // Redb (persistent, survives restarts)
/// let config = CacheBackendConfig::redb("/data/titlecat-cache.redb");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CacheBackendConfig {
    #[default]
    InMemory,
    /// Redb file at `path`. Requires the `backend-redb` feature.
    Redb { path: String },
    /// Redis at `url`, e.g. `redis://127.0.0.1:6379`. Requires the `redis` feature.
    Redis { url: String },
}

impl CacheBackendConfig {
    pub fn in_memory() -> Self {
        CacheBackendConfig::InMemory
    }

    pub fn redb<P: Into<String>>(path: P) -> Self {
        CacheBackendConfig::Redb { path: path.into() }
    }

    pub fn redis<U: Into<String>>(url: U) -> Self {
        CacheBackendConfig::Redis { url: url.into() }
    }

    /// Build the configured backend.
    ///
    /// Backends compiled out by feature flags are reported as
    /// [`CacheError::Backend`].
    pub async fn build(&self) -> Result<Arc<dyn VectorCache>, CacheError> {
        match self {
            CacheBackendConfig::InMemory => Ok(Arc::new(InMemoryVectorCache::new())),
            CacheBackendConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Arc::new(self::redb::RedbVectorCache::open(path).await?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(CacheError::backend("redb backend disabled at compile time"))
                }
            }
            CacheBackendConfig::Redis { url } => {
                #[cfg(feature = "redis")]
                {
                    Ok(Arc::new(self::redis::RedisVectorCache::connect(url).await?))
                }
                #[cfg(not(feature = "redis"))]
                {
                    let _ = url;
                    Err(CacheError::backend("redis backend disabled at compile time"))
                }
            }
        }
    }
}

/// In-process cache using a `RwLock` around a `HashMap` of encoded entries.
#[derive(Default)]
pub struct InMemoryVectorCache {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryVectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.records.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorCache for InMemoryVectorCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<f32>>, CacheError> {
        let bytes = {
            let guard = self
                .records
                .read()
                .map_err(|_| CacheError::backend("poisoned lock"))?;
            match guard.get(key) {
                Some(bytes) => bytes.clone(),
                None => return Ok(None),
            }
        };

        let entry = CachedVector::decode(&bytes)?;
        if entry.is_expired() {
            self.records
                .write()
                .map_err(|_| CacheError::backend("poisoned lock"))?
                .remove(key);
            return Ok(None);
        }
        Ok(Some(entry.vector))
    }

    async fn put(&self, key: &str, vector: &[f32], ttl: Duration) -> Result<(), CacheError> {
        let bytes = CachedVector::new(vector.to_vec(), ttl).encode()?;
        self.records
            .write()
            .map_err(|_| CacheError::backend("poisoned lock"))?
            .insert(key.to_string(), bytes);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
