//! Redis-backed vector cache.
//!
//! Entries are written with `SET EX` so Redis expires them natively; the
//! bincode envelope still carries the deadline so a value copied between
//! stores keeps its TTL semantics.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

use super::{CachedVector, VectorCache};
use crate::CacheError;

/// Shared-store [`VectorCache`] for deployments running several replicas.
#[derive(Clone)]
pub struct RedisVectorCache {
    redis: ConnectionManager,
}

impl RedisVectorCache {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`) and verify with `PING`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        tracing::info!(url, "connecting vector cache to redis");
        let client = Client::open(url).map_err(CacheError::backend)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(CacheError::backend)?;

        let mut conn = manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;

        Ok(Self::new(manager))
    }

    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

/// Redis `EX` seconds for `ttl`, or `None` when the entry never expires.
///
/// Redis expiry has whole-second resolution. Partial seconds round up so the
/// key never disappears before the envelope's own deadline.
fn expiry_seconds(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    Some(secs.max(1))
}

#[async_trait]
impl VectorCache for RedisVectorCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<f32>>, CacheError> {
        let mut conn = self.redis.clone();
        let bytes: Option<Vec<u8>> = conn.get(key).await.map_err(CacheError::backend)?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let entry = CachedVector::decode(&bytes)?;
        if entry.is_expired() {
            return Ok(None);
        }
        Ok(Some(entry.vector))
    }

    async fn put(&self, key: &str, vector: &[f32], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        let bytes = CachedVector::new(vector.to_vec(), ttl).encode()?;
        match expiry_seconds(ttl) {
            None => conn
                .set::<_, _, ()>(key, bytes)
                .await
                .map_err(CacheError::backend)?,
            Some(secs) => conn
                .set_ex::<_, _, ()>(key, bytes, secs)
                .await
                .map_err(CacheError::backend)?,
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
