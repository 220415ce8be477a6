//! Query result caching
//!
//! Provides:
//! - `QueryCache` trait keyed by query parameters, with explicit invalidation
//! - In-memory backend with TTL and entry bound
//! - Redis backend for shared deployments
//! - No-op backend when caching is disabled

mod memory;
mod redis_cache;

pub use memory::MemoryQueryCache;
pub use redis_cache::RedisQueryCache;

use crate::config::{CacheBackend, CacheSettings};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache for serialized query results
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Get a raw JSON value
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Store a raw JSON value for `ttl`
    async fn put_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove one key; returns whether it existed
    async fn invalidate(&self, key: &str) -> Result<bool>;

    /// Remove every key starting with `prefix`; returns the number removed
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize>;

    /// Check the cache is reachable
    async fn ping(&self) -> Result<()>;

    /// Short name for logs and metrics
    fn name(&self) -> &str;
}

impl dyn QueryCache {
    /// Get and deserialize a cached value
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| AppError::CacheError {
                    message: format!("Failed to parse cached value: {}", e),
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Serialize and store a value
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|e| AppError::CacheError {
            message: format!("Failed to serialize value: {}", e),
        })?;
        self.put_raw(key, json, ttl).await
    }
}

/// Cache that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopQueryCache;

#[async_trait]
impl QueryCache for NoopQueryCache {
    async fn get_raw(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn put_raw(&self, key: &str, _value: String, _ttl: Duration) -> Result<()> {
        debug!(key = %key, "Caching disabled, value dropped");
        Ok(())
    }

    async fn invalidate(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn invalidate_prefix(&self, _prefix: &str) -> Result<usize> {
        Ok(0)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Create a query cache based on configuration
pub async fn create_cache(settings: &CacheSettings) -> Result<Arc<dyn QueryCache>> {
    match settings.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryQueryCache::new(settings.max_entries))),
        CacheBackend::Redis => Ok(Arc::new(
            RedisQueryCache::connect(&settings.redis_url, &settings.key_prefix).await?,
        )),
        CacheBackend::None => Ok(Arc::new(NoopQueryCache)),
    }
}

/// Cache key builder helpers
pub mod keys {
    use chrono::NaiveDate;

    /// Namespace shared by every bucket query key
    pub const MSA_BUCKETS_PREFIX: &str = "msa-buckets:";

    /// Build a bucket query cache key.
    ///
    /// The date is part of the key because expiry counts depend on it.
    pub fn msa_buckets(threshold_days: i64, today: NaiveDate) -> String {
        format!("{}{}:{}", MSA_BUCKETS_PREFIX, threshold_days, today)
    }
}
