//! Redis query cache
//!
//! Shared cache for multi-instance gateways. Keys are namespaced with a
//! prefix; values are JSON strings stored with `SET EX`.

use super::QueryCache;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Redis-backed query cache
pub struct RedisQueryCache {
    connection: RwLock<MultiplexedConnection>,
    key_prefix: String,
}

impl RedisQueryCache {
    /// Connect to Redis
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        info!(prefix = %key_prefix, "Connected to Redis query cache");

        Ok(Self {
            connection: RwLock::new(connection),
            key_prefix: key_prefix.to_string(),
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        namespaced(&self.key_prefix, key)
    }
}

fn namespaced(prefix: &str, key: &str) -> String {
    format!("{}:{}", prefix, key)
}

#[async_trait]
impl QueryCache for RedisQueryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let value: Option<String> = conn.get(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to get key '{}': {}", full_key, e),
        })?;

        debug!(key = %full_key, hit = value.is_some(), "Cache lookup");
        Ok(value)
    }

    async fn put_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 {
            return Ok(());
        }

        let full_key = self.key(key);
        let mut conn = self.connection.write().await;
        conn.set_ex::<_, _, ()>(&full_key, value, ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs, "Cache set");
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let deleted: i64 = conn.del(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to delete key '{}': {}", full_key, e),
        })?;

        debug!(key = %full_key, deleted = deleted > 0, "Cache delete");
        Ok(deleted > 0)
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let pattern = format!("{}*", self.key(prefix));
        let mut conn = self.connection.write().await;

        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to scan '{}': {}", pattern, e),
            })?;

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: i64 = conn.del(&keys).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to delete keys for '{}': {}", pattern, e),
        })?;

        debug!(pattern = %pattern, deleted, "Cache prefix delete");
        Ok(deleted.max(0) as usize)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_keys() {
        assert_eq!(
            namespaced("msaboard", "msa-buckets:30:2025-06-01"),
            "msaboard:msa-buckets:30:2025-06-01"
        );
    }

    #[tokio::test]
    async fn test_invalid_url() {
        assert!(matches!(
            RedisQueryCache::connect("not-a-redis-url", "msaboard").await,
            Err(AppError::CacheError { .. })
        ));
    }
}
