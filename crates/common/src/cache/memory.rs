//! In-process query cache

use super::QueryCache;
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

struct CachedEntry {
    value: String,
    expires_at: Instant,
}

/// Bounded TTL cache held in memory
pub struct MemoryQueryCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
    max_entries: usize,
}

impl MemoryQueryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    pub fn enabled(&self) -> bool {
        self.max_entries > 0
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl QueryCache for MemoryQueryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        if !self.enabled() {
            return Ok(None);
        }

        let now = Instant::now();
        let entries = self.entries.read().await;
        let value = entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone());

        debug!(key = %key, hit = value.is_some(), "Cache lookup");
        Ok(value)
    }

    async fn put_raw(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        if !self.enabled() || ttl.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        let mut entries = self.entries.write().await;

        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            CachedEntry {
                value,
                expires_at: now + ttl,
            },
        );

        // Over the bound: drop the entries closest to expiry, never the new one
        if entries.len() > self.max_entries {
            let mut by_expiry: Vec<(Instant, String)> = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, entry)| (entry.expires_at, k.clone()))
                .collect();
            by_expiry.sort();

            let overflow = entries.len() - self.max_entries;
            for (_, k) in by_expiry.into_iter().take(overflow) {
                entries.remove(&k);
            }
        }

        debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache set");
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
