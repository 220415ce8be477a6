//! Bucket service
//!
//! Ties the document store, the query cache and the bucketing engine
//! together. Reads go through the cache; mutations go to the store and
//! then invalidate every cached bucket view.

use crate::buckets::BucketEngine;
use crate::cache::{keys, QueryCache};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{DocumentRecord, DocumentUpdate, MsaBucketResponse};
use crate::store::DocumentStore;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Largest threshold a caller may ask for (ten years)
pub const MAX_EXPIRY_THRESHOLD_DAYS: i64 = 3650;

/// Parameters of a bucket query
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BucketQuery {
    /// Override of the configured expiry window
    pub expiring_within_days: Option<i64>,
}

/// Bucket queries and document mutations
#[derive(Clone)]
pub struct BucketService {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn QueryCache>,
    engine: BucketEngine,
    cache_ttl: Duration,
    /// Bumped by every mutation; a build that saw an older value is not cached
    generation: Arc<AtomicU64>,
}

impl BucketService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn QueryCache>,
        engine: BucketEngine,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            engine,
            cache_ttl,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    /// Bucket the current document set as of today (UTC)
    pub async fn msa_buckets(&self, query: BucketQuery) -> Result<MsaBucketResponse> {
        self.msa_buckets_on(query, Utc::now().date_naive()).await
    }

    /// Bucket the current document set as of `today`
    pub async fn msa_buckets_on(
        &self,
        query: BucketQuery,
        today: NaiveDate,
    ) -> Result<MsaBucketResponse> {
        let engine = self.engine_for(query)?;
        let threshold = engine.expiry_policy().threshold_days;
        let key = keys::msa_buckets(threshold, today);

        match self.cache.get_json::<MsaBucketResponse>(&key).await {
            Ok(Some(cached)) => {
                metrics::record_cache(true, self.cache.name());
                debug!(key = %key, "Serving cached MSA buckets");
                return Ok(cached);
            }
            Ok(None) => metrics::record_cache(false, self.cache.name()),
            Err(e) => {
                metrics::record_cache(false, self.cache.name());
                warn!(error = %e, key = %key, "Cache read failed, rebuilding buckets");
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let documents = self.store.list().await?;

        let start = Instant::now();
        let response = engine.bucket(&documents, today);
        metrics::record_bucket_build(
            start.elapsed().as_secs_f64(),
            response.buckets.len(),
            response.unlinked_documents.len(),
            response.expiring_soon().count(),
        );

        info!(
            documents = documents.len(),
            buckets = response.buckets.len(),
            unlinked = response.unlinked_documents.len(),
            threshold_days = threshold,
            "MSA buckets built"
        );

        self.store_if_current(&key, &response, generation).await;
        Ok(response)
    }

    /// All documents, in store order
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        self.store.list().await
    }

    pub async fn get_document(&self, id: &str) -> Result<DocumentRecord> {
        let id = require_id(id)?;
        self.store.get(id).await
    }

    /// Tag a document with an MSA number.
    ///
    /// Blank input is rejected before the store is contacted.
    pub async fn tag_document(&self, id: &str, msa_number: &str) -> Result<DocumentRecord> {
        let id = require_id(id)?;
        let msa_number = msa_number.trim();
        if msa_number.is_empty() {
            return Err(AppError::invalid_field(
                "msa_number",
                "Please enter an MSA number (e.g., MSA-2025-001)",
            ));
        }

        let document = self
            .store
            .update(id, &DocumentUpdate::tag_msa(msa_number))
            .await?;

        info!(
            document_id = %id,
            reference = %document.display_reference(),
            msa_number = %msa_number,
            "Document tagged with MSA number"
        );
        self.invalidate_buckets().await;
        Ok(document)
    }

    /// Delete a document from the store
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let id = require_id(id)?;
        self.store.delete(id).await?;

        info!(document_id = %id, "Document deleted");
        self.invalidate_buckets().await;
        Ok(())
    }

    /// Cache a built view unless a mutation landed while it was built
    async fn store_if_current(&self, key: &str, response: &MsaBucketResponse, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(key = %key, "Documents changed during build, not caching");
            return;
        }

        if let Err(e) = self.cache.put_json(key, response, self.cache_ttl).await {
            warn!(error = %e, "Failed to cache buckets, continuing without cache");
            return;
        }

        // A mutation between the check and the write has already run its
        // invalidation, so drop the entry here instead
        if self.generation.load(Ordering::SeqCst) != generation {
            if let Err(e) = self.cache.invalidate(key).await {
                warn!(error = %e, key = %key, "Failed to drop stale bucket entry");
            }
        }
    }

    /// Drop every cached bucket view; failures are logged, not returned
    pub async fn invalidate_buckets(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.cache.invalidate_prefix(keys::MSA_BUCKETS_PREFIX).await {
            Ok(removed) => {
                metrics::record_invalidation(removed, self.cache.name());
                debug!(removed, "Bucket cache invalidated");
            }
            Err(e) => warn!(error = %e, "Failed to invalidate bucket cache"),
        }
    }

    fn engine_for(&self, query: BucketQuery) -> Result<BucketEngine> {
        match query.expiring_within_days {
            None => Ok(self.engine),
            Some(days) if (0..=MAX_EXPIRY_THRESHOLD_DAYS).contains(&days) => {
                Ok(BucketEngine::new(days))
            }
            Some(days) => Err(AppError::invalid_field(
                "expiring_within_days",
                format!(
                    "expiring_within_days must be between 0 and {}, got {}",
                    MAX_EXPIRY_THRESHOLD_DAYS, days
                ),
            )),
        }
    }
}

fn require_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::MissingField {
            field: "id".to_string(),
        });
    }
    Ok(id)
}
