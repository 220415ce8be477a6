//! Document store abstraction
//!
//! The store owns the documents; this crate only reads snapshots and
//! forwards mutations. Implementations:
//! - HTTP client for the document backend
//! - In-memory store for local runs and tests

mod http;
mod memory;

pub use http::HttpDocumentStore;
pub use memory::MemoryDocumentStore;

use crate::config::{BackendConfig, BackendMode};
use crate::errors::Result;
use crate::models::{DocumentRecord, DocumentUpdate};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Trait for document persistence backends
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current snapshot of all documents, in store order
    async fn list(&self) -> Result<Vec<DocumentRecord>>;

    /// Fetch one document
    async fn get(&self, id: &str) -> Result<DocumentRecord>;

    /// Apply a partial update and return the stored record
    async fn update(&self, id: &str, update: &DocumentUpdate) -> Result<DocumentRecord>;

    /// Remove a document
    async fn delete(&self, id: &str) -> Result<()>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Short name for logs and readiness output
    fn name(&self) -> &str;
}

/// List payloads come either bare or wrapped in `documents`.
///
/// Entries are decoded one by one so a single bad entry cannot sink the
/// whole snapshot.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum DocumentListBody {
    Bare(Vec<serde_json::Value>),
    Wrapped { documents: Vec<serde_json::Value> },
}

impl DocumentListBody {
    pub(crate) fn into_documents(self) -> Vec<DocumentRecord> {
        let entries = match self {
            DocumentListBody::Bare(entries) | DocumentListBody::Wrapped { documents: entries } => {
                entries
            }
        };

        entries
            .into_iter()
            .enumerate()
            .filter_map(|(position, entry)| match serde_json::from_value(entry) {
                Ok(document) => Some(document),
                Err(e) => {
                    tracing::warn!(position, error = %e, "Skipping undecodable document entry");
                    None
                }
            })
            .collect()
    }
}

/// Single-document payloads come either bare or wrapped in `document`
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum DocumentBody {
    Wrapped { document: DocumentRecord },
    Bare(DocumentRecord),
}

impl DocumentBody {
    pub(crate) fn into_document(self) -> DocumentRecord {
        match self {
            DocumentBody::Wrapped { document } | DocumentBody::Bare(document) => document,
        }
    }
}

/// Create a document store based on configuration
pub fn create_store(config: &BackendConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.mode {
        BackendMode::Http => {
            if config.base_url.is_none() {
                tracing::warn!("Backend base URL not configured; document requests will fail with 503");
            }
            Ok(Arc::new(HttpDocumentStore::new(config)?))
        }
        BackendMode::Memory => {
            let store = match &config.seed_file {
                Some(path) => MemoryDocumentStore::from_seed_file(path)?,
                None => MemoryDocumentStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}
