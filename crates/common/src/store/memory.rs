//! In-process document store

use super::{DocumentListBody, DocumentStore};
use crate::errors::{AppError, Result};
use crate::models::{DocumentRecord, DocumentUpdate};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Ordered document store held in memory
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<Vec<DocumentRecord>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<DocumentRecord>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Load documents from a JSON file (bare array or `{ "documents": [...] }`)
    pub fn from_seed_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::Configuration {
            message: format!("Failed to read seed file '{}': {}", path, e),
        })?;
        let documents = serde_json::from_str::<DocumentListBody>(&raw)?.into_documents();
        info!(path = %path, count = documents.len(), "Seeded in-memory document store");
        Ok(Self::with_documents(documents))
    }

    /// Insert or replace a document, keeping its position when replaced
    pub async fn upsert(&self, document: DocumentRecord) {
        let mut documents = self.documents.write().await;
        match documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        Ok(self.documents.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<DocumentRecord> {
        self.documents
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })
    }

    async fn update(&self, id: &str, update: &DocumentUpdate) -> Result<DocumentRecord> {
        let mut documents = self.documents.write().await;
        let document = documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?;

        update.apply_to(document);
        debug!(document_id = %id, "Document updated in memory");
        Ok(document.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut documents = self.documents.write().await;
        let position = documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?;

        documents.remove(position);
        debug!(document_id = %id, "Document deleted from memory");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentCategory;
    use tokio_test::{assert_err, assert_ok};

    fn seeded() -> MemoryDocumentStore {
        MemoryDocumentStore::with_documents(vec![
            DocumentRecord::new("a", DocumentCategory::Agreement),
            DocumentRecord::new("b", DocumentCategory::Invoice),
            DocumentRecord::new("c", DocumentCategory::PurchaseOrder),
        ])
    }

    #[tokio::test]
    async fn test_list_keeps_order() {
        let ids: Vec<String> = seeded().list().await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_update_and_get() {
        let store = seeded();
        let updated = store.update("b", &DocumentUpdate::tag_msa("MSA-1")).await.unwrap();
        assert_eq!(updated.msa_number.as_deref(), Some("MSA-1"));
        assert_eq!(store.get("b").await.unwrap().msa_number.as_deref(), Some("MSA-1"));
    }

    #[tokio::test]
    async fn test_missing_document() {
        let store = seeded();
        assert!(matches!(
            store.update("zz", &DocumentUpdate::tag_msa("MSA-1")).await,
            Err(AppError::DocumentNotFound { .. })
        ));
        assert_err!(store.get("zz").await);
        assert_err!(store.delete("zz").await);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = seeded();
        assert_ok!(store.delete("b").await);
        assert_eq!(store.len().await, 2);
        assert_err!(store.get("b").await);
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let store = seeded();
        store
            .upsert(DocumentRecord::new("b", DocumentCategory::Other).with_amount(9.0))
            .await;
        store.upsert(DocumentRecord::new("d", DocumentCategory::Other)).await;

        let docs = store.list().await.unwrap();
        assert_eq!(docs[1].category, DocumentCategory::Other);
        assert_eq!(docs[1].amount, 9.0);
        assert_eq!(docs[3].id, "d");
    }

    #[test]
    fn test_missing_seed_file() {
        assert!(matches!(
            MemoryDocumentStore::from_seed_file("/nonexistent/seed.json"),
            Err(AppError::Configuration { .. })
        ));
    }
}
