//! Aggregated MSA bucket view

use super::document::{DocumentRecord, DEFAULT_CURRENCY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All documents sharing one MSA number, with totals and expiry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MsaBucket {
    pub msa_number: String,

    pub msa_documents: Vec<DocumentRecord>,
    pub po_documents: Vec<DocumentRecord>,
    pub invoice_documents: Vec<DocumentRecord>,
    pub other_documents: Vec<DocumentRecord>,

    pub total_msa_value: f64,
    pub total_po_value: f64,
    pub total_invoice_value: f64,

    pub expires_on: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub expiring_soon: bool,

    /// Display currency for the totals; never used for conversion
    pub currency: String,
}

impl MsaBucket {
    /// Empty bucket for a key
    pub fn new(msa_number: impl Into<String>) -> Self {
        Self {
            msa_number: msa_number.into(),
            msa_documents: Vec::new(),
            po_documents: Vec::new(),
            invoice_documents: Vec::new(),
            other_documents: Vec::new(),
            total_msa_value: 0.0,
            total_po_value: 0.0,
            total_invoice_value: 0.0,
            expires_on: None,
            days_until_expiry: None,
            expiring_soon: false,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Number of documents across all four partitions
    pub fn document_count(&self) -> usize {
        self.msa_documents.len()
            + self.po_documents.len()
            + self.invoice_documents.len()
            + self.other_documents.len()
    }

    /// Iterate every document in the bucket, partition by partition
    pub fn documents(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.msa_documents
            .iter()
            .chain(&self.po_documents)
            .chain(&self.invoice_documents)
            .chain(&self.other_documents)
    }
}

/// Result of a bucket query
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MsaBucketResponse {
    pub buckets: Vec<MsaBucket>,
    pub unlinked_documents: Vec<DocumentRecord>,
}

impl MsaBucketResponse {
    /// Documents in buckets plus unlinked documents
    pub fn document_count(&self) -> usize {
        self.buckets.iter().map(MsaBucket::document_count).sum::<usize>()
            + self.unlinked_documents.len()
    }

    pub fn bucket(&self, msa_number: &str) -> Option<&MsaBucket> {
        self.buckets.iter().find(|b| b.msa_number == msa_number)
    }

    pub fn expiring_soon(&self) -> impl Iterator<Item = &MsaBucket> {
        self.buckets.iter().filter(|b| b.expiring_soon)
    }
}
