//! MSA bucketing engine
//!
//! Groups processed documents by their MSA number:
//! - One bucket per distinct MSA number, in first-appearance order
//! - Four partitions per bucket, chosen by document category
//! - Value totals per partition and agreement expiry
//!
//! Pure and total: no I/O, no errors, input is only borrowed.

mod expiry;

pub use expiry::{Expiry, ExpiryPolicy, DEFAULT_EXPIRY_THRESHOLD_DAYS};

use crate::models::{DocumentCategory, DocumentRecord, MsaBucket, MsaBucketResponse, DEFAULT_CURRENCY};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Builds bucket views from a document snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketEngine {
    expiry: ExpiryPolicy,
}

impl BucketEngine {
    pub fn new(expiry_threshold_days: i64) -> Self {
        Self {
            expiry: ExpiryPolicy::new(expiry_threshold_days),
        }
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        self.expiry
    }

    /// Group, partition and aggregate `documents` as of `today`
    pub fn bucket(&self, documents: &[DocumentRecord], today: NaiveDate) -> MsaBucketResponse {
        let mut buckets: Vec<MsaBucket> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut unlinked_documents = Vec::new();

        for doc in documents {
            let Some(key) = doc.msa_key() else {
                unlinked_documents.push(doc.clone());
                continue;
            };

            let slot = *index.entry(key).or_insert_with(|| {
                buckets.push(MsaBucket::new(key));
                buckets.len() - 1
            });
            let bucket = &mut buckets[slot];

            match doc.category {
                DocumentCategory::Agreement => bucket.msa_documents.push(doc.clone()),
                DocumentCategory::PurchaseOrder => bucket.po_documents.push(doc.clone()),
                DocumentCategory::Invoice => bucket.invoice_documents.push(doc.clone()),
                DocumentCategory::Other => bucket.other_documents.push(doc.clone()),
            }
        }

        for bucket in &mut buckets {
            self.finish(bucket, today);
        }

        MsaBucketResponse {
            buckets,
            unlinked_documents,
        }
    }

    /// Fill totals, expiry and display currency once partitions are complete
    fn finish(&self, bucket: &mut MsaBucket, today: NaiveDate) {
        bucket.total_msa_value = total_value(&bucket.msa_documents);
        bucket.total_po_value = total_value(&bucket.po_documents);
        bucket.total_invoice_value = total_value(&bucket.invoice_documents);

        let expiry = self.expiry.evaluate(&bucket.msa_documents, today);
        bucket.expires_on = expiry.expires_on;
        bucket.days_until_expiry = expiry.days_until_expiry;
        bucket.expiring_soon = expiry.expiring_soon;

        bucket.currency = display_currency(bucket).to_string();
    }
}

/// Nominal sum of amounts; currencies are not converted
pub fn total_value(documents: &[DocumentRecord]) -> f64 {
    documents.iter().map(|doc| doc.amount).sum()
}

/// Currency of the first agreement, else the first PO, else USD
pub fn display_currency(bucket: &MsaBucket) -> &str {
    bucket
        .msa_documents
        .first()
        .or_else(|| bucket.po_documents.first())
        .map(DocumentRecord::currency_or_default)
        .unwrap_or(DEFAULT_CURRENCY)
}
