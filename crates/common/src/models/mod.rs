//! Domain models
//!
//! Documents as delivered by the backend store, and the bucket view
//! derived from them.

mod bucket;
mod document;

pub use bucket::{MsaBucket, MsaBucketResponse};
pub use document::{
    parse_timestamp, DocumentCategory, DocumentRecord, DocumentUpdate, DEFAULT_CURRENCY,
};
