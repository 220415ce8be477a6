//! MSA Board Common Library
//!
//! Shared code for the MSA Board services including:
//! - Document and bucket models
//! - The MSA bucketing engine
//! - Document store abstraction (HTTP backend, in-memory)
//! - Query result caching with explicit invalidation
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod buckets;
pub mod cache;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use buckets::BucketEngine;
pub use cache::QueryCache;
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use service::{BucketQuery, BucketService};
pub use store::DocumentStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
