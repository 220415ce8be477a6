//! API handlers module

pub mod buckets;
pub mod documents;
pub mod health;
