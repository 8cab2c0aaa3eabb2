//! Persistent result store for epinet sweeps.
//!
//! Samples accumulate in a single JSON file keyed by probability and
//! starting node. Every sweep appends to what is already there, so the
//! file grows across invocations and can be aggregated later.
//!
//! # Modules
//!
//! - [`json_store`] -- [`JsonFileStore`] and the [`RunRecord`] audit trail
//! - [`error`] -- Shared error types

pub mod error;
pub mod json_store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use json_store::{JsonFileStore, RunRecord};
