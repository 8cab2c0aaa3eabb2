//! Error types for the result store.

use epinet_types::{NodeId, ProbabilityKey};

/// Errors that can occur while reading or writing a result store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing, or renaming the store file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The `size` and `length` tables disagree for one key.
    #[error("store is inconsistent at p={probability}, node={node}: {sizes} sizes but {lengths} lengths")]
    Inconsistent {
        /// Probability of the offending key.
        probability: ProbabilityKey,
        /// Node of the offending key.
        node: NodeId,
        /// Samples in the `size` table.
        sizes: usize,
        /// Samples in the `length` table.
        lengths: usize,
    },
}
