//! Error types for the `epinet-graph` crate.
//!
//! Graph construction fails fast: an edge naming a node the graph does not
//! contain, or a malformed dataset row, is reported immediately rather than
//! silently dropped.

use epinet_types::NodeId;

/// Errors that can occur while building or loading a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// An edge references a node that was never added.
    #[error("edge {source_node} -> {target_node} references unknown node {missing}")]
    UnknownNode {
        /// Edge source.
        source_node: NodeId,
        /// Edge target.
        target_node: NodeId,
        /// The endpoint that is not in the graph.
        missing: NodeId,
    },

    /// A node was added twice.
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// An edge weight is negative, NaN, or infinite.
    #[error("edge {source_node} -> {target_node} has invalid weight {weight}")]
    InvalidWeight {
        /// Edge source.
        source_node: NodeId,
        /// Edge target.
        target_node: NodeId,
        /// The rejected weight.
        weight: f64,
    },

    /// A dataset file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file that failed.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A dataset row could not be parsed.
    #[error("{file}:{line}: {reason}")]
    Parse {
        /// Which file the row came from.
        file: String,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the row.
        reason: String,
    },
}
