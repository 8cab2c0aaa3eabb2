//! Hiring-network graph model for the epinet simulator.
//!
//! Institutions are nodes; a directed edge `u -> v` records that a faculty
//! member trained at `u` was hired by `v`. Edges may carry a weight that
//! scales the transmission probability along that edge.
//!
//! # Modules
//!
//! - [`error`] -- Error types for graph construction and dataset loading.
//! - [`hiring_graph`] -- [`HiringGraph`], an immutable directed multigraph
//!   with a precomputed descendant (reachability) index, and its builder.
//! - [`loader`] -- Tab-delimited vertex/edge list import producing the
//!   unweighted and weighted graph variants plus institution metadata.

pub mod error;
pub mod hiring_graph;
pub mod loader;

// Re-export primary types at crate root.
pub use error::GraphError;
pub use hiring_graph::{Edge, HiringGraph, HiringGraphBuilder};
pub use loader::{Dataset, DatasetPaths, load_dataset, parse_dataset};
