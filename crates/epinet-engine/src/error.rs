//! Error types for the sweep runner binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and the sweep itself.

/// Top-level error for the sweep runner.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: epinet_core::config::ConfigError,
    },

    /// Dataset loading failed.
    #[error("dataset error: {source}")]
    Graph {
        /// The underlying graph error.
        #[from]
        source: epinet_graph::GraphError,
    },

    /// The sweep failed.
    #[error("driver error: {source}")]
    Driver {
        /// The underlying driver error.
        #[from]
        source: epinet_core::driver::DriverError,
    },

    /// Opening or saving the result store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: epinet_store::StoreError,
    },
}
