//! Shared type definitions for the epinet simulator.
//!
//! This crate is the single source of truth for the value types that flow
//! between the graph model, the epidemic state machine, the trial driver and
//! the result store.
//!
//! # Modules
//!
//! - [`ids`] -- Node identifiers and run identifiers
//! - [`probability`] -- Validated probabilities and their fixed-point keys
//! - [`structs`] -- Trial keys, trial samples, and institution metadata

pub mod ids;
pub mod probability;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use ids::{NodeId, RunId};
pub use probability::{Probability, ProbabilityError, ProbabilityKey};
pub use structs::{InstitutionMeta, TrialKey, TrialSample};
