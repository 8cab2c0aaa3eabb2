//! SI epidemic simulation on hiring networks.
//!
//! This crate owns the epidemic state machine that spreads an infection
//! across a [`HiringGraph`] one synchronous round at a time, the optional
//! random-jump extension that lets an infected node reach institutions it
//! has no directed path to, and the trial driver that sweeps a grid of
//! probabilities and starting nodes.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `epinet-config.yaml` into
//!   strongly-typed structs.
//! - [`driver`] -- [`ResultStore`] trait, [`MemoryStore`], and the
//!   parallel sweep runner.
//! - [`epidemic`] -- The SI state machine: seeding, rounds, termination.
//! - [`jump`] -- Random-jump parameters, eligibility, and target draws.
//!
//! [`HiringGraph`]: epinet_graph::HiringGraph
//! [`ResultStore`]: driver::ResultStore
//! [`MemoryStore`]: driver::MemoryStore

pub mod config;
pub mod driver;
pub mod epidemic;
pub mod jump;

pub use config::{ConfigError, ExperimentConfig};
pub use driver::{
    DriverError, MemoryStore, ResultStore, SweepParameter, SweepSummary, TrialPlan, run_sweep,
};
pub use epidemic::{Epidemic, EpidemicParams, RoundReport, SeedOutcome, SimulationOutcome};
pub use jump::RandomJump;
