//! Sweep runner binary for epinet.
//!
//! Loads a hiring network, runs the configured probability sweep over every
//! institution as a starting node, and appends the samples to a cumulative
//! JSON result store.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `epinet-config.yaml` (or `EPINET_CONFIG`)
//! 3. Load the dataset and pick the graph variant
//! 4. Open the result store and report what it already holds
//! 5. Build the trial plan and run the sweep
//! 6. Record the run and save the store

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use epinet_core::config::ExperimentConfig;
use epinet_core::driver::run_sweep;
use epinet_graph::load_dataset;
use epinet_store::{JsonFileStore, RunRecord};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "epinet-config.yaml";

/// Application entry point for the sweep runner.
///
/// # Errors
///
/// Returns an error if any initialization step or the sweep itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("epinet-engine starting");
    run().await?;
    info!("epinet-engine shutdown complete");
    Ok(())
}

async fn run() -> Result<(), EngineError> {
    // 2. Load configuration.
    let config = load_config(&config_path(|name| std::env::var(name).ok()))?;
    info!(
        parameter = %config.sweep.parameter,
        trials = config.run.trials,
        seed = config.run.seed,
        max_workers = config.run.max_workers,
        weighted = config.dataset.weighted,
        store = %config.store.path.display(),
        "Configuration loaded"
    );

    // 3. Load the dataset.
    let dataset = load_dataset(&config.dataset_paths())?;
    let start_nodes = dataset.start_nodes();
    let graph = Arc::new(if config.dataset.weighted {
        dataset.weighted
    } else {
        dataset.unweighted
    });

    // 4. Open the result store.
    let mut store = JsonFileStore::open(&config.store.path)?;
    info!(
        trials_recorded = store.trials_recorded(),
        samples_total = store.samples_total(),
        "Existing results"
    );

    // 5. Run the sweep.
    let plan = config.trial_plan(start_nodes)?;
    let started_at = Utc::now();
    let summary = run_sweep(graph, &plan, &mut store).await?;

    // 6. Record and persist.
    store.record_run(RunRecord::from_summary(
        started_at,
        plan.parameter,
        plan.trials,
        &summary,
    ));
    store.save()?;

    info!(
        samples_appended = summary.samples_appended,
        timed_out = summary.timed_out,
        trials_recorded = store.trials_recorded(),
        samples_total = store.samples_total(),
        "Results saved"
    );
    Ok(())
}

/// Resolve the configuration path from `EPINET_CONFIG`, falling back to
/// [`DEFAULT_CONFIG_PATH`].
fn config_path<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("EPINET_CONFIG").map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load the experiment configuration.
///
/// A missing file falls back to defaults, with environment overrides still
/// applied.
fn load_config(path: &Path) -> Result<ExperimentConfig, EngineError> {
    if path.exists() {
        Ok(ExperimentConfig::from_file(path)?)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        let mut config = ExperimentConfig::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }
}
