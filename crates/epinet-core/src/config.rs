//! Configuration loading and typed config structures for epinet sweeps.
//!
//! The canonical configuration lives in `epinet-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads the file and applies
//! environment overrides. Probabilities stay raw `f64` here and are
//! validated when the config is turned into a [`TrialPlan`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use epinet_graph::DatasetPaths;
use epinet_types::{NodeId, Probability, ProbabilityError};
use serde::Deserialize;

use crate::driver::{SweepParameter, TrialPlan};
use crate::epidemic::EpidemicParams;
use crate::jump::{DEFAULT_JUMP_COUNT, DEFAULT_JUMP_PROBABILITY, RandomJump};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A probability field is outside `[0, 1]`.
    #[error("invalid probability in {field}: {source}")]
    InvalidProbability {
        /// Dotted path of the offending field.
        field: String,
        /// The underlying range error.
        source: ProbabilityError,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {variable}: {reason}")]
    InvalidOverride {
        /// The environment variable name.
        variable: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level sweep configuration.
///
/// Mirrors the structure of `epinet-config.yaml`. Every field has a default,
/// so an empty document is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExperimentConfig {
    /// Which dataset to load.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Which parameter to sweep, and over which values.
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Repetitions, seeding, and worker pool settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Where results accumulate.
    #[serde(default)]
    pub store: StoreConfig,
}

impl ExperimentConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `EPINET_STORE_PATH` overrides `store.path`
    /// - `EPINET_SEED` overrides `run.seed`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] for a malformed override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from a variable lookup (normally the process
    /// environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if `EPINET_SEED` is not an
    /// unsigned integer.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("EPINET_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(seed) = lookup("EPINET_SEED") {
            self.run.seed = seed.trim().parse().map_err(|e| ConfigError::InvalidOverride {
                variable: "EPINET_SEED".to_owned(),
                reason: format!("{e}"),
            })?;
        }
        Ok(())
    }

    /// Dataset file locations.
    pub fn dataset_paths(&self) -> DatasetPaths {
        DatasetPaths {
            vertex_list: self.dataset.vertex_list.clone(),
            edge_list: self.dataset.edge_list.clone(),
            excluded_node: self.dataset.excluded_node.map(NodeId),
        }
    }

    /// Build the trial plan for the given starting nodes, validating every
    /// probability.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProbability`] naming the first
    /// out-of-range field.
    pub fn trial_plan(&self, start_nodes: Vec<NodeId>) -> Result<TrialPlan, ConfigError> {
        let values = self
            .sweep
            .values
            .points()
            .into_iter()
            .map(|v| probability("sweep.values", v))
            .collect::<Result<Vec<_>, _>>()?;

        let jump_cfg = &self.sweep.random_jump;
        let jump = RandomJump {
            probability: probability("sweep.random_jump.probability", jump_cfg.probability)?,
            count: jump_cfg.count,
        };
        let base = EpidemicParams {
            transmission: probability(
                "sweep.transmission_probability",
                self.sweep.transmission_probability,
            )?,
            random_jump: (jump_cfg.enabled || self.sweep.parameter == SweepParameter::JumpProbability)
                .then_some(jump),
        };

        Ok(TrialPlan {
            parameter: self.sweep.parameter,
            values,
            base,
            start_nodes,
            trials: self.run.trials,
            seed: self.run.seed,
            max_workers: self.run.max_workers,
            trial_timeout: self.run.trial_timeout_ms.map(Duration::from_millis),
        })
    }
}

fn probability(field: &str, value: f64) -> Result<Probability, ConfigError> {
    Probability::new(value).map_err(|source| ConfigError::InvalidProbability {
        field: field.to_owned(),
        source,
    })
}

/// Dataset configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetConfig {
    /// Tab-delimited vertex list.
    #[serde(default = "default_vertex_list")]
    pub vertex_list: PathBuf,

    /// Tab-delimited edge list.
    #[serde(default = "default_edge_list")]
    pub edge_list: PathBuf,

    /// Index of the "other institutions" sentinel vertex.
    #[serde(default = "default_excluded_node")]
    pub excluded_node: Option<u32>,

    /// Run on the weighted variant instead of the unweighted one.
    #[serde(default)]
    pub weighted: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            vertex_list: default_vertex_list(),
            edge_list: default_edge_list(),
            excluded_node: default_excluded_node(),
            weighted: false,
        }
    }
}

/// Sweep configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SweepConfig {
    /// The swept parameter.
    #[serde(default)]
    pub parameter: SweepParameter,

    /// The values it takes.
    #[serde(default)]
    pub values: GridSpec,

    /// Transmission probability used when the jump probability is swept.
    #[serde(default = "default_transmission_probability")]
    pub transmission_probability: f64,

    /// Random-jump settings.
    #[serde(default)]
    pub random_jump: RandomJumpConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            parameter: SweepParameter::default(),
            values: GridSpec::default(),
            transmission_probability: default_transmission_probability(),
            random_jump: RandomJumpConfig::default(),
        }
    }
}

/// Random-jump configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RandomJumpConfig {
    /// Whether jumps happen in a transmission sweep. A jump-probability
    /// sweep always enables them.
    #[serde(default)]
    pub enabled: bool,

    /// Per-target jump probability (ignored when it is the swept value).
    #[serde(default = "default_jump_probability")]
    pub probability: f64,

    /// Jump targets drawn per infected node.
    #[serde(default = "default_jump_count")]
    pub count: u32,
}

impl Default for RandomJumpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            probability: default_jump_probability(),
            count: default_jump_count(),
        }
    }
}

/// The values a sweep runs over: an explicit list, or evenly spaced points.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    /// Explicit values, used in the given order.
    Values(Vec<f64>),
    /// `num` evenly spaced points from `start` towards `stop`.
    Linspace {
        /// First point.
        start: f64,
        /// Last point, or the excluded bound when `endpoint` is false.
        stop: f64,
        /// Number of points.
        num: u32,
        /// Whether `stop` itself is included.
        #[serde(default = "default_true")]
        endpoint: bool,
    },
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::Linspace {
            start: 0.0,
            stop: 1.0,
            num: 11,
            endpoint: true,
        }
    }
}

impl GridSpec {
    /// Expand into concrete values.
    pub fn points(&self) -> Vec<f64> {
        match self {
            Self::Values(values) => values.clone(),
            Self::Linspace {
                start,
                stop,
                num,
                endpoint,
            } => linspace(*start, *stop, *num, *endpoint),
        }
    }
}

fn linspace(start: f64, stop: f64, num: u32, endpoint: bool) -> Vec<f64> {
    let intervals = if endpoint { num.saturating_sub(1) } else { num };
    if num == 0 {
        return Vec::new();
    }
    if intervals == 0 {
        return vec![start];
    }
    let step = (stop - start) / f64::from(intervals);
    (0..num).map(|i| f64::from(i).mul_add(step, start)).collect()
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Trials appended per (value, node) key.
    #[serde(default = "default_trials")]
    pub trials: u32,

    /// Base seed; every trial derives its own generator from it.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Concurrent trials; `0` means one per available core.
    #[serde(default)]
    pub max_workers: usize,

    /// Optional wall-clock budget per trial, in milliseconds.
    #[serde(default)]
    pub trial_timeout_ms: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            seed: default_seed(),
            max_workers: 0,
            trial_timeout_ms: None,
        }
    }
}

/// Result store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// JSON file the samples accumulate in.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_vertex_list() -> PathBuf {
    PathBuf::from("data/HIS_vertexlist.txt")
}

fn default_edge_list() -> PathBuf {
    PathBuf::from("data/HIS_edgelist.txt")
}

#[allow(clippy::unnecessary_wraps)]
const fn default_excluded_node() -> Option<u32> {
    Some(145)
}

const fn default_transmission_probability() -> f64 {
    0.1
}

const fn default_jump_probability() -> f64 {
    DEFAULT_JUMP_PROBABILITY
}

const fn default_jump_count() -> u32 {
    DEFAULT_JUMP_COUNT
}

const fn default_true() -> bool {
    true
}

const fn default_trials() -> u32 {
    1
}

const fn default_seed() -> u64 {
    42
}

fn default_store_path() -> PathBuf {
    PathBuf::from("cache/HIS_SI.json")
}
