//! Trial driver: runs a probability × starting-node grid of epidemics and
//! accumulates the samples into a [`ResultStore`].
//!
//! Jobs are enumerated trial-major (`trial × value × node`) and each one
//! owns a [`StdRng`] derived from the base seed and its job index, so a
//! sweep is reproducible no matter how many workers execute it. Trials run
//! on the blocking pool under a [`Semaphore`]; their samples are buffered
//! and appended in job order once every trial has finished.
//!
//! The graph is shared read-only behind an [`Arc`]. Every mutable piece of
//! trial state lives in the [`Epidemic`] each job creates.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use epinet_graph::HiringGraph;
use epinet_types::{NodeId, Probability, TrialKey, TrialSample};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::epidemic::{Epidemic, EpidemicParams, SimulationOutcome};
use crate::jump::{DEFAULT_JUMP_COUNT, RandomJump};

/// Errors that can occur while running a sweep.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The worker pool could not hand out a slot.
    #[error("worker pool error: {message}")]
    WorkerPool {
        /// Description of the pool failure.
        message: String,
    },

    /// A trial task panicked or was cancelled.
    #[error("trial worker failed: {message}")]
    WorkerFailed {
        /// Description of the worker failure.
        message: String,
    },
}

/// Persistent mapping from `(probability, node)` to the samples gathered so
/// far. Stores are cumulative: `append` never replaces earlier samples.
pub trait ResultStore {
    /// Return the samples recorded for `key`, oldest first.
    fn load(&self, key: &TrialKey) -> Vec<TrialSample>;

    /// Record one more sample for `key`.
    fn append(&mut self, key: TrialKey, sample: TrialSample);
}

/// In-memory [`ResultStore`], used by tests and one-off runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    samples: BTreeMap<TrialKey, Vec<TrialSample>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            samples: BTreeMap::new(),
        }
    }

    /// Number of keys with at least one sample.
    pub fn key_count(&self) -> usize {
        self.samples.len()
    }

    /// Total samples across every key.
    pub fn samples_total(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    /// Borrow the samples for `key`.
    pub fn samples(&self, key: &TrialKey) -> &[TrialSample] {
        self.samples.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl ResultStore for MemoryStore {
    fn load(&self, key: &TrialKey) -> Vec<TrialSample> {
        self.samples(key).to_vec()
    }

    fn append(&mut self, key: TrialKey, sample: TrialSample) {
        self.samples.entry(key).or_default().push(sample);
    }
}

/// Which epidemic parameter a sweep varies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParameter {
    /// The per-edge transmission probability `p`.
    #[default]
    Transmission,
    /// The per-target jump probability `q`. Jumps are always enabled.
    JumpProbability,
}

impl std::fmt::Display for SweepParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transmission => write!(f, "transmission"),
            Self::JumpProbability => write!(f, "jump_probability"),
        }
    }
}

/// Everything needed to run one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialPlan {
    /// The parameter the values are substituted into.
    pub parameter: SweepParameter,
    /// Swept values, in order. Each becomes a store key.
    pub values: Vec<Probability>,
    /// Parameters for everything that is not swept.
    pub base: EpidemicParams,
    /// Starting nodes; each gets its own key per value.
    pub start_nodes: Vec<NodeId>,
    /// Samples appended per key.
    pub trials: u32,
    /// Base seed every job derives its generator from.
    pub seed: u64,
    /// Concurrent trials; `0` means one per available core.
    pub max_workers: usize,
    /// Wall-clock budget per trial.
    pub trial_timeout: Option<Duration>,
}

impl TrialPlan {
    /// Plan a transmission sweep with one trial per key, seed `0`, and no
    /// timeout.
    pub fn new(values: Vec<Probability>, base: EpidemicParams, start_nodes: Vec<NodeId>) -> Self {
        Self {
            parameter: SweepParameter::Transmission,
            values,
            base,
            start_nodes,
            trials: 1,
            seed: 0,
            max_workers: 0,
            trial_timeout: None,
        }
    }

    /// Parameters for one swept value.
    pub fn params_for(&self, value: Probability) -> EpidemicParams {
        match self.parameter {
            SweepParameter::Transmission => EpidemicParams {
                transmission: value,
                ..self.base
            },
            SweepParameter::JumpProbability => {
                let count = self
                    .base
                    .random_jump
                    .map_or(DEFAULT_JUMP_COUNT, |jump| jump.count);
                EpidemicParams {
                    random_jump: Some(RandomJump {
                        probability: value,
                        count,
                    }),
                    ..self.base
                }
            }
        }
    }

    /// Number of jobs the plan expands to.
    pub fn job_count(&self) -> usize {
        usize::try_from(self.trials)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.values.len())
            .saturating_mul(self.start_nodes.len())
    }

    /// Every store key the plan touches, value-major.
    pub fn keys(&self) -> impl Iterator<Item = TrialKey> + '_ {
        self.values.iter().flat_map(move |value| {
            self.start_nodes
                .iter()
                .map(move |&node| TrialKey::new(value.key(), node))
        })
    }

    fn worker_count(&self) -> usize {
        if self.max_workers > 0 {
            self.max_workers
        } else {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        }
    }

    /// Expand into jobs lazily, trial outermost.
    fn jobs(&self) -> impl Iterator<Item = Job> + '_ {
        (0..self.trials)
            .flat_map(move |_| {
                self.values.iter().flat_map(move |&value| {
                    let params = self.params_for(value);
                    self.start_nodes
                        .iter()
                        .map(move |&node| (TrialKey::new(value.key(), node), params))
                })
            })
            .enumerate()
            .map(move |(position, (key, params))| {
                let index = u64::try_from(position).unwrap_or(u64::MAX);
                Job {
                    index,
                    key,
                    params,
                    seed: job_seed(self.seed, index),
                }
            })
    }
}

/// What a sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Jobs executed.
    pub jobs: usize,
    /// Samples appended to the store.
    pub samples_appended: usize,
    /// Jobs that ran out of time and contributed no sample.
    pub timed_out: usize,
    /// Samples the plan's keys already held before the sweep.
    pub existing_samples: usize,
}

/// Upper bound on the result buffer reserved before trials come back.
const PREALLOCATED_RESULTS: usize = 1 << 16;

#[derive(Debug, Clone, Copy)]
struct Job {
    index: u64,
    key: TrialKey,
    params: EpidemicParams,
    seed: u64,
}

#[derive(Debug, Clone, Copy)]
struct JobResult {
    index: u64,
    key: TrialKey,
    outcome: SimulationOutcome,
}

/// Mix a base seed and a job index into an independent generator seed
/// (`SplitMix64` finalizer).
pub const fn job_seed(base: u64, index: u64) -> u64 {
    let mut z = base.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ z.wrapping_shr(30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ z.wrapping_shr(27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ z.wrapping_shr(31)
}

fn run_job(graph: &HiringGraph, job: Job, timeout: Option<Duration>) -> JobResult {
    let mut epidemic = Epidemic::new(graph, job.params, StdRng::seed_from_u64(job.seed));
    // A start node outside the graph seeds nothing: size 0, length 1.
    let _ = epidemic.seed(job.key.node);
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
    let outcome = match deadline {
        Some(deadline) => epidemic.simulate_with_deadline(deadline),
        None => SimulationOutcome::Completed(epidemic.simulate()),
    };
    JobResult {
        index: job.index,
        key: job.key,
        outcome,
    }
}

/// Run every job of `plan` on `graph` and append the samples to `store`.
///
/// Samples are appended after all trials finish, in job order, so the
/// store's contents depend only on the plan.
///
/// # Errors
///
/// Returns a worker error if a trial task fails. The store is left
/// untouched on error.
///
/// Starting nodes absent from the graph (institutions without placements)
/// still get their samples: an epidemic that never starts, with size 0.
pub async fn run_sweep<S>(
    graph: Arc<HiringGraph>,
    plan: &TrialPlan,
    store: &mut S,
) -> Result<SweepSummary, DriverError>
where
    S: ResultStore + ?Sized,
{
    let outside_graph = plan.start_nodes.iter().filter(|&&n| !graph.contains(n)).count();
    if outside_graph > 0 {
        warn!(
            outside_graph,
            "Starting nodes without placements will record empty epidemics"
        );
    }

    let existing_samples = plan.keys().map(|key| store.load(&key).len()).sum();
    let job_count = plan.job_count();
    let workers = plan.worker_count();
    info!(
        parameter = %plan.parameter,
        values = plan.values.len(),
        start_nodes = plan.start_nodes.len(),
        trials = plan.trials,
        jobs = job_count,
        workers,
        existing_samples,
        "Sweep starting"
    );

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();
    let mut spawned: usize = 0;
    for job in plan.jobs() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| DriverError::WorkerPool {
                message: format!("{e}"),
            })?;
        let graph = Arc::clone(&graph);
        let timeout = plan.trial_timeout;
        tasks.spawn_blocking(move || {
            let result = run_job(&graph, job, timeout);
            drop(permit);
            result
        });
        spawned = spawned.saturating_add(1);
    }

    let mut results = Vec::with_capacity(spawned.min(PREALLOCATED_RESULTS));
    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(|e| DriverError::WorkerFailed {
            message: format!("{e}"),
        })?;
        results.push(result);
    }
    results.sort_by_key(|r| r.index);

    let mut summary = SweepSummary {
        jobs: spawned,
        existing_samples,
        ..SweepSummary::default()
    };
    for result in results {
        match result.outcome {
            SimulationOutcome::Completed(sample) => {
                debug!(
                    job = result.index,
                    probability = %result.key.probability,
                    node = %result.key.node,
                    size = sample.size,
                    length = sample.length,
                    "Trial finished"
                );
                store.append(result.key, sample);
                summary.samples_appended = summary.samples_appended.saturating_add(1);
            }
            SimulationOutcome::DeadlineExceeded { rounds } => {
                warn!(
                    job = result.index,
                    probability = %result.key.probability,
                    node = %result.key.node,
                    rounds,
                    "Trial exceeded its time budget, no sample recorded"
                );
                summary.timed_out = summary.timed_out.saturating_add(1);
            }
        }
    }

    info!(
        jobs = summary.jobs,
        samples_appended = summary.samples_appended,
        timed_out = summary.timed_out,
        "Sweep complete"
    );
    Ok(summary)
}
