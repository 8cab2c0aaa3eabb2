//! Cumulative JSON file store.
//!
//! On disk the store keeps sizes and lengths in two parallel tables keyed
//! by probability, then by node:
//!
//! ```text
//! {
//!   "probabilities": ["0.000000", "0.100000", ...],
//!   "size":   { "0.100000": { "12": [0.031, 0.052, ...] } },
//!   "length": { "0.100000": { "12": [2, 3, ...] } },
//!   "runs":   [ { "id": "...", "started_at": "...", ... } ]
//! }
//! ```
//!
//! Probabilities are rendered as fixed six-decimal strings so keys never
//! drift with floating point noise. `probabilities` records the order in
//! which keys were first seen.
//!
//! In memory the two tables are zipped into one map of
//! [`TrialSample`]s, so they can never fall out of step once opened.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use epinet_core::driver::{ResultStore, SweepParameter, SweepSummary};
use epinet_types::{NodeId, ProbabilityKey, RunId, TrialKey, TrialSample};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// One invocation of the trial driver against this store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run identifier.
    pub id: RunId,
    /// When the sweep started.
    pub started_at: DateTime<Utc>,
    /// Which parameter was swept.
    pub parameter: SweepParameter,
    /// Trials requested per key.
    pub trials: u32,
    /// Samples the run appended.
    pub samples_appended: usize,
    /// Trials that exceeded their time budget.
    #[serde(default)]
    pub timed_out: usize,
}

impl RunRecord {
    /// Describe a finished sweep.
    pub fn from_summary(
        started_at: DateTime<Utc>,
        parameter: SweepParameter,
        trials: u32,
        summary: &SweepSummary,
    ) -> Self {
        Self {
            id: RunId::new(),
            started_at,
            parameter,
            trials,
            samples_appended: summary.samples_appended,
            timed_out: summary.timed_out,
        }
    }
}

/// Serialized layout of the store file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    probabilities: Vec<ProbabilityKey>,
    #[serde(default)]
    size: BTreeMap<ProbabilityKey, BTreeMap<NodeId, Vec<f64>>>,
    #[serde(default)]
    length: BTreeMap<ProbabilityKey, BTreeMap<NodeId, Vec<u64>>>,
    #[serde(default)]
    runs: Vec<RunRecord>,
}

/// A [`ResultStore`] backed by a JSON file.
///
/// Appends only touch memory; call [`save`](Self::save) to persist them.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    probabilities: Vec<ProbabilityKey>,
    samples: BTreeMap<TrialKey, Vec<TrialSample>>,
    runs: Vec<RunRecord>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing or empty file yields an empty
    /// store; nothing is written until [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read,
    /// [`StoreError::Serialization`] if it is not a valid store, or
    /// [`StoreError::Inconsistent`] if its size and length tables disagree.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(io_error(&path, source)),
        };

        let file: StoreFile = if contents.trim().is_empty() {
            tracing::info!(path = %path.display(), "No existing results, starting fresh store");
            StoreFile::default()
        } else {
            serde_json::from_str(&contents)?
        };

        let store = Self::from_file(path, file)?;
        tracing::info!(
            path = %store.path.display(),
            keys = store.samples.len(),
            samples = store.samples_total(),
            runs = store.runs.len(),
            "Opened result store"
        );
        Ok(store)
    }

    fn from_file(path: PathBuf, file: StoreFile) -> Result<Self, StoreError> {
        let StoreFile {
            mut probabilities,
            size,
            mut length,
            runs,
        } = file;

        let mut samples = BTreeMap::new();
        for (probability, by_node) in size {
            let mut lengths_by_node = length.remove(&probability).unwrap_or_default();
            for (node, sizes) in by_node {
                let lengths = lengths_by_node.remove(&node).unwrap_or_default();
                if sizes.len() != lengths.len() {
                    return Err(StoreError::Inconsistent {
                        probability,
                        node,
                        sizes: sizes.len(),
                        lengths: lengths.len(),
                    });
                }
                let merged = sizes
                    .into_iter()
                    .zip(lengths)
                    .map(|(size, length)| TrialSample { size, length })
                    .collect();
                samples.insert(TrialKey::new(probability, node), merged);
            }
            if let Some((node, lengths)) = lengths_by_node.into_iter().next() {
                return Err(StoreError::Inconsistent {
                    probability,
                    node,
                    sizes: 0,
                    lengths: lengths.len(),
                });
            }
            if !probabilities.contains(&probability) {
                probabilities.push(probability);
            }
        }
        if let Some((probability, by_node)) = length.into_iter().next()
            && let Some((node, lengths)) = by_node.into_iter().next()
        {
            return Err(StoreError::Inconsistent {
                probability,
                node,
                sizes: 0,
                lengths: lengths.len(),
            });
        }

        Ok(Self {
            path,
            probabilities,
            samples,
            runs,
        })
    }

    fn to_file(&self) -> StoreFile {
        let mut size: BTreeMap<ProbabilityKey, BTreeMap<NodeId, Vec<f64>>> = BTreeMap::new();
        let mut length: BTreeMap<ProbabilityKey, BTreeMap<NodeId, Vec<u64>>> = BTreeMap::new();
        for (key, samples) in &self.samples {
            size.entry(key.probability)
                .or_default()
                .insert(key.node, samples.iter().map(|s| s.size).collect());
            length
                .entry(key.probability)
                .or_default()
                .insert(key.node, samples.iter().map(|s| s.length).collect());
        }
        StoreFile {
            probabilities: self.probabilities.clone(),
            size,
            length,
            runs: self.runs.clone(),
        }
    }

    /// Write the store to its path, replacing the previous file atomically.
    ///
    /// The contents go to a sibling temporary file first, which is then
    /// renamed over the target. Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if any filesystem step fails.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let json = serde_json::to_string(&self.to_file())?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json).map_err(|e| io_error(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_error(&self.path, e));
        }

        tracing::info!(
            path = %self.path.display(),
            keys = self.samples.len(),
            samples = self.samples_total(),
            "Saved result store"
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "results".into(), |n| n.to_string_lossy().into_owned());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a run to the audit trail.
    pub fn record_run(&mut self, run: RunRecord) {
        tracing::debug!(run_id = %run.id, samples = run.samples_appended, "Run recorded");
        self.runs.push(run);
    }

    /// Every run recorded so far, oldest first.
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// Probability keys in the order they were first stored.
    pub fn probabilities(&self) -> &[ProbabilityKey] {
        &self.probabilities
    }

    /// Every key with samples, in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = TrialKey> + '_ {
        self.samples.keys().copied()
    }

    /// Borrow the samples for `key`.
    pub fn samples(&self, key: &TrialKey) -> &[TrialSample] {
        self.samples.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Samples recorded for a representative key: the smallest probability
    /// and, within it, the smallest node. An empty store has recorded none.
    ///
    /// Sweeps add the same number of trials to every key, so this is the
    /// number of trials the store holds per key.
    pub fn trials_recorded(&self) -> usize {
        self.samples.values().next().map_or(0, Vec::len)
    }

    /// Total samples across every key.
    pub fn samples_total(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }
}

impl ResultStore for JsonFileStore {
    fn load(&self, key: &TrialKey) -> Vec<TrialSample> {
        self.samples(key).to_vec()
    }

    fn append(&mut self, key: TrialKey, sample: TrialSample) {
        if !self.probabilities.contains(&key.probability) {
            self.probabilities.push(key.probability);
        }
        self.samples.entry(key).or_default().push(sample);
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
