//! Plain data structs shared across the workspace.

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;
use crate::probability::ProbabilityKey;

/// Identifies one cell of a sweep grid: the swept probability and the
/// node the epidemic was started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrialKey {
    /// The swept probability (transmission or jump, depending on the sweep).
    pub probability: ProbabilityKey,
    /// The initially infected node.
    pub node: NodeId,
}

impl TrialKey {
    /// Build a key from its parts.
    pub const fn new(probability: ProbabilityKey, node: NodeId) -> Self {
        Self { probability, node }
    }
}

/// Outcome of a single simulated epidemic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialSample {
    /// Fraction of all nodes infected when the epidemic stopped, in `[0, 1]`.
    pub size: f64,
    /// Number of rounds until no further spread occurred.
    pub length: u64,
}

/// Per-institution metadata from a vertex list.
///
/// Only `pi` (the prestige score) is mandatory; the published rankings are
/// missing for many institutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionMeta {
    /// Prestige score inferred from the hiring network.
    pub pi: f64,
    /// 2010 US News ranking, if the institution was ranked.
    pub usn2010: Option<f64>,
    /// 1995 NRC ranking, if the institution was ranked.
    pub nrc95: Option<f64>,
    /// Geographic region label.
    pub region: String,
    /// Institution name.
    pub institution: String,
}
