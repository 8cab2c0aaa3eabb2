//! Random-jump extension.
//!
//! Influence also travels through channels the hiring graph does not record
//! (conferences, visits, informal networks). When enabled, each infected
//! node gets exactly one batch of long-range attempts, resolved the first
//! round it is scanned:
//!
//! 1. Eligible targets are all nodes that are not descendants of the
//!    source, not already infected, and not the source itself.
//! 2. `min(count, |eligible|)` distinct targets are sampled uniformly.
//! 3. Each sampled target is infected independently with the jump
//!    probability. Edge weights play no part here.

use std::collections::BTreeSet;

use epinet_graph::HiringGraph;
use epinet_types::{NodeId, Probability, ProbabilityError};
use rand::Rng;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};

use crate::epidemic::bernoulli;

/// Default per-target success probability of a jump.
pub const DEFAULT_JUMP_PROBABILITY: f64 = 0.001;

/// Default number of jump targets drawn per infected node.
pub const DEFAULT_JUMP_COUNT: u32 = 1;

#[allow(clippy::panic)]
const DEFAULT_JUMP: Probability = match Probability::checked(DEFAULT_JUMP_PROBABILITY) {
    Some(p) => p,
    None => panic!("DEFAULT_JUMP_PROBABILITY must lie in [0, 1]"),
};

/// Parameters of the random-jump extension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomJump {
    /// Success probability of each individual jump.
    pub probability: Probability,
    /// How many distinct targets each infected node draws.
    pub count: u32,
}

impl RandomJump {
    /// Validate and build jump parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ProbabilityError::OutOfRange`] if `probability` is outside
    /// `[0, 1]`.
    pub fn new(probability: f64, count: u32) -> Result<Self, ProbabilityError> {
        Ok(Self {
            probability: Probability::new(probability)?,
            count,
        })
    }
}

impl Default for RandomJump {
    fn default() -> Self {
        Self {
            probability: DEFAULT_JUMP,
            count: DEFAULT_JUMP_COUNT,
        }
    }
}

/// Result of resolving one node's jump batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JumpResolution {
    /// Number of targets sampled (and therefore Bernoulli draws made).
    pub sampled: usize,
    /// Targets whose draw succeeded.
    pub hits: Vec<NodeId>,
}

/// Return the nodes `source` may jump to, in ascending order.
pub fn eligible_targets(
    graph: &HiringGraph,
    source: NodeId,
    infected: &BTreeSet<NodeId>,
) -> Vec<NodeId> {
    let reachable = graph.descendants(source);
    graph
        .nodes()
        .filter(|&v| v != source)
        .filter(|v| !infected.contains(v))
        .filter(|v| !reachable.is_some_and(|r| r.contains(v)))
        .collect()
}

/// Sample and resolve the jump batch of `source`.
///
/// An empty eligible set, or a `count` of zero, resolves to nothing.
pub fn resolve<R: Rng + ?Sized>(
    rng: &mut R,
    graph: &HiringGraph,
    source: NodeId,
    infected: &BTreeSet<NodeId>,
    jump: &RandomJump,
) -> JumpResolution {
    let eligible = eligible_targets(graph, source, infected);
    let amount = usize::try_from(jump.count)
        .unwrap_or(usize::MAX)
        .min(eligible.len());
    if amount == 0 {
        return JumpResolution::default();
    }

    let targets = eligible.into_iter().choose_multiple(rng, amount);
    let mut hits = Vec::new();
    for &target in &targets {
        if bernoulli(rng, jump.probability.value()) {
            hits.push(target);
        }
    }

    JumpResolution {
        sampled: targets.len(),
        hits,
    }
}
