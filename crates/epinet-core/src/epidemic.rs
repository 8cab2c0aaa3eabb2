//! The SI epidemic state machine.
//!
//! An [`Epidemic`] partitions the nodes of a [`HiringGraph`] into
//! susceptible and infected sets and advances in synchronous rounds. Each
//! round scans the nodes that were infected when the round began:
//!
//! 1. Every outgoing edge `(u, v)` whose target is still susceptible and
//!    whose ordered pair has never been attempted is attempted now. The
//!    pair is marked visited whatever the outcome, so each ordered pair
//!    gets exactly one Bernoulli draw over the whole epidemic; parallel
//!    edges collapse onto the first one. Success probability is `p`, or
//!    `p * weight` for weighted edges.
//! 2. If the random-jump extension is enabled and `u` has never jumped,
//!    its jump batch is resolved (see [`crate::jump`]).
//!
//! A round in which nothing was infected marks the epidemic complete.
//! Termination is guaranteed: the visited-pair ledger and the jumped-node
//! set only grow, and both are bounded by the graph.
//!
//! All randomness comes from the generator passed to [`Epidemic::new`], so a
//! trial is reproducible from its seed.
//!
//! An `Epidemic` is single-writer: it is driven through `&mut self` and is
//! never shared between threads while running.

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use epinet_graph::HiringGraph;
use epinet_types::{NodeId, Probability, ProbabilityError, TrialSample};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::jump::{self, RandomJump};

/// Draw a Bernoulli trial that succeeds with probability `threshold`.
///
/// Thresholds at or below zero never succeed; thresholds at or above one
/// always succeed.
pub(crate) fn bernoulli<R: Rng + ?Sized>(rng: &mut R, threshold: f64) -> bool {
    rng.random::<f64>() < threshold
}

/// Parameters of a single epidemic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpidemicParams {
    /// Per-edge transmission probability `p`.
    pub transmission: Probability,
    /// Random-jump extension; `None` disables it.
    pub random_jump: Option<RandomJump>,
}

impl EpidemicParams {
    /// Plain SI parameters with the given transmission probability.
    ///
    /// # Errors
    ///
    /// Returns [`ProbabilityError::OutOfRange`] if `transmission` is outside
    /// `[0, 1]`.
    pub fn new(transmission: f64) -> Result<Self, ProbabilityError> {
        Ok(Self {
            transmission: Probability::new(transmission)?,
            random_jump: None,
        })
    }

    /// Enable random jumps.
    ///
    /// # Errors
    ///
    /// Returns [`ProbabilityError::OutOfRange`] if `probability` is outside
    /// `[0, 1]`.
    pub fn with_random_jump(self, probability: f64, count: u32) -> Result<Self, ProbabilityError> {
        Ok(Self {
            random_jump: Some(RandomJump::new(probability, count)?),
            ..self
        })
    }
}

/// What a seeding call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SeedOutcome {
    /// The node moved from susceptible to infected.
    Infected(NodeId),
    /// The node was already infected; nothing changed.
    AlreadyInfected,
    /// The node is not part of the graph; nothing changed.
    UnknownNode,
    /// A random seed was requested but no node is susceptible.
    NoSusceptibleNodes,
}

impl SeedOutcome {
    /// Whether the call infected a node.
    pub const fn is_infected(self) -> bool {
        matches!(self, Self::Infected(_))
    }
}

/// Summary of one synchronous round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// 1-based round number.
    pub round: usize,
    /// Nodes infected during this round, by edges or jumps.
    pub newly_infected: usize,
    /// Edge transmission draws made this round.
    pub edge_attempts: usize,
    /// Jump draws made this round.
    pub jump_attempts: usize,
}

/// How a deadline-bounded simulation ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationOutcome {
    /// The epidemic stopped spreading.
    Completed(TrialSample),
    /// The deadline passed before the epidemic stopped spreading.
    DeadlineExceeded {
        /// Rounds completed before the deadline.
        rounds: u64,
    },
}

/// SI epidemic on a borrowed graph, driven by an owned random generator.
#[derive(Debug, Clone)]
pub struct Epidemic<'g, R> {
    graph: &'g HiringGraph,
    params: EpidemicParams,
    rng: R,
    susceptible: BTreeSet<NodeId>,
    infected: BTreeSet<NodeId>,
    /// Ordered pairs whose single transmission draw has been spent.
    visited_edges: HashSet<(NodeId, NodeId)>,
    /// Nodes whose jump batch has been resolved.
    jumped: BTreeSet<NodeId>,
    time: u64,
    is_complete: bool,
    /// Infected count at the end of each round.
    history: Vec<usize>,
    edge_draws: usize,
    jump_draws: usize,
}

impl<'g, R: Rng> Epidemic<'g, R> {
    /// Create an epidemic with every node susceptible.
    pub fn new(graph: &'g HiringGraph, params: EpidemicParams, rng: R) -> Self {
        Self {
            graph,
            params,
            rng,
            susceptible: graph.node_set().clone(),
            infected: BTreeSet::new(),
            visited_edges: HashSet::new(),
            jumped: BTreeSet::new(),
            time: 0,
            is_complete: false,
            history: Vec::new(),
            edge_draws: 0,
            jump_draws: 0,
        }
    }

    /// Infect `node` if it is susceptible. Anything else is a no-op.
    pub fn seed(&mut self, node: NodeId) -> SeedOutcome {
        if self.infect(node) {
            SeedOutcome::Infected(node)
        } else if self.infected.contains(&node) {
            SeedOutcome::AlreadyInfected
        } else {
            SeedOutcome::UnknownNode
        }
    }

    /// Infect a uniformly chosen susceptible node.
    pub fn seed_random(&mut self) -> SeedOutcome {
        let len = self.susceptible.len();
        if len == 0 {
            debug!("No susceptible nodes to infect");
            return SeedOutcome::NoSusceptibleNodes;
        }
        let pick = self.rng.random_range(0..len);
        match self.susceptible.iter().nth(pick).copied() {
            Some(node) => self.seed(node),
            None => SeedOutcome::NoSusceptibleNodes,
        }
    }

    /// Run one synchronous round. Returns `None` once the epidemic is
    /// complete.
    pub fn step(&mut self) -> Option<RoundReport> {
        if self.is_complete {
            return None;
        }
        // Cleared by any infection below.
        self.is_complete = true;

        let before = self.infected.len();
        let frontier: Vec<NodeId> = self.infected.iter().copied().collect();
        let mut edge_attempts: usize = 0;
        let mut jump_attempts: usize = 0;

        for u in frontier {
            edge_attempts = edge_attempts.saturating_add(self.spread_along_edges(u));
            if let Some(jump) = self.params.random_jump
                && self.jumped.insert(u)
            {
                jump_attempts = jump_attempts.saturating_add(self.spread_by_jump(u, &jump));
            }
        }

        self.history.push(self.infected.len());
        let report = RoundReport {
            round: self.history.len(),
            newly_infected: self.infected.len().saturating_sub(before),
            edge_attempts,
            jump_attempts,
        };
        trace!(
            round = report.round,
            newly_infected = report.newly_infected,
            edge_attempts,
            jump_attempts,
            "Round resolved"
        );
        Some(report)
    }

    /// Run rounds until the epidemic stops spreading, counting each round
    /// in [`length`](Self::length).
    pub fn simulate(&mut self) -> TrialSample {
        while !self.is_complete {
            self.step();
            self.time = self.time.saturating_add(1);
        }
        let sample = self.sample();
        debug!(size = sample.size, length = sample.length, "Epidemic complete");
        sample
    }

    /// Like [`simulate`](Self::simulate), but give up once `deadline` has
    /// passed. The deadline is checked between rounds, so the state is
    /// always consistent and the epidemic can be resumed.
    pub fn simulate_with_deadline(&mut self, deadline: Instant) -> SimulationOutcome {
        while !self.is_complete {
            if Instant::now() >= deadline {
                return SimulationOutcome::DeadlineExceeded { rounds: self.time };
            }
            self.step();
            self.time = self.time.saturating_add(1);
        }
        SimulationOutcome::Completed(self.sample())
    }

    /// Try every fresh edge out of `u`. Returns the number of draws made.
    fn spread_along_edges(&mut self, u: NodeId) -> usize {
        let graph = self.graph;
        let p = self.params.transmission.value();
        let mut attempts: usize = 0;

        for edge in graph.out_edges(u) {
            let v = edge.target;
            if !self.susceptible.contains(&v) || !self.visited_edges.insert((u, v)) {
                continue;
            }
            attempts = attempts.saturating_add(1);
            let threshold = edge.weight.map_or(p, |w| p * w);
            if bernoulli(&mut self.rng, threshold) {
                self.infect(v);
            }
        }

        self.edge_draws = self.edge_draws.saturating_add(attempts);
        attempts
    }

    /// Resolve `u`'s jump batch. Returns the number of draws made.
    fn spread_by_jump(&mut self, u: NodeId, jump: &RandomJump) -> usize {
        let resolution = jump::resolve(&mut self.rng, self.graph, u, &self.infected, jump);
        for target in resolution.hits {
            self.infect(target);
        }
        self.jump_draws = self.jump_draws.saturating_add(resolution.sampled);
        resolution.sampled
    }

    /// Move `node` from susceptible to infected. Returns `false` if it was
    /// not susceptible.
    fn infect(&mut self, node: NodeId) -> bool {
        if !self.susceptible.remove(&node) {
            return false;
        }
        self.infected.insert(node);
        self.is_complete = false;
        true
    }
}

impl<R> Epidemic<'_, R> {
    /// Fraction of all nodes currently infected, in `[0, 1]`.
    ///
    /// An empty graph has size zero.
    pub fn size(&self) -> f64 {
        fraction(self.infected.len(), self.graph.node_count())
    }

    /// Rounds counted by [`simulate`](Epidemic::simulate) so far. After
    /// completion this is the epidemic's length.
    pub const fn length(&self) -> u64 {
        self.time
    }

    /// Current `(size, length)` pair.
    pub fn sample(&self) -> TrialSample {
        TrialSample {
            size: self.size(),
            length: self.length(),
        }
    }

    /// Whether the last round infected nothing.
    pub const fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// The infected set.
    pub const fn infected(&self) -> &BTreeSet<NodeId> {
        &self.infected
    }

    /// The susceptible set.
    pub const fn susceptible(&self) -> &BTreeSet<NodeId> {
        &self.susceptible
    }

    /// Whether `node` is infected.
    pub fn is_infected(&self, node: NodeId) -> bool {
        self.infected.contains(&node)
    }

    /// Whether the ordered pair `(u, v)` has spent its transmission draw.
    pub fn edge_attempted(&self, u: NodeId, v: NodeId) -> bool {
        self.visited_edges.contains(&(u, v))
    }

    /// Number of ordered pairs that have spent their transmission draw.
    pub fn visited_edge_count(&self) -> usize {
        self.visited_edges.len()
    }

    /// Total edge transmission draws made.
    pub const fn edge_draws(&self) -> usize {
        self.edge_draws
    }

    /// Total jump draws made.
    pub const fn jump_draws(&self) -> usize {
        self.jump_draws
    }

    /// Whether `node` has resolved its jump batch.
    pub fn jump_attempted(&self, node: NodeId) -> bool {
        self.jumped.contains(&node)
    }

    /// Infected count at the end of each round, oldest first.
    pub fn history(&self) -> &[usize] {
        &self.history
    }

    /// The parameters this epidemic runs with.
    pub const fn params(&self) -> &EpidemicParams {
        &self.params
    }

    /// The graph this epidemic runs on.
    pub const fn graph(&self) -> &HiringGraph {
        self.graph
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    // Node counts stay far below 2^52.
    part as f64 / whole as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn params(p: f64) -> EpidemicParams {
        EpidemicParams::new(p).unwrap()
    }

    /// A -> B -> C with unit weights.
    fn abc() -> HiringGraph {
        HiringGraph::from_edges(
            (0..3).map(n),
            [(n(0), n(1), Some(1.0)), (n(1), n(2), Some(1.0))],
        )
        .unwrap()
    }

    fn complete(size: u32) -> HiringGraph {
        let edges: Vec<_> = (0..size)
            .flat_map(|u| (0..size).filter(move |&v| v != u).map(move |v| (n(u), n(v), None)))
            .collect();
        HiringGraph::from_edges((0..size).map(n), edges).unwrap()
    }

    #[test]
    fn starts_fully_susceptible() {
        let g = abc();
        let epi = Epidemic::new(&g, params(0.5), rng(0));
        assert_eq!(epi.susceptible().len(), 3);
        assert!(epi.infected().is_empty());
        assert_eq!(epi.length(), 0);
        assert!(!epi.is_complete());
    }

    #[test]
    fn seeding_reports_what_happened() {
        let g = abc();
        let mut epi = Epidemic::new(&g, params(0.5), rng(0));
        assert_eq!(epi.seed(n(0)), SeedOutcome::Infected(n(0)));
        assert_eq!(epi.seed(n(0)), SeedOutcome::AlreadyInfected);
        assert_eq!(epi.seed(n(99)), SeedOutcome::UnknownNode);
        assert_eq!(epi.infected().len(), 1);
    }

    #[test]
    fn seeding_reopens_a_complete_epidemic() {
        let g = abc();
        let mut epi = Epidemic::new(&g, params(0.0), rng(0));
        let _ = epi.seed(n(0));
        epi.simulate();
        assert!(epi.is_complete());
        assert!(epi.seed(n(2)).is_infected());
        assert!(!epi.is_complete());
    }

    #[test]
    fn seed_random_exhausts_then_reports() {
        let g = abc();
        let mut epi = Epidemic::new(&g, params(0.0), rng(11));
        for _ in 0..3 {
            assert!(epi.seed_random().is_infected());
        }
        assert_eq!(epi.seed_random(), SeedOutcome::NoSusceptibleNodes);
        assert!((epi.size() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn chain_scenario_takes_three_rounds() {
        let g = abc();
        let mut epi = Epidemic::new(&g, params(1.0), rng(5));
        let _ = epi.seed(n(0));

        let r1 = epi.step().unwrap();
        assert_eq!(r1.newly_infected, 1);
        assert!(epi.is_infected(n(1)));
        assert!(!epi.is_infected(n(2)));

        let r2 = epi.step().unwrap();
        assert_eq!(r2.newly_infected, 1);
        assert!(epi.is_infected(n(2)));

        let r3 = epi.step().unwrap();
        assert_eq!(r3.newly_infected, 0);
        assert!(epi.is_complete());
        assert!(epi.step().is_none());
    }

    #[test]
    fn chain_scenario_size_and_length() {
        let g = abc();
        let mut epi = Epidemic::new(&g, params(1.0), rng(5));
        let _ = epi.seed(n(0));
        let sample = epi.simulate();
        assert!((sample.size - 1.0).abs() < f64::EPSILON);
        assert_eq!(sample.length, 3);
        assert_eq!(epi.history(), &[2, 3, 3]);
    }

    #[test]
    fn nodes_infected_mid_round_wait_for_next_round() {
        // 0 -> 1 -> 2 and 0 -> 3: round one infects 1 and 3 but never 2.
        let g = HiringGraph::from_edges(
            (0..4).map(n),
            [(n(0), n(1), None), (n(1), n(2), None), (n(0), n(3), None)],
        )
        .unwrap();
        let mut epi = Epidemic::new(&g, params(1.0), rng(0));
        let _ = epi.seed(n(0));
        let r1 = epi.step().unwrap();
        assert_eq!(r1.newly_infected, 2);
        assert!(!epi.is_infected(n(2)));
    }

    #[test]
    fn zero_probability_infects_only_the_seed() {
        let g = complete(5);
        let mut epi = Epidemic::new(&g, params(0.0), rng(3));
        let _ = epi.seed(n(2));
        let sample = epi.simulate();
        assert!((sample.size - 0.2).abs() < 1e-12);
        assert_eq!(sample.length, 1);
    }

    #[test]
    fn certain_transmission_floods_complete_graph_in_one_round() {
        let g = complete(6);
        let mut epi = Epidemic::new(&g, params(1.0), rng(9));
        let _ = epi.seed(n(0));
        let r1 = epi.step().unwrap();
        assert_eq!(r1.newly_infected, 5);
        assert!((epi.size() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn weight_scales_transmission() {
        let g = HiringGraph::from_edges(
            (0..3).map(n),
            [(n(0), n(1), Some(0.0)), (n(0), n(2), Some(1.0))],
        )
        .unwrap();
        for seed in 0..20 {
            let mut epi = Epidemic::new(&g, params(1.0), rng(seed));
            let _ = epi.seed(n(0));
            epi.simulate();
            assert!(!epi.is_infected(n(1)));
            assert!(epi.is_infected(n(2)));
        }
    }

    #[test]
    fn parallel_edges_share_one_draw() {
        // The zero-weight edge comes first and spends the pair's only draw.
        let g = HiringGraph::from_edges(
            (0..2).map(n),
            [(n(0), n(1), Some(0.0)), (n(0), n(1), Some(1.0)), (n(0), n(1), Some(1.0))],
        )
        .unwrap();
        let mut epi = Epidemic::new(&g, params(1.0), rng(1));
        let _ = epi.seed(n(0));
        epi.simulate();
        assert!(!epi.is_infected(n(1)));
        assert_eq!(epi.edge_draws(), 1);
        assert!(epi.edge_attempted(n(0), n(1)));
    }

    #[test]
    fn failed_edge_is_never_retried() {
        let g = abc();
        let mut epi = Epidemic::new(&g, params(0.0), rng(2));
        let _ = epi.seed(n(0));
        epi.step();
        assert!(epi.edge_attempted(n(0), n(1)));
        let draws = epi.edge_draws();
        // Reopen the epidemic and keep stepping; A's edge stays spent.
        let _ = epi.seed(n(2));
        while epi.step().is_some() {}
        assert_eq!(epi.edge_draws(), draws);
        assert!(!epi.is_infected(n(1)));
    }

    #[test]
    fn edge_to_infected_target_is_not_spent() {
        let g = abc();
        let mut epi = Epidemic::new(&g, params(1.0), rng(2));
        let _ = epi.seed(n(0));
        let _ = epi.seed(n(1));
        epi.step();
        assert!(!epi.edge_attempted(n(0), n(1)));
        assert!(epi.edge_attempted(n(1), n(2)));
    }

    #[test]
    fn jump_reaches_disconnected_component() {
        // {A, B} and {C, D}, no edges between.
        let g = HiringGraph::from_edges(
            (0..4).map(n),
            [(n(0), n(1), None), (n(2), n(3), None)],
        )
        .unwrap();
        let p = params(0.0).with_random_jump(1.0, 1).unwrap();
        for seed in 0..20 {
            let mut epi = Epidemic::new(&g, p, rng(seed));
            let _ = epi.seed(n(0));
            let r1 = epi.step().unwrap();
            assert_eq!(r1.jump_attempts, 1);
            assert!(epi.jump_attempted(n(0)));
            let crossed = epi.is_infected(n(2)) || epi.is_infected(n(3));
            assert!(crossed, "seed {seed}: jump must land in the other component");
            assert!(!epi.is_infected(n(1)));
        }
    }

    #[test]
    fn each_node_jumps_once() {
        let g = HiringGraph::from_edges((0..10).map(n), []).unwrap();
        let p = params(0.0).with_random_jump(0.0, 3).unwrap();
        let mut epi = Epidemic::new(&g, p, rng(4));
        let _ = epi.seed(n(0));
        epi.simulate();
        assert_eq!(epi.jump_draws(), 3);
        assert_eq!(epi.length(), 1);
    }

    #[test]
    fn jumps_disabled_by_default() {
        let g = HiringGraph::from_edges((0..4).map(n), []).unwrap();
        let mut epi = Epidemic::new(&g, params(1.0), rng(4));
        let _ = epi.seed(n(0));
        epi.simulate();
        assert_eq!(epi.jump_draws(), 0);
        assert!(!epi.jump_attempted(n(0)));
    }

    #[test]
    fn past_deadline_stops_before_first_round() {
        let g = abc();
        let mut epi = Epidemic::new(&g, params(1.0), rng(0));
        let _ = epi.seed(n(0));
        let outcome = epi.simulate_with_deadline(Instant::now());
        assert_eq!(outcome, SimulationOutcome::DeadlineExceeded { rounds: 0 });
        assert_eq!(epi.infected().len(), 1);
        // Still resumable.
        let sample = epi.simulate();
        assert_eq!(sample.length, 3);
    }

    #[test]
    fn generous_deadline_completes() {
        let g = abc();
        let mut epi = Epidemic::new(&g, params(1.0), rng(0));
        let _ = epi.seed(n(0));
        let deadline = Instant::now() + std::time::Duration::from_secs(60);
        match epi.simulate_with_deadline(deadline) {
            SimulationOutcome::Completed(sample) => assert_eq!(sample.length, 3),
            SimulationOutcome::DeadlineExceeded { .. } => panic!("deadline should not expire"),
        }
    }

    #[test]
    fn empty_graph_has_zero_size() {
        let g = HiringGraph::from_edges([], []).unwrap();
        let mut epi = Epidemic::new(&g, params(1.0), rng(0));
        assert_eq!(epi.seed_random(), SeedOutcome::NoSusceptibleNodes);
        let sample = epi.simulate();
        assert!(sample.size.abs() < f64::EPSILON);
        assert_eq!(sample.length, 1);
    }
}
