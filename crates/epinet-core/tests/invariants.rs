//! Property checks for the epidemic state machine on randomly generated
//! hiring graphs.
//!
//! Each test sweeps a range of generator seeds, builds a random directed
//! multigraph (optionally weighted, possibly with self-loops and cycles),
//! and checks a structural invariant of the simulation on it.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::cast_precision_loss,
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc
)]

use std::collections::BTreeSet;

use epinet_core::jump::eligible_targets;
use epinet_core::{Epidemic, EpidemicParams};
use epinet_graph::HiringGraph;
use epinet_types::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEEDS: u64 = 64;

fn random_graph(rng: &mut StdRng, weighted: bool) -> HiringGraph {
    let n = rng.random_range(1..=12_u32);
    let m = rng.random_range(0..=n * 3);
    let mut edges = Vec::new();
    for _ in 0..m {
        let source = NodeId(rng.random_range(0..n));
        let target = NodeId(rng.random_range(0..n));
        let weight = if weighted { Some(rng.random::<f64>()) } else { None };
        edges.push((source, target, weight));
    }
    HiringGraph::from_edges((0..n).map(NodeId), edges).unwrap()
}

fn random_params(rng: &mut StdRng) -> EpidemicParams {
    let base = EpidemicParams::new(rng.random::<f64>()).unwrap();
    if rng.random_bool(0.5) {
        base.with_random_jump(rng.random::<f64>(), rng.random_range(0..4))
            .unwrap()
    } else {
        base
    }
}

fn start_node(rng: &mut StdRng, graph: &HiringGraph) -> NodeId {
    let count = u32::try_from(graph.node_count()).unwrap();
    NodeId(rng.random_range(0..count))
}

#[test]
fn infection_only_grows_and_states_stay_disjoint() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let graph = random_graph(&mut rng, seed % 2 == 0);
        let params = random_params(&mut rng);
        let start = start_node(&mut rng, &graph);

        let mut epi = Epidemic::new(&graph, params, StdRng::seed_from_u64(seed));
        assert!(epi.seed(start).is_infected());

        let mut previous: BTreeSet<NodeId> = epi.infected().clone();
        while epi.step().is_some() {
            assert!(previous.is_subset(epi.infected()), "seed {seed}");
            assert!(epi.infected().is_disjoint(epi.susceptible()), "seed {seed}");
            assert_eq!(
                epi.infected().len() + epi.susceptible().len(),
                graph.node_count()
            );
            previous.clone_from(epi.infected());
        }
    }
}

#[test]
fn every_edge_is_drawn_at_most_once() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let graph = random_graph(&mut rng, seed % 3 == 0);
        let params = random_params(&mut rng);
        let start = start_node(&mut rng, &graph);

        let mut epi = Epidemic::new(&graph, params, StdRng::seed_from_u64(seed));
        assert!(epi.seed(start).is_infected());
        epi.simulate();

        // One draw per distinct ordered pair, no matter how often the
        // source was rescanned or how many parallel edges exist.
        assert_eq!(epi.edge_draws(), epi.visited_edge_count(), "seed {seed}");
        let pairs: BTreeSet<(NodeId, NodeId)> = graph
            .nodes()
            .flat_map(|u| graph.successors(u).map(move |v| (u, v)))
            .collect();
        assert!(epi.visited_edge_count() <= pairs.len());
        for u in graph.nodes() {
            for v in graph.nodes() {
                if epi.edge_attempted(u, v) {
                    assert!(pairs.contains(&(u, v)), "seed {seed}");
                    assert!(epi.is_infected(u));
                }
            }
        }
    }
}

#[test]
fn simulation_terminates_within_node_count_rounds() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let graph = random_graph(&mut rng, seed % 2 == 1);
        let params = random_params(&mut rng);
        let start = start_node(&mut rng, &graph);

        let mut epi = Epidemic::new(&graph, params, StdRng::seed_from_u64(seed));
        assert!(epi.seed(start).is_infected());
        let sample = epi.simulate();

        let n = graph.node_count();
        assert!(epi.is_complete());
        assert!(sample.length >= 1);
        assert!(sample.length <= u64::try_from(n).unwrap(), "seed {seed}");
        assert!(sample.size >= 1.0 / n as f64 - 1e-12);
        assert!(sample.size <= 1.0 + 1e-12);
        assert!((sample.size - epi.infected().len() as f64 / n as f64).abs() < 1e-12);
        assert_eq!(epi.history().len(), usize::try_from(sample.length).unwrap());
        assert!(epi.step().is_none());
    }
}

#[test]
fn same_seed_reproduces_the_trajectory() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let graph = random_graph(&mut rng, true);
        let params = random_params(&mut rng);
        let start = start_node(&mut rng, &graph);

        let run = |trial_seed: u64| {
            let mut epi = Epidemic::new(&graph, params, StdRng::seed_from_u64(trial_seed));
            assert!(epi.seed(start).is_infected());
            let sample = epi.simulate();
            (sample, epi.history().to_vec(), epi.infected().clone())
        };
        assert_eq!(run(seed), run(seed), "seed {seed}");
    }
}

#[test]
fn certain_transmission_infects_exactly_the_descendants() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let graph = random_graph(&mut rng, false);
        let start = start_node(&mut rng, &graph);

        let params = EpidemicParams::new(1.0).unwrap();
        let mut epi = Epidemic::new(&graph, params, StdRng::seed_from_u64(seed));
        assert!(epi.seed(start).is_infected());
        epi.simulate();

        let mut expected: BTreeSet<NodeId> = graph.descendants(start).unwrap().clone();
        expected.insert(start);
        assert_eq!(epi.infected(), &expected, "seed {seed}");
    }
}

#[test]
fn jumps_never_land_on_descendants_of_their_source() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let graph = random_graph(&mut rng, false);
        let start = start_node(&mut rng, &graph);

        // No edge transmission, so after round one every extra infection
        // is a jump made by `start`.
        let params = EpidemicParams::new(0.0)
            .unwrap()
            .with_random_jump(1.0, 1)
            .unwrap();
        let mut epi = Epidemic::new(&graph, params, StdRng::seed_from_u64(seed));
        assert!(epi.seed(start).is_infected());

        let before: BTreeSet<NodeId> = [start].into_iter().collect();
        let eligible = eligible_targets(&graph, start, &before);
        let report = epi.step().unwrap();

        let fresh: BTreeSet<NodeId> = graph.successors(start).filter(|&v| v != start).collect();
        assert_eq!(report.edge_attempts, fresh.len());
        assert_eq!(report.jump_attempts, eligible.len().min(1));
        assert_eq!(report.newly_infected, report.jump_attempts);
        for node in epi.infected() {
            if *node != start {
                assert!(eligible.contains(node), "seed {seed}");
                assert!(!graph.is_reachable(start, *node), "seed {seed}");
            }
        }
        assert!(epi.jump_attempted(start));
    }
}
