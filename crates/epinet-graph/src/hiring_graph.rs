//! Hiring graph: institutions as nodes, placements as directed edges.
//!
//! A [`HiringGraph`] is immutable once built. Epidemic trials only read it,
//! so a single graph can be shared (behind an `Arc`) by any number of
//! concurrent trials; per-trial mutable state lives in the epidemic, never
//! in the graph.
//!
//! Internally, an adjacency map indexes outbound edges per node:
//! `BTreeMap<NodeId, Vec<Edge>>`. Multi-edges between the same ordered pair
//! are kept in insertion order. The descendant index is computed once in
//! [`HiringGraphBuilder::build`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use epinet_types::NodeId;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// A directed edge with an optional transmission weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Node the edge departs from.
    pub source: NodeId,
    /// Node the edge arrives at.
    pub target: NodeId,
    /// Multiplier on the transmission probability. `None` means the edge
    /// transmits with the unscaled probability.
    pub weight: Option<f64>,
}

/// Incrementally assembles a [`HiringGraph`].
#[derive(Debug, Clone, Default)]
pub struct HiringGraphBuilder {
    nodes: BTreeSet<NodeId>,
    outbound: BTreeMap<NodeId, Vec<Edge>>,
    edge_count: usize,
}

impl HiringGraphBuilder {
    /// Create an empty builder.
    pub const fn new() -> Self {
        Self {
            nodes: BTreeSet::new(),
            outbound: BTreeMap::new(),
            edge_count: 0,
        }
    }

    /// Add a node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateNode`] if the node was already added.
    pub fn add_node(&mut self, node: NodeId) -> Result<&mut Self, GraphError> {
        if !self.nodes.insert(node) {
            return Err(GraphError::DuplicateNode(node));
        }
        self.outbound.entry(node).or_default();
        Ok(self)
    }

    /// Add a node unless it is already present.
    pub fn ensure_node(&mut self, node: NodeId) -> &mut Self {
        if self.nodes.insert(node) {
            self.outbound.entry(node).or_default();
        }
        self
    }

    /// Add a directed edge. Both endpoints must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownNode`] if either endpoint is missing, or
    /// [`GraphError::InvalidWeight`] if `weight` is negative or not finite.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        weight: Option<f64>,
    ) -> Result<&mut Self, GraphError> {
        for endpoint in [source, target] {
            if !self.nodes.contains(&endpoint) {
                return Err(GraphError::UnknownNode {
                    source_node: source,
                    target_node: target,
                    missing: endpoint,
                });
            }
        }
        if let Some(w) = weight
            && (!w.is_finite() || w < 0.0)
        {
            return Err(GraphError::InvalidWeight {
                source_node: source,
                target_node: target,
                weight: w,
            });
        }

        self.outbound.entry(source).or_default().push(Edge {
            source,
            target,
            weight,
        });
        self.edge_count = self.edge_count.saturating_add(1);
        Ok(self)
    }

    /// Freeze the builder into a graph, computing the descendant index.
    pub fn build(self) -> HiringGraph {
        let descendants = self
            .nodes
            .iter()
            .map(|&node| (node, reachable_from(&self.outbound, node)))
            .collect();

        tracing::debug!(
            nodes = self.nodes.len(),
            edges = self.edge_count,
            "Hiring graph built"
        );

        HiringGraph {
            nodes: self.nodes,
            outbound: self.outbound,
            edge_count: self.edge_count,
            descendants,
        }
    }
}

/// Immutable directed multigraph with a reachability index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiringGraph {
    /// All nodes, in ascending order.
    nodes: BTreeSet<NodeId>,
    /// Outbound adjacency: node -> edges departing from it.
    outbound: BTreeMap<NodeId, Vec<Edge>>,
    /// Total number of edges, counting parallel edges separately.
    edge_count: usize,
    /// Descendant index: node -> nodes reachable by a path of length >= 1.
    descendants: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl HiringGraph {
    /// Start building a graph.
    pub const fn builder() -> HiringGraphBuilder {
        HiringGraphBuilder::new()
    }

    /// Build a graph from a node list and `(source, target, weight)` edges.
    ///
    /// Duplicate nodes in `nodes` are tolerated.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphError`] raised by an edge.
    pub fn from_edges<N, E>(nodes: N, edges: E) -> Result<Self, GraphError>
    where
        N: IntoIterator<Item = NodeId>,
        E: IntoIterator<Item = (NodeId, NodeId, Option<f64>)>,
    {
        let mut builder = HiringGraphBuilder::new();
        for node in nodes {
            builder.ensure_node(node);
        }
        for (source, target, weight) in edges {
            builder.add_edge(source, target, weight)?;
        }
        Ok(builder.build())
    }

    /// Return the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of edges, counting parallel edges separately.
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Iterate over all nodes in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Return the node set.
    pub const fn node_set(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    /// Whether the node is part of the graph.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Return the edges departing from `node`, in insertion order.
    ///
    /// Unknown nodes have no edges.
    pub fn out_edges(&self, node: NodeId) -> &[Edge] {
        self.outbound.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over the direct successors of `node`. A target reached by
    /// several parallel edges appears once per edge.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.out_edges(node).iter().map(|e| e.target)
    }

    /// Return every node reachable from `node` by a directed path of length
    /// at least one. `node` itself is included only if a cycle leads back
    /// to it.
    pub fn descendants(&self, node: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.descendants.get(&node)
    }

    /// Whether `to` is reachable from `from` by a path of length >= 1.
    pub fn is_reachable(&self, from: NodeId, to: NodeId) -> bool {
        self.descendants
            .get(&from)
            .is_some_and(|reach| reach.contains(&to))
    }
}

/// Breadth-first closure of `start`'s successors.
fn reachable_from(outbound: &BTreeMap<NodeId, Vec<Edge>>, start: NodeId) -> BTreeSet<NodeId> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<NodeId> = outbound
        .get(&start)
        .into_iter()
        .flatten()
        .map(|e| e.target)
        .collect();

    while let Some(node) = queue.pop_front() {
        if !seen.insert(node) {
            continue;
        }
        if let Some(edges) = outbound.get(&node) {
            queue.extend(edges.iter().map(|e| e.target).filter(|t| !seen.contains(t)));
        }
    }
    seen
}
