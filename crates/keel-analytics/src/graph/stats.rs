//! Summary statistics for a graph view.
//!
//! # Statistics Provided
//!
//! - **node_count** / **edge_count**: size of the view.
//! - **nodes_by_type** / **edges_by_relation**: breakdown by [`NodeType`]
//!   and [`Relation`].
//! - **density**: `edge_count / (node_count * (node_count - 1))`. Zero for
//!   views with 0 or 1 node.
//! - **weakly_connected_component_count**: disjoint subgraphs when edge
//!   direction is ignored.
//! - **isolated_node_count**: nodes with no edge in the view.
//! - **cycle_count**: reference and hierarchy cycles found in the view.
//! - **max_in_degree** / **max_out_degree**: highest edge counts on a node.

use std::collections::{BTreeMap, HashMap};

use keel_core::model::{NodeType, Relation};
use petgraph::{
    Direction,
    algo::connected_components,
    graph::{DiGraph, NodeIndex},
    visit::IntoNodeIdentifiers,
};
use serde::Serialize;

use crate::graph::build::{Edge, Node};

// ---------------------------------------------------------------------------
// GraphStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    pub edges_by_relation: BTreeMap<Relation, usize>,
    pub density: f64,
    pub weakly_connected_component_count: usize,
    pub isolated_node_count: usize,
    pub cycle_count: usize,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
}

impl GraphStats {
    /// Compute statistics for `nodes` and the `edges` among them.
    ///
    /// Edges with an endpoint outside `nodes` are not counted.
    #[must_use]
    pub fn compute(nodes: &[Node], edges: &[Edge], cycle_count: usize) -> Self {
        let mut graph = DiGraph::<&str, ()>::with_capacity(nodes.len(), edges.len());
        let index: HashMap<&str, _> = nodes
            .iter()
            .map(|n| (n.id.as_str(), graph.add_node(n.id.as_str())))
            .collect();

        let mut edges_by_relation: BTreeMap<Relation, usize> = BTreeMap::new();
        for edge in edges {
            if let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
            {
                graph.add_edge(from, to, ());
                *edges_by_relation.entry(edge.relation).or_default() += 1;
            }
        }

        let mut nodes_by_type: BTreeMap<NodeType, usize> = BTreeMap::new();
        for node in nodes {
            *nodes_by_type.entry(node.node_type).or_default() += 1;
        }

        let degree = |idx: NodeIndex, dir: Direction| graph.neighbors_directed(idx, dir).count();

        let isolated_node_count = graph
            .node_identifiers()
            .filter(|&idx| {
                degree(idx, Direction::Incoming) == 0 && degree(idx, Direction::Outgoing) == 0
            })
            .count();

        let max_in_degree = graph
            .node_identifiers()
            .map(|idx| degree(idx, Direction::Incoming))
            .max()
            .unwrap_or(0);

        let max_out_degree = graph
            .node_identifiers()
            .map(|idx| degree(idx, Direction::Outgoing))
            .max()
            .unwrap_or(0);

        Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            nodes_by_type,
            edges_by_relation,
            density: compute_density(graph.node_count(), graph.edge_count()),
            weakly_connected_component_count: connected_components(&graph),
            isolated_node_count,
            cycle_count,
            max_in_degree,
            max_out_degree,
        }
    }

    /// Return `true` if the view has no edges.
    #[must_use]
    pub const fn is_flat(&self) -> bool {
        self.edge_count == 0
    }
}

#[allow(clippy::cast_precision_loss)]
fn compute_density(node_count: usize, edge_count: usize) -> f64 {
    if node_count < 2 {
        return 0.0_f64;
    }
    let max_edges = (node_count * (node_count - 1)) as f64;
    edge_count as f64 / max_edges
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
