//! Dependency and unified views of a [`Graph`].
//!
//! # Unified Filtering
//!
//! ```text
//! Graph
//!   ↓  node filters      include_types, hide_completed, hide_draft
//!   ↓  edge filters      include_layers, include_relations, both ends kept
//!   ↓  focus (optional)  BFS over kept edges, either direction, ≤ depth hops
//! GraphView
//! ```
//!
//! An empty allow-list means "no restriction". A focus id that did not
//! survive the node filters yields an empty view carrying a
//! [`GraphWarning::FocusNotFound`].

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use keel_core::model::{Layer, NodeType, Relation};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::graph::build::{Edge, Graph, GraphWarning, Node};
use crate::graph::cycles::detect_cycles;
use crate::graph::stats::GraphStats;

/// Options for [`build_unified_graph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphFilter {
    /// Center node for a bounded traversal.
    pub focus_id: Option<String>,
    /// Hop limit around the focus node.
    pub depth: usize,
    pub include_types: Vec<NodeType>,
    pub include_layers: Vec<Layer>,
    pub include_relations: Vec<Relation>,
    pub hide_completed: bool,
    pub hide_draft: bool,
}

impl Default for GraphFilter {
    fn default() -> Self {
        Self {
            focus_id: None,
            depth: 3,
            include_types: Vec::new(),
            include_layers: Vec::new(),
            include_relations: Vec::new(),
            hide_completed: false,
            hide_draft: false,
        }
    }
}

impl GraphFilter {
    fn keeps_node(&self, node: &Node) -> bool {
        (self.include_types.is_empty() || self.include_types.contains(&node.node_type))
            && !(self.hide_completed && node.is_completed())
            && !(self.hide_draft && node.is_draft())
    }

    fn keeps_edge(&self, edge: &Edge) -> bool {
        (self.include_layers.is_empty() || self.include_layers.contains(&edge.layer))
            && (self.include_relations.is_empty() || self.include_relations.contains(&edge.relation))
    }
}

/// A node/edge subset of a [`Graph`] with its own statistics.
///
/// Every list is always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub stats: GraphStats,
    /// Cycles among reference edges of the view.
    pub cycles: Vec<Vec<String>>,
    /// Cycles among structural edges of the view.
    pub hierarchy_cycles: Vec<Vec<String>>,
    /// Ids of nodes with no edge at all.
    pub isolated: Vec<String>,
    pub warnings: Vec<GraphWarning>,
}

impl GraphView {
    fn assemble(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        isolated: Vec<String>,
        warnings: Vec<GraphWarning>,
    ) -> Self {
        let ids = || nodes.iter().map(|n| n.id.as_str());
        let cycles = detect_cycles(ids(), &edges, Edge::is_reference).cycles;
        let hierarchy_cycles = detect_cycles(ids(), &edges, Edge::is_structural).cycles;
        let stats = GraphStats::compute(&nodes, &edges, cycles.len() + hierarchy_cycles.len());

        Self {
            nodes,
            edges,
            stats,
            cycles,
            hierarchy_cycles,
            isolated,
            warnings,
        }
    }
}

/// Every node with only `depends_on` edges.
///
/// `isolated` lists nodes without any edge, structural or reference, in the
/// full graph.
#[must_use]
#[instrument(skip(graph))]
pub fn build_dependency_graph(graph: &Graph) -> GraphView {
    let nodes: Vec<Node> = graph.nodes.values().cloned().collect();
    let edges: Vec<Edge> = graph.edges.iter().filter(|e| e.is_dependency()).cloned().collect();
    let isolated = isolated_ids(&nodes, &graph.edges);

    let view = GraphView::assemble(nodes, edges, isolated, graph.warnings.clone());
    debug!(
        nodes = view.nodes.len(),
        edges = view.edges.len(),
        cycles = view.cycles.len(),
        "dependency view built"
    );
    view
}

/// Both edge layers, filtered and optionally focused.
#[must_use]
#[instrument(skip(graph))]
pub fn build_unified_graph(graph: &Graph, filter: &GraphFilter) -> GraphView {
    let mut warnings = graph.warnings.clone();

    // Step 1: node filters.
    let mut kept: HashSet<&str> = graph
        .nodes
        .values()
        .filter(|n| filter.keeps_node(n))
        .map(|n| n.id.as_str())
        .collect();

    // Step 2: edge filters; both endpoints must survive step 1.
    let mut edges: Vec<&Edge> = graph
        .edges
        .iter()
        .filter(|e| filter.keeps_edge(e))
        .filter(|e| kept.contains(e.from.as_str()) && kept.contains(e.to.as_str()))
        .collect();

    // Step 3: focus.
    if let Some(focus) = filter.focus_id.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        if kept.contains(focus) {
            kept = reachable_within(focus, &edges, filter.depth);
            edges.retain(|e| kept.contains(e.from.as_str()) && kept.contains(e.to.as_str()));
        } else {
            debug!(focus, "focus node not in filtered set");
            warnings.push(GraphWarning::FocusNotFound {
                focus: focus.to_string(),
            });
            kept.clear();
            edges.clear();
        }
    }

    let nodes: Vec<Node> = graph
        .nodes
        .values()
        .filter(|n| kept.contains(n.id.as_str()))
        .cloned()
        .collect();
    let edges: Vec<Edge> = edges.into_iter().cloned().collect();
    let isolated = isolated_ids(&nodes, &edges);

    let view = GraphView::assemble(nodes, edges, isolated, warnings);
    debug!(
        nodes = view.nodes.len(),
        edges = view.edges.len(),
        cycles = view.cycles.len(),
        hierarchy_cycles = view.hierarchy_cycles.len(),
        "unified view built"
    );
    view
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Bounded BFS from `focus` treating every edge as undirected.
fn reachable_within<'a>(focus: &'a str, edges: &[&'a Edge], depth: usize) -> HashSet<&'a str> {
    let mut neighbors: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for edge in edges {
        neighbors.entry(edge.from.as_str()).or_default().insert(edge.to.as_str());
        neighbors.entry(edge.to.as_str()).or_default().insert(edge.from.as_str());
    }

    let mut reached: HashSet<&str> = HashSet::from([focus]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(focus, 0)]);

    while let Some((current, hops)) = queue.pop_front() {
        if hops >= depth {
            continue;
        }
        for &next in neighbors.get(current).into_iter().flatten() {
            if reached.insert(next) {
                queue.push_back((next, hops + 1));
            }
        }
    }

    reached
}

fn isolated_ids(nodes: &[Node], edges: &[Edge]) -> Vec<String> {
    let touched: HashSet<&str> = edges
        .iter()
        .flat_map(|e| [e.from.as_str(), e.to.as_str()])
        .collect();
    nodes
        .iter()
        .filter(|n| !touched.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
