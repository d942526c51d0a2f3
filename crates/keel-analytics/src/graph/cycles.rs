//! Cycle detection over one edge relation at a time.
//!
//! # Algorithm
//!
//! Depth-first search with an explicit frame stack. Each call owns its
//! `visited` and `on_stack` state, so concurrent calls never interfere.
//! When an edge reaches a node that is still on the current DFS path, the
//! path slice from that node to the current node is emitted as one cycle:
//!
//! ```text
//! path: a → b → c      edge c → a      cycle: [a, b, c]
//! ```
//!
//! The search restarts from every unvisited node in id order, so disjoint
//! cycles in disconnected components are all reported and the output is
//! deterministic.
//!
//! The same routine serves both fault classes; callers pick the relation
//! with an edge selector such as [`Edge::is_dependency`] or
//! [`Edge::is_structural`].

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use serde::Serialize;

use crate::graph::build::{Edge, Graph};

/// Every cycle found for one edge relation.
///
/// `cycles` is always present; an acyclic input yields an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Node ids of each cycle, in edge order.
    pub cycles: Vec<Vec<String>>,
    pub has_cycle: bool,
    pub count: usize,
}

impl CycleReport {
    fn from_cycles(cycles: Vec<Vec<String>>) -> Self {
        Self {
            has_cycle: !cycles.is_empty(),
            count: cycles.len(),
            cycles,
        }
    }

    /// The first cycle found, if any.
    #[must_use]
    pub fn first(&self) -> Option<&[String]> {
        self.cycles.first().map(Vec::as_slice)
    }
}

/// Detect cycles among `node_ids` using only edges accepted by `select`.
///
/// Edges whose endpoints are not in `node_ids` are ignored.
#[must_use]
pub fn detect_cycles<'n, I, F>(node_ids: I, edges: &[Edge], select: F) -> CycleReport
where
    I: IntoIterator<Item = &'n str>,
    F: Fn(&Edge) -> bool,
{
    let mut ids: Vec<&str> = node_ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for edge in edges {
        if !select(edge) {
            continue;
        }
        if let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        {
            adjacency[from].push(to);
        }
    }
    for targets in &mut adjacency {
        targets.sort_unstable();
        targets.dedup();
    }

    let mut visited = vec![false; ids.len()];
    let mut on_stack = vec![false; ids.len()];
    let mut path: Vec<usize> = Vec::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    for start in 0..ids.len() {
        if visited[start] {
            continue;
        }

        visited[start] = true;
        on_stack[start] = true;
        path.push(start);

        // Each frame: (node, index of the next neighbor to explore).
        let mut call_stack: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(frame) = call_stack.last_mut() {
            let (current, next) = *frame;

            if let Some(&target) = adjacency[current].get(next) {
                frame.1 += 1;

                if on_stack[target] {
                    if let Some(pos) = path.iter().position(|&n| n == target) {
                        cycles.push(path[pos..].iter().map(|&n| ids[n].to_string()).collect());
                    }
                } else if !visited[target] {
                    visited[target] = true;
                    on_stack[target] = true;
                    path.push(target);
                    call_stack.push((target, 0));
                }
            } else {
                call_stack.pop();
                path.pop();
                on_stack[current] = false;
            }
        }
    }

    CycleReport::from_cycles(cycles)
}

/// Cycles among `depends_on` edges of the whole graph.
#[must_use]
pub fn find_dependency_cycles(graph: &Graph) -> CycleReport {
    detect_cycles(
        graph.nodes.keys().map(String::as_str),
        &graph.edges,
        Edge::is_dependency,
    )
}

/// Cycles among `parent → child` edges of the whole graph.
#[must_use]
pub fn find_hierarchy_cycles(graph: &Graph) -> CycleReport {
    detect_cycles(
        graph.nodes.keys().map(String::as_str),
        &graph.edges,
        Edge::is_structural,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use keel_core::model::{Entity, NodeType, Relation};

    use super::*;

    fn deps(edges: &[(&str, &str)]) -> Vec<Edge> {
        edges
            .iter()
            .map(|&(from, to)| Edge::new(from, to, Relation::DependsOn))
            .collect()
    }

    fn parents(edges: &[(&str, &str)]) -> Vec<Edge> {
        edges
            .iter()
            .map(|&(from, to)| Edge::new(from, to, Relation::Parent))
            .collect()
    }

    #[test]
    fn empty_input_has_no_cycles() {
        let report = detect_cycles(Vec::<&str>::new(), &[], Edge::is_dependency);
        assert_eq!(report, CycleReport::default());
        assert!(report.cycles.is_empty());
    }

    #[test]
    fn chain_is_acyclic() {
        let edges = deps(&[("a", "b"), ("b", "c"), ("a", "c")]);
        let report = detect_cycles(["a", "b", "c"], &edges, Edge::is_dependency);
        assert!(!report.has_cycle);
        assert_eq!(report.count, 0);
    }

    #[test]
    fn three_node_cycle_in_edge_order() {
        let edges = deps(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let report = detect_cycles(["c", "b", "a"], &edges, Edge::is_dependency);
        assert!(report.has_cycle);
        assert_eq!(report.cycles, vec![vec!["a", "b", "c"]]);
        assert_eq!(report.first().map(<[String]>::len), Some(3));
    }

    #[test]
    fn disjoint_cycles_are_all_reported() {
        let edges = deps(&[("a", "b"), ("b", "a"), ("x", "y"), ("y", "z"), ("z", "x")]);
        let report = detect_cycles(["a", "b", "x", "y", "z", "lonely"], &edges, Edge::is_dependency);
        assert_eq!(report.count, 2);
        assert_eq!(report.cycles[0], vec!["a", "b"]);
        assert_eq!(report.cycles[1], vec!["x", "y", "z"]);
    }

    #[test]
    fn self_loop_is_a_one_node_cycle() {
        let edges = deps(&[("a", "a")]);
        let report = detect_cycles(["a"], &edges, Edge::is_dependency);
        assert_eq!(report.cycles, vec![vec!["a"]]);
    }

    #[test]
    fn selector_restricts_the_relation() {
        let mut edges = deps(&[("a", "b")]);
        edges.extend(parents(&[("b", "a")]));
        let ids = ["a", "b"];
        assert!(!detect_cycles(ids, &edges, Edge::is_dependency).has_cycle);
        assert!(!detect_cycles(ids, &edges, Edge::is_structural).has_cycle);
        assert!(detect_cycles(ids, &edges, |_: &Edge| true).has_cycle);
    }

    #[test]
    fn edges_into_unknown_nodes_are_ignored() {
        let edges = deps(&[("a", "ghost"), ("ghost", "a")]);
        let report = detect_cycles(["a"], &edges, Edge::is_dependency);
        assert!(!report.has_cycle);
    }

    #[test]
    fn long_chain_does_not_overflow() {
        let names: Vec<String> = (0..50_000).map(|i| format!("n{i:05}")).collect();
        let mut edges: Vec<Edge> = names
            .windows(2)
            .map(|w| Edge::new(w[0].clone(), w[1].clone(), Relation::DependsOn))
            .collect();
        edges.push(Edge::new(
            names[names.len() - 1].clone(),
            names[0].clone(),
            Relation::DependsOn,
        ));
        let report = detect_cycles(names.iter().map(String::as_str), &edges, Edge::is_dependency);
        assert_eq!(report.count, 1);
        assert_eq!(report.cycles[0].len(), names.len());
    }

    #[test]
    fn graph_wrappers_split_fault_classes() {
        let entities = vec![
            Entity::new("a", NodeType::WorkItem, "A")
                .with_parent("b")
                .with_dependencies(["c"]),
            Entity::new("b", NodeType::WorkItem, "B").with_parent("a"),
            Entity::new("c", NodeType::WorkItem, "C"),
        ];
        let graph = Graph::from_entities(&entities).expect("build");
        assert!(!find_dependency_cycles(&graph).has_cycle);
        let hierarchy = find_hierarchy_cycles(&graph);
        assert_eq!(hierarchy.cycles, vec![vec!["a", "b"]]);
    }

    #[test]
    fn self_references_surface_as_graph_cycles() {
        let entities = vec![
            Entity::new("a", NodeType::WorkItem, "A").with_dependencies(["a"]),
            Entity::new("b", NodeType::WorkItem, "B").with_parent("b"),
        ];
        let graph = Graph::from_entities(&entities).expect("build");
        assert_eq!(find_dependency_cycles(&graph).cycles, vec![vec!["a"]]);
        assert_eq!(find_hierarchy_cycles(&graph).cycles, vec![vec!["b"]]);
    }
}
