//! Weighted affinity between nodes and the clusters it implies.
//!
//! # Overview
//!
//! Two nodes are related when they share at least one *signal*. A pair's
//! score is the sum of the weights of the distinct signals it carries, so a
//! pair that is both siblings and WBS-adjacent scores higher than either
//! alone. Only related pairs are materialized; the result is a sparse edge
//! list, never the full pairwise matrix.
//!
//! | Signal           | Source |
//! |------------------|--------|
//! | `parent_child`   | structural edge |
//! | `sibling`        | same parent |
//! | `wbs_adjacency`  | same parent code prefix, last segments differ by one |
//! | `reference`      | any reference edge |
//! | `shared_category`| same `category` |
//! | `hub_link`       | child of a hub parent, to that parent |
//!
//! Pair keys are ordered `(min, max)`, so `score(a, b) == score(b, a)`.
//!
//! # Hub mode
//!
//! A parent with more than `max_siblings` children would cost O(k²)
//! sibling pairs. Instead it becomes a *hub*: each child gets one
//! `hub_link` to the parent and no sibling, WBS-adjacency, or
//! shared-category pairs are formed within that family. Category groups
//! larger than `max_siblings` have no natural hub and are skipped.
//!
//! # Clusters
//!
//! Connected components (size ≥ 2) of the retained edges, via petgraph's
//! `UnionFind`. Each cluster is named after its anchor: a hub member if
//! there is one, else the member with the highest weighted degree (ties by
//! id).

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use keel_core::config::{AffinityOptions, AffinityWeights};
use keel_core::model::NodeType;
use petgraph::unionfind::UnionFind;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::graph::Graph;
use crate::wbs::{build_wbs, code_segments};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One reason two nodes are related.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ParentChild,
    Sibling,
    WbsAdjacency,
    Reference,
    SharedCategory,
    HubLink,
}

impl Signal {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParentChild => "parent_child",
            Self::Sibling => "sibling",
            Self::WbsAdjacency => "wbs_adjacency",
            Self::Reference => "reference",
            Self::SharedCategory => "shared_category",
            Self::HubLink => "hub_link",
        }
    }

    #[must_use]
    pub const fn weight(self, weights: &AffinityWeights) -> f64 {
        match self {
            Self::ParentChild => weights.parent_child,
            Self::Sibling => weights.sibling,
            Self::WbsAdjacency => weights.wbs_adjacency,
            Self::Reference => weights.reference,
            Self::SharedCategory => weights.shared_category,
            Self::HubLink => weights.hub,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffinityNode {
    pub id: String,
    pub title: String,
    pub node_type: NodeType,
    /// Id of the cluster this node belongs to, if any.
    pub cluster: Option<String>,
    pub is_hub: bool,
    /// Number of retained edges touching this node.
    pub degree: usize,
}

/// A retained pair. `source < target`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffinityEdge {
    pub source: String,
    pub target: String,
    pub score: f64,
    pub signals: Vec<Signal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub label: String,
    pub anchor: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AffinityStats {
    pub node_count: usize,
    /// Related pairs before score and size limits.
    pub candidate_pairs: usize,
    pub edge_count: usize,
    pub dropped_below_min: usize,
    pub truncated: usize,
    pub hub_count: usize,
    pub cluster_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffinityResult {
    pub nodes: Vec<AffinityNode>,
    /// Highest score first.
    pub edges: Vec<AffinityEdge>,
    pub clusters: Vec<Cluster>,
    /// The weight table actually used.
    pub weights: AffinityWeights,
    pub stats: AffinityStats,
}

impl AffinityResult {
    /// Score of the retained edge between `a` and `b`, in either order.
    #[must_use]
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        let (lo, hi) = ordered(a, b);
        self.edges
            .iter()
            .find(|e| e.source == lo && e.target == hi)
            .map(|e| e.score)
    }

    /// Cluster containing `id`, if any.
    #[must_use]
    pub fn cluster_of(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.members.iter().any(|m| m == id))
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Accumulates signals per unordered pair.
#[derive(Default)]
struct PairSignals<'a> {
    pairs: BTreeMap<(&'a str, &'a str), BTreeSet<Signal>>,
}

impl<'a> PairSignals<'a> {
    fn add(&mut self, a: &'a str, b: &'a str, signal: Signal) {
        if a == b {
            return;
        }
        self.pairs.entry(ordered(a, b)).or_default().insert(signal);
    }
}

/// Compute affinity edges and clusters for every node of `graph`.
#[must_use]
#[instrument(skip(graph))]
pub fn calculate_affinity(graph: &Graph, options: &AffinityOptions) -> AffinityResult {
    let weights = &options.weights;
    let mut signals = PairSignals::default();

    // --- Structure: parent/child, siblings, hubs ---
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in graph.edges.iter().filter(|e| e.is_structural() && e.from != e.to) {
        signals.add(&edge.from, &edge.to, Signal::ParentChild);
        children.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
    }

    let mut hubs: BTreeSet<&str> = BTreeSet::new();
    let mut hub_of: HashMap<&str, &str> = HashMap::new();
    for (&parent, kids) in &children {
        if kids.len() > options.max_siblings {
            hubs.insert(parent);
            for &kid in kids {
                signals.add(parent, kid, Signal::HubLink);
                hub_of.insert(kid, parent);
            }
        } else {
            for (i, &a) in kids.iter().enumerate() {
                for &b in &kids[i + 1..] {
                    signals.add(a, b, Signal::Sibling);
                }
            }
        }
    }
    let same_hub_family =
        |a: &str, b: &str| matches!((hub_of.get(a), hub_of.get(b)), (Some(x), Some(y)) if x == y);

    // --- WBS adjacency ---
    let codes: BTreeMap<&str, String> = match build_wbs(graph) {
        Ok(tree) => tree
            .codes()
            .into_iter()
            .filter_map(|(id, code)| graph.nodes.get_key_value(id).map(|(k, _)| (k.as_str(), code.to_string())))
            .collect(),
        Err(err) => {
            debug!(%err, "falling back to declared WBS codes");
            graph
                .nodes
                .values()
                .filter_map(|n| n.wbs_code.clone().map(|c| (n.id.as_str(), c)))
                .collect()
        }
    };
    for (a, b) in wbs_adjacent_pairs(&codes) {
        if !same_hub_family(a, b) {
            signals.add(a, b, Signal::WbsAdjacency);
        }
    }

    // --- References ---
    for edge in graph.edges.iter().filter(|e| e.is_reference()) {
        signals.add(&edge.from, &edge.to, Signal::Reference);
    }

    // --- Shared category ---
    let mut categories: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for node in graph.nodes.values() {
        if let Some(category) = node.category.as_deref() {
            categories.entry(category).or_default().push(node.id.as_str());
        }
    }
    for members in categories.values() {
        if members.len() > options.max_siblings {
            continue;
        }
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                if !same_hub_family(a, b) {
                    signals.add(a, b, Signal::SharedCategory);
                }
            }
        }
    }

    // --- Score, filter, truncate ---
    let candidate_pairs = signals.pairs.len();
    let mut edges: Vec<AffinityEdge> = signals
        .pairs
        .into_iter()
        .map(|((source, target), set)| AffinityEdge {
            source: source.to_string(),
            target: target.to_string(),
            score: set.iter().map(|s| s.weight(weights)).sum(),
            signals: set.into_iter().collect(),
        })
        .collect();

    let before = edges.len();
    edges.retain(|e| e.score >= options.min_score);
    let dropped_below_min = before - edges.len();

    edges.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.target.cmp(&b.target))
    });
    let mut truncated = 0;
    if let Some(max) = options.max_edges {
        truncated = edges.len().saturating_sub(max);
        edges.truncate(max);
    }

    // --- Clusters ---
    let (clusters, cluster_of) = build_clusters(graph, &edges, &hubs);

    let mut degree: HashMap<&str, usize> = HashMap::new();
    for edge in &edges {
        *degree.entry(edge.source.as_str()).or_default() += 1;
        *degree.entry(edge.target.as_str()).or_default() += 1;
    }

    let nodes: Vec<AffinityNode> = graph
        .nodes
        .values()
        .map(|n| AffinityNode {
            id: n.id.clone(),
            title: n.title.clone(),
            node_type: n.node_type,
            cluster: cluster_of.get(n.id.as_str()).cloned(),
            is_hub: hubs.contains(n.id.as_str()),
            degree: degree.get(n.id.as_str()).copied().unwrap_or(0),
        })
        .collect();

    let stats = AffinityStats {
        node_count: nodes.len(),
        candidate_pairs,
        edge_count: edges.len(),
        dropped_below_min,
        truncated,
        hub_count: hubs.len(),
        cluster_count: clusters.len(),
    };

    debug!(
        candidates = stats.candidate_pairs,
        edges = stats.edge_count,
        hubs = stats.hub_count,
        clusters = stats.cluster_count,
        "affinity computed"
    );

    AffinityResult {
        nodes,
        edges,
        clusters,
        weights: weights.clone(),
        stats,
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Pairs whose codes share a parent prefix and whose last segments differ
/// by one. Root codes have no parent prefix and are never adjacent.
fn wbs_adjacent_pairs<'a>(codes: &BTreeMap<&'a str, String>) -> Vec<(&'a str, &'a str)> {
    let mut groups: BTreeMap<Vec<u64>, Vec<(u64, &'a str)>> = BTreeMap::new();
    for (&id, code) in codes {
        let mut segments = code_segments(code);
        let Some(last) = segments.pop() else {
            continue;
        };
        if segments.is_empty() {
            continue;
        }
        groups.entry(segments).or_default().push((last, id));
    }

    let mut pairs = Vec::new();
    for members in groups.values_mut() {
        members.sort_unstable();
        for window in members.windows(2) {
            let ((a_pos, a), (b_pos, b)) = (window[0], window[1]);
            if a_pos != u64::MAX && b_pos == a_pos + 1 {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

/// Connected components of the retained edges, named after their anchors.
fn build_clusters<'g>(
    graph: &'g Graph,
    edges: &[AffinityEdge],
    hubs: &BTreeSet<&str>,
) -> (Vec<Cluster>, HashMap<&'g str, String>) {
    let ids: Vec<&str> = graph.nodes.keys().map(String::as_str).collect();
    let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut uf = UnionFind::<usize>::new(ids.len());
    let mut weighted_degree = vec![0.0_f64; ids.len()];
    for edge in edges {
        if let (Some(&a), Some(&b)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
            uf.union(a, b);
            weighted_degree[a] += edge.score;
            weighted_degree[b] += edge.score;
        }
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, root) in uf.into_labeling().into_iter().enumerate() {
        components.entry(root).or_default().push(i);
    }

    // Members are in id order, so the first member names the component.
    let mut groups: Vec<Vec<usize>> = components.into_values().filter(|m| m.len() >= 2).collect();
    groups.sort_by_key(|members| members[0]);

    let mut clusters = Vec::with_capacity(groups.len());
    let mut cluster_of: HashMap<&'g str, String> = HashMap::new();
    for (n, members) in groups.into_iter().enumerate() {
        let anchor = members
            .iter()
            .copied()
            .max_by(|&a, &b| {
                hubs.contains(ids[a])
                    .cmp(&hubs.contains(ids[b]))
                    .then_with(|| weighted_degree[a].total_cmp(&weighted_degree[b]))
                    .then_with(|| b.cmp(&a))
            })
            .unwrap_or(members[0]);

        let id = format!("cluster-{}", n + 1);
        let anchor_id = ids[anchor];
        let label = graph
            .node(anchor_id)
            .map(|node| node.title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or(anchor_id)
            .to_string();

        for &m in &members {
            cluster_of.insert(ids[m], id.clone());
        }
        clusters.push(Cluster {
            id,
            label,
            anchor: anchor_id.to_string(),
            members: members.iter().map(|&m| ids[m].to_string()).collect(),
        });
    }

    (clusters, cluster_of)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use keel_core::model::Entity;

    use super::*;

    fn item(id: &str) -> Entity {
        Entity::new(id, NodeType::WorkItem, format!("Item {id}"))
    }

    fn affinity(entities: &[Entity], options: &AffinityOptions) -> AffinityResult {
        let graph = Graph::from_entities(entities).expect("graph");
        calculate_affinity(&graph, options)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_graph() {
        let result = affinity(&[], &AffinityOptions::default());
        assert!(result.nodes.is_empty());
        assert!(result.edges.is_empty());
        assert!(result.clusters.is_empty());
        assert_eq!(result.weights, AffinityWeights::default());
    }

    #[test]
    fn signals_accumulate_per_pair() {
        let result = affinity(
            &[
                item("p"),
                item("a").with_parent("p").with_category("ux"),
                item("b").with_parent("p").with_category("ux").with_dependencies(["a"]),
            ],
            &AffinityOptions::default(),
        );
        let w = AffinityWeights::default();

        let ab = result.edges.iter().find(|e| e.source == "a" && e.target == "b").expect("a-b edge");
        assert_eq!(
            ab.signals,
            vec![
                Signal::Sibling,
                Signal::WbsAdjacency,
                Signal::Reference,
                Signal::SharedCategory
            ]
        );
        let expected = w.sibling + w.wbs_adjacency + w.reference + w.shared_category;
        assert!(close(ab.score, expected), "score {} != {expected}", ab.score);

        let pa = result.score("p", "a").expect("p-a edge");
        assert!(close(pa, w.parent_child));
        assert_eq!(result.score("a", "b"), result.score("b", "a"));
    }

    #[test]
    fn hub_mode_replaces_sibling_pairs() {
        let mut entities = vec![item("hub")];
        for i in 0..10 {
            entities.push(item(&format!("c{i}")).with_parent("hub"));
        }
        let options = AffinityOptions {
            max_siblings: 3,
            ..AffinityOptions::default()
        };
        let result = affinity(&entities, &options);

        assert_eq!(result.stats.hub_count, 1);
        assert!(result.nodes.iter().any(|n| n.id == "hub" && n.is_hub));
        assert_eq!(result.edges.len(), 10);
        for edge in &result.edges {
            assert!(edge.source == "hub" || edge.target == "hub", "{edge:?}");
            assert_eq!(edge.signals, vec![Signal::ParentChild, Signal::HubLink]);
        }
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].anchor, "hub");
        assert_eq!(result.clusters[0].label, "Item hub");
        assert_eq!(result.clusters[0].members.len(), 11);
    }

    #[test]
    fn small_families_keep_sibling_pairs() {
        let result = affinity(
            &[
                item("p"),
                item("a").with_parent("p"),
                item("b").with_parent("p"),
                item("c").with_parent("p"),
            ],
            &AffinityOptions {
                max_siblings: 3,
                ..AffinityOptions::default()
            },
        );
        assert_eq!(result.stats.hub_count, 0);
        for (x, y) in [("a", "b"), ("a", "c"), ("b", "c")] {
            let edge = result
                .edges
                .iter()
                .find(|e| e.source == x && e.target == y)
                .expect("sibling edge");
            assert!(edge.signals.contains(&Signal::Sibling));
        }
        // a=1.1, c=1.3: siblings but not adjacent.
        let ac = result.edges.iter().find(|e| e.source == "a" && e.target == "c").expect("a-c");
        assert!(!ac.signals.contains(&Signal::WbsAdjacency));
    }

    #[test]
    fn oversized_category_groups_are_skipped() {
        let entities: Vec<Entity> = (0..4).map(|i| item(&format!("n{i}")).with_category("ops")).collect();
        let options = AffinityOptions {
            max_siblings: 3,
            ..AffinityOptions::default()
        };
        let result = affinity(&entities, &options);
        assert!(result.edges.iter().all(|e| !e.signals.contains(&Signal::SharedCategory)));
    }

    #[test]
    fn min_score_and_max_edges_bound_the_output() {
        let entities = vec![
            item("p"),
            item("a").with_parent("p"),
            item("b").with_parent("p"),
            item("x").with_category("k"),
            item("y").with_category("k"),
        ];
        let all = affinity(&entities, &AffinityOptions::default());
        // x-y is shared category alone (0.3).
        let filtered = affinity(
            &entities,
            &AffinityOptions {
                min_score: 0.5,
                ..AffinityOptions::default()
            },
        );
        assert!(filtered.edges.iter().all(|e| e.score >= 0.5));
        assert_eq!(
            filtered.stats.dropped_below_min,
            all.edges.len() - filtered.edges.len()
        );

        let capped = affinity(
            &entities,
            &AffinityOptions {
                max_edges: Some(2),
                ..AffinityOptions::default()
            },
        );
        assert_eq!(capped.edges.len(), 2);
        assert_eq!(capped.stats.truncated, all.edges.len() - 2);
        assert!(capped.edges[0].score >= capped.edges[1].score);
        assert!(close(capped.edges[0].score, all.edges[0].score));
    }

    #[test]
    fn weights_are_runtime_values() {
        let mut options = AffinityOptions::default();
        options.weights.parent_child = 5.0;
        let result = affinity(&[item("p"), item("c").with_parent("p")], &options);
        assert!(close(result.score("c", "p").unwrap_or_default(), 5.0));
        assert!(close(result.weights.parent_child, 5.0));
    }

    #[test]
    fn clusters_are_connected_components() {
        let result = affinity(
            &[
                item("a").with_dependencies(["b"]),
                item("b"),
                item("c").with_dependencies(["d"]),
                item("d").with_dependencies(["e"]),
                item("e"),
                item("lonely"),
            ],
            &AffinityOptions::default(),
        );

        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.clusters[0].id, "cluster-1");
        assert_eq!(result.clusters[0].members, vec!["a", "b"]);
        assert_eq!(result.clusters[1].members, vec!["c", "d", "e"]);
        assert_eq!(result.clusters[1].anchor, "d");
        assert!(result.cluster_of("lonely").is_none());
        assert_eq!(
            result.nodes.iter().find(|n| n.id == "d").map(|n| n.degree),
            Some(2)
        );
    }

    #[test]
    fn unrelated_trees_stay_separate_clusters() {
        let result = affinity(
            &[
                Entity::new("obj-a", NodeType::Objective, "A"),
                Entity::new("obj-b", NodeType::Objective, "B"),
                item("wi-a").with_parent("obj-a"),
                item("wi-b").with_parent("obj-b"),
                item("loner"),
            ],
            &AffinityOptions::default(),
        );

        assert!(result.edges.iter().all(|e| !e.signals.contains(&Signal::WbsAdjacency)));
        let members: Vec<Vec<&str>> = result
            .clusters
            .iter()
            .map(|c| c.members.iter().map(String::as_str).collect())
            .collect();
        assert_eq!(members, vec![vec!["obj-a", "wi-a"], vec!["obj-b", "wi-b"]]);
        assert!(result.cluster_of("loner").is_none());
    }

    #[test]
    fn declared_root_codes_are_not_adjacent() {
        let result = affinity(
            &[
                item("a").with_wbs_code("1"),
                item("b").with_wbs_code("2"),
            ],
            &AffinityOptions::default(),
        );
        assert!(result.edges.is_empty());
    }

    #[test]
    fn own_parent_adds_no_family() {
        let result = affinity(
            &[item("a").with_parent("a"), item("b").with_parent("a")],
            &AffinityOptions::default(),
        );
        let ab = result.edges.iter().find(|e| e.source == "a" && e.target == "b").expect("a-b edge");
        assert_eq!(ab.signals, vec![Signal::ParentChild]);
    }

    #[test]
    fn hierarchy_cycle_falls_back_to_declared_codes() {
        let result = affinity(
            &[
                item("a").with_parent("b").with_wbs_code("2.1"),
                item("b").with_parent("a").with_wbs_code("2.2"),
            ],
            &AffinityOptions::default(),
        );
        let ab = result.edges.iter().find(|e| e.source == "a").expect("a-b edge");
        assert!(ab.signals.contains(&Signal::WbsAdjacency));
        assert!(ab.signals.contains(&Signal::ParentChild));
    }
}
