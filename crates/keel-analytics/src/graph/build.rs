//! Graph construction from an entity snapshot.
//!
//! # Overview
//!
//! [`Graph::from_entities`] turns the flat entity list handed over by the
//! entity store into typed [`Node`]s plus a derived [`Edge`] list. Every
//! analytics component works from this one value.
//!
//! ## Edge Direction
//!
//! - Structural edges run `parent → child` (relation `parent`).
//! - Reference edges run from the entity holding the field to the entity it
//!   names. `A.dependencies = [B]` becomes `A → B` with relation
//!   `depends_on`; a deliverable's `objective_id` becomes
//!   `deliverable → objective` with relation `contributes`.
//!
//! ## Degraded Input
//!
//! Only duplicate ids abort construction. Dangling parents, dangling or
//! self references, unparseable dates, and out-of-range progress are
//! recorded as [`GraphWarning`]s and the offending value is dropped or
//! clamped. A node that is its own parent or its own dependency keeps that
//! edge, so the cycle detector, WBS builder, and scheduler see it.
//!
//! ## Cache Invalidation
//!
//! [`Graph::content_hash`] is a BLAKE3 hash over the sorted node and edge
//! sets. It changes only when something an analyzer reads changes.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use keel_core::model::{
    self, Entity, Layer, NodeType, Relation, is_completed_status, is_draft_status,
};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::AnalyticsError;

// ---------------------------------------------------------------------------
// Node / Edge
// ---------------------------------------------------------------------------

/// One planning entity as a graph vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub title: String,
    pub status: String,
    /// Completion percentage, clamped to `0..=100`.
    pub progress: u8,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Declared parent id, kept even when it does not resolve.
    pub parent_id: Option<String>,
    /// Position code as declared by the store (not the computed WBS code).
    pub wbs_code: Option<String>,
    pub dependencies: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Node {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        is_completed_status(&self.status)
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        is_draft_status(&self.status)
    }

    /// Whether the node carries at least one schedule date.
    #[must_use]
    pub const fn is_dated(&self) -> bool {
        self.start_date.is_some() || self.due_date.is_some()
    }
}

/// A derived relation between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub layer: Layer,
    pub relation: Relation,
}

impl Edge {
    /// Build an edge; the layer follows from the relation.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, relation: Relation) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            layer: relation.layer(),
            relation,
        }
    }

    /// Edge selector for `depends_on` edges.
    #[must_use]
    pub fn is_dependency(&self) -> bool {
        self.relation == Relation::DependsOn
    }

    /// Edge selector for `parent → child` edges.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.layer == Layer::Structural
    }

    /// Edge selector for every non-structural edge.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.layer == Layer::Reference
    }

    /// Whether `id` is one of the endpoints.
    #[must_use]
    pub fn touches(&self, id: &str) -> bool {
        self.from == id || self.to == id
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// A non-fatal problem found while building or filtering a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphWarning {
    /// `parent_id` names no known node; the node becomes a root.
    DanglingParent { node: String, parent: String },
    /// A dependency or typed reference names no known node.
    DanglingReference {
        node: String,
        target: String,
        relation: Relation,
    },
    /// A node names itself as a typed reference target (not a parent or
    /// dependency, which become one-node cycles).
    SelfReference { node: String, relation: Relation },
    /// A date field could not be parsed and was ignored.
    InvalidDate {
        node: String,
        field: &'static str,
        value: String,
    },
    /// Progress outside `0..=100` was clamped.
    ProgressClamped {
        node: String,
        value: i64,
        clamped: u8,
    },
    /// The requested focus node is not in the filtered node set.
    FocusNotFound { focus: String },
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingParent { node, parent } => {
                write!(f, "{node}: parent '{parent}' not found")
            }
            Self::DanglingReference {
                node,
                target,
                relation,
            } => write!(f, "{node}: {relation} target '{target}' not found"),
            Self::SelfReference { node, relation } => {
                write!(f, "{node}: {relation} reference to itself ignored")
            }
            Self::InvalidDate { node, field, value } => {
                write!(f, "{node}: invalid {field} '{value}' ignored")
            }
            Self::ProgressClamped {
                node,
                value,
                clamped,
            } => write!(f, "{node}: progress {value} clamped to {clamped}"),
            Self::FocusNotFound { focus } => write!(f, "focus node '{focus}' not found"),
        }
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// The analytics graph of one snapshot.
///
/// Nodes are keyed by id in sorted order; edges are sorted and free of
/// duplicates. Risks and problems are not nodes (see
/// [`NodeType::is_graph_node`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
    pub warnings: Vec<GraphWarning>,
    /// BLAKE3 hash of the node and edge sets, hex encoded.
    pub content_hash: String,
}

impl Graph {
    /// Build the graph from every entity of a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::DuplicateNodeId`] if two entities (of any
    /// kind) share an id.
    #[instrument(skip(entities))]
    pub fn from_entities<'a, I>(entities: I) -> Result<Self, AnalyticsError>
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
        let mut sources: Vec<&Entity> = Vec::new();
        let mut warnings: Vec<GraphWarning> = Vec::new();

        // Step 1: nodes, with value clean-up.
        for entity in entities {
            let id = entity.id.trim();
            if !seen.insert(id) {
                return Err(AnalyticsError::DuplicateNodeId(id.to_string()));
            }
            if !entity.kind.is_graph_node() {
                continue;
            }
            nodes.insert(id.to_string(), to_node(entity, &mut warnings));
            sources.push(entity);
        }

        // Step 2: edges, resolved against the complete node set.
        let mut edges: BTreeSet<Edge> = BTreeSet::new();
        sources.sort_unstable_by(|a, b| a.id.trim().cmp(b.id.trim()));
        for entity in sources {
            let id = entity.id.trim();

            // A self parent or self dependency is kept as a one-node cycle.
            if let Some(parent) = entity.parent() {
                if nodes.contains_key(parent) {
                    edges.insert(Edge::new(parent, id, Relation::Parent));
                } else {
                    warnings.push(GraphWarning::DanglingParent {
                        node: id.to_string(),
                        parent: parent.to_string(),
                    });
                }
            }

            let dependencies = entity
                .dependencies
                .iter()
                .map(|d| d.trim())
                .filter(|d| !d.is_empty())
                .map(|d| (d, Relation::DependsOn));

            for (target, relation) in dependencies.chain(entity.typed_references()) {
                if target == id && relation != Relation::DependsOn {
                    warnings.push(GraphWarning::SelfReference {
                        node: id.to_string(),
                        relation,
                    });
                } else if nodes.contains_key(target) {
                    edges.insert(Edge::new(id, target, relation));
                } else {
                    warnings.push(GraphWarning::DanglingReference {
                        node: id.to_string(),
                        target: target.to_string(),
                        relation,
                    });
                }
            }
        }

        let edges: Vec<Edge> = edges.into_iter().collect();
        let content_hash = compute_content_hash(&nodes, &edges);

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            warnings = warnings.len(),
            "graph built"
        );

        Ok(Self {
            nodes,
            edges,
            warnings,
            content_hash,
        })
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Structural children of `id`, in id order.
    pub fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.is_structural() && e.from == id)
            .map(|e| e.to.as_str())
    }

    /// Nodes that list `id` in their `dependencies`.
    pub fn dependents<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.is_dependency() && e.to == id)
            .map(|e| e.from.as_str())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn to_node(entity: &Entity, warnings: &mut Vec<GraphWarning>) -> Node {
    let id = entity.id.trim().to_string();

    let progress = clamp_progress(entity.progress);
    if i64::from(progress) != entity.progress {
        warnings.push(GraphWarning::ProgressClamped {
            node: id.clone(),
            value: entity.progress,
            clamped: progress,
        });
    }

    let start_date = parse_date_field(&id, "start_date", entity.start_date.as_deref(), warnings);
    let due_date = parse_date_field(&id, "due_date", entity.due_date.as_deref(), warnings);

    let updated_at = entity.updated_at.as_deref().and_then(|raw| {
        let parsed = model::parse_timestamp(raw);
        if parsed.is_none() && !raw.trim().is_empty() {
            warnings.push(GraphWarning::InvalidDate {
                node: id.clone(),
                field: "updated_at",
                value: raw.to_string(),
            });
        }
        parsed
    });

    Node {
        node_type: entity.kind,
        title: entity.title.clone(),
        status: entity.status.clone(),
        progress,
        assignee: non_blank(entity.assignee.as_deref()),
        priority: non_blank(entity.priority.as_deref()),
        category: non_blank(entity.category.as_deref()),
        start_date,
        due_date,
        parent_id: entity.parent().map(str::to_string),
        wbs_code: non_blank(entity.wbs_code.as_deref()),
        dependencies: entity
            .dependencies
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect(),
        updated_at,
        id,
    }
}

fn clamp_progress(value: i64) -> u8 {
    u8::try_from(value.clamp(0, 100)).unwrap_or(100)
}

fn parse_date_field(
    id: &str,
    field: &'static str,
    raw: Option<&str>,
    warnings: &mut Vec<GraphWarning>,
) -> Option<NaiveDate> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    let parsed = model::parse_date(raw);
    if parsed.is_none() {
        warnings.push(GraphWarning::InvalidDate {
            node: id.to_string(),
            field,
            value: raw.to_string(),
        });
    }
    parsed
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// BLAKE3 over the fields analyzers read, in sorted node/edge order.
fn compute_content_hash(nodes: &BTreeMap<String, Node>, edges: &[Edge]) -> String {
    let mut hasher = blake3::Hasher::new();
    for node in nodes.values() {
        for field in [
            node.id.as_str(),
            node.node_type.as_str(),
            node.title.as_str(),
            node.status.as_str(),
            node.category.as_deref().unwrap_or(""),
            node.wbs_code.as_deref().unwrap_or(""),
        ] {
            hasher.update(field.as_bytes());
            hasher.update(b"\x00");
        }
        hasher.update(&[node.progress]);
        for date in [node.start_date, node.due_date] {
            let text = date.map(|d| d.to_string()).unwrap_or_default();
            hasher.update(text.as_bytes());
            hasher.update(b"\x00");
        }
        hasher.update(b"\n");
    }
    for edge in edges {
        hasher.update(edge.from.as_bytes());
        hasher.update(b"\x00");
        hasher.update(edge.to.as_bytes());
        hasher.update(b"\x00");
        hasher.update(edge.relation.as_str().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn wi(id: &str) -> Entity {
        Entity::new(id, NodeType::WorkItem, id.to_uppercase())
    }

    #[test]
    fn empty_snapshot_builds_empty_graph() {
        let graph = Graph::from_entities(&Vec::<Entity>::new()).expect("build");
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.warnings.is_empty());
        assert!(!graph.content_hash.is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let entities = vec![wi("a"), wi("b"), wi("a")];
        let err = Graph::from_entities(&entities).expect_err("duplicate must fail");
        assert_eq!(err, AnalyticsError::DuplicateNodeId("a".into()));
    }

    #[test]
    fn duplicate_across_kinds_is_rejected() {
        let entities = vec![
            Entity::new("x-1", NodeType::Objective, "Obj"),
            Entity::new("x-1", NodeType::Risk, "Risk"),
        ];
        assert!(Graph::from_entities(&entities).is_err());
    }

    #[test]
    fn risks_and_problems_are_not_nodes() {
        let entities = vec![
            Entity::new("obj-1", NodeType::Objective, "Obj"),
            Entity::new("r-1", NodeType::Risk, "Risk").with_objective("obj-1"),
            Entity::new("p-1", NodeType::Problem, "Problem"),
        ];
        let graph = Graph::from_entities(&entities).expect("build");
        assert_eq!(graph.nodes.keys().collect::<Vec<_>>(), vec!["obj-1"]);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn structural_edges_run_parent_to_child() {
        let entities = vec![wi("parent"), wi("child").with_parent("parent")];
        let graph = Graph::from_entities(&entities).expect("build");
        assert_eq!(graph.edges, vec![Edge::new("parent", "child", Relation::Parent)]);
        assert_eq!(graph.edges[0].layer, Layer::Structural);
        assert_eq!(graph.children("parent").collect::<Vec<_>>(), vec!["child"]);
    }

    #[test]
    fn typed_references_follow_dispatch_table() {
        let entities = vec![
            Entity::new("obj-1", NodeType::Objective, "Obj"),
            Entity::new("del-1", NodeType::Deliverable, "Del").with_objective("obj-1"),
            Entity::new("uc-1", NodeType::UseCase, "UC").with_objective("obj-1"),
            Entity::new("ms-1", NodeType::Milestone, "MS").with_objective("obj-1"),
            wi("wi-1").with_deliverable("del-1").with_use_case("uc-1"),
        ];
        let graph = Graph::from_entities(&entities).expect("build");

        let relation_of = |from: &str, to: &str| {
            graph
                .edges
                .iter()
                .find(|e| e.from == from && e.to == to)
                .map(|e| e.relation)
        };
        assert_eq!(relation_of("del-1", "obj-1"), Some(Relation::Contributes));
        assert_eq!(relation_of("uc-1", "obj-1"), Some(Relation::Fulfills));
        assert_eq!(relation_of("ms-1", "obj-1"), Some(Relation::Fulfills));
        assert_eq!(relation_of("wi-1", "del-1"), Some(Relation::Produces));
        assert_eq!(relation_of("wi-1", "uc-1"), Some(Relation::Implements));
        assert!(graph.edges.iter().all(Edge::is_reference));
    }

    #[test]
    fn dependency_edges_point_at_the_dependency() {
        let entities = vec![wi("a"), wi("b").with_dependencies(["a", "a", " "])];
        let graph = Graph::from_entities(&entities).expect("build");
        assert_eq!(graph.edges, vec![Edge::new("b", "a", Relation::DependsOn)]);
        assert_eq!(graph.dependents("a").collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn dangling_and_self_references_become_warnings() {
        let entities = vec![
            wi("a").with_parent("ghost"),
            wi("b").with_dependencies(["nowhere"]),
            Entity::new("del", NodeType::Deliverable, "Doc").with_objective("del"),
        ];
        let graph = Graph::from_entities(&entities).expect("build");
        assert!(graph.edges.is_empty());
        assert_eq!(graph.node("a").and_then(|n| n.parent_id.as_deref()), Some("ghost"));
        assert!(graph.warnings.contains(&GraphWarning::DanglingParent {
            node: "a".into(),
            parent: "ghost".into(),
        }));
        assert!(graph.warnings.contains(&GraphWarning::SelfReference {
            node: "del".into(),
            relation: Relation::Contributes,
        }));
        assert!(graph.warnings.contains(&GraphWarning::DanglingReference {
            node: "b".into(),
            target: "nowhere".into(),
            relation: Relation::DependsOn,
        }));
    }

    #[test]
    fn self_parent_and_self_dependency_are_kept_as_loops() {
        let entities = vec![wi("a").with_parent("a"), wi("b").with_dependencies(["b"])];
        let graph = Graph::from_entities(&entities).expect("build");
        assert_eq!(
            graph.edges,
            vec![
                Edge::new("a", "a", Relation::Parent),
                Edge::new("b", "b", Relation::DependsOn),
            ]
        );
        assert!(graph.warnings.is_empty());
    }

    #[test]
    fn bad_values_are_clamped_or_dropped() {
        let mut bad = wi("a").with_progress(140).with_dates("2024-13-01", "2024-02-10");
        bad.updated_at = Some("last tuesday".into());
        let entities = vec![bad, wi("b").with_progress(-5)];
        let graph = Graph::from_entities(&entities).expect("build");

        let a = graph.node("a").expect("node a");
        assert_eq!(a.progress, 100);
        assert_eq!(a.start_date, None);
        assert_eq!(a.due_date, NaiveDate::from_ymd_opt(2024, 2, 10));
        assert_eq!(a.updated_at, None);
        assert_eq!(graph.node("b").map(|n| n.progress), Some(0));

        let invalid_dates = graph
            .warnings
            .iter()
            .filter(|w| matches!(w, GraphWarning::InvalidDate { .. }))
            .count();
        assert_eq!(invalid_dates, 2);
        assert!(graph.warnings.contains(&GraphWarning::ProgressClamped {
            node: "b".into(),
            value: -5,
            clamped: 0,
        }));
    }

    #[test]
    fn content_hash_tracks_edges_not_input_order() {
        let forward = vec![wi("a"), wi("b").with_dependencies(["a"])];
        let reversed = vec![wi("b").with_dependencies(["a"]), wi("a")];
        let unlinked = vec![wi("a"), wi("b")];

        let h1 = Graph::from_entities(&forward).expect("build").content_hash;
        let h2 = Graph::from_entities(&reversed).expect("build").content_hash;
        let h3 = Graph::from_entities(&unlinked).expect("build").content_hash;
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }

    #[test]
    fn warning_messages_name_the_node() {
        let w = GraphWarning::DanglingParent {
            node: "a".into(),
            parent: "ghost".into(),
        };
        assert_eq!(w.to_string(), "a: parent 'ghost' not found");
    }
}
