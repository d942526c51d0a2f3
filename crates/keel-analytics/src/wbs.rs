//! Work breakdown structure over the parent/child hierarchy.
//!
//! # Overview
//!
//! The WBS is a forest: every node without a resolvable parent is a root.
//! Position codes are assigned by walking the forest in sibling order:
//!
//! ```text
//! 1        obj-1
//! 1.1        del-1
//! 1.1.1        wi-1
//! 1.2        del-2
//! 2        obj-2
//! ```
//!
//! Siblings are ordered by their declared `wbs_code` (numeric per segment,
//! declared codes first) and then by id, so the computed codes are stable
//! for a given snapshot.
//!
//! # Cycle handling
//!
//! The structural cycle detector runs first. A parent/child cycle aborts the
//! build with [`AnalyticsError::HierarchyCycle`]; the hierarchy is never
//! silently truncated.
//!
//! # Progress rollup
//!
//! `rollup_progress` is the integer mean (rounding down) of the *direct*
//! children's own progress. Leaves report their own progress. There is no
//! recursive weighting.

#![allow(clippy::module_name_repetitions)]

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use keel_core::model::NodeType;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::AnalyticsError;
use crate::graph::{Graph, Node, find_hierarchy_cycles};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WbsNode {
    pub id: String,
    pub title: String,
    pub node_type: NodeType,
    pub status: String,
    /// Computed position code (`1`, `1.2`, `1.2.3`, ...).
    pub code: String,
    /// Code as declared by the store, if any.
    pub declared_code: Option<String>,
    /// Roots have depth 1.
    pub depth: usize,
    pub progress: u8,
    pub rollup_progress: u8,
    pub children: Vec<WbsNode>,
}

impl WbsNode {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WbsStats {
    pub total: usize,
    pub roots: usize,
    pub leaves: usize,
    pub max_depth: usize,
    /// Integer mean of every node's own progress.
    pub average_progress: u8,
    /// Integer percentage of nodes whose status is completed.
    pub completion_percent: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WbsTree {
    pub roots: Vec<WbsNode>,
    pub max_depth: usize,
    pub stats: WbsStats,
}

impl WbsTree {
    /// All nodes in pre-order (each parent before its children).
    #[must_use]
    pub fn flatten(&self) -> Vec<&WbsNode> {
        let mut out = Vec::with_capacity(self.stats.total);
        let mut stack: Vec<&WbsNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Look a node up by its computed code.
    #[must_use]
    pub fn find(&self, code: &str) -> Option<&WbsNode> {
        self.flatten().into_iter().find(|n| n.code == code)
    }

    /// Map from node id to computed code.
    #[must_use]
    pub fn codes(&self) -> BTreeMap<&str, &str> {
        self.flatten()
            .into_iter()
            .map(|n| (n.id.as_str(), n.code.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build the WBS forest of `graph`.
///
/// # Errors
///
/// Returns [`AnalyticsError::HierarchyCycle`] carrying the first cycle found
/// if the parent/child relation is cyclic.
#[instrument(skip(graph))]
pub fn build_wbs(graph: &Graph) -> Result<WbsTree, AnalyticsError> {
    let report = find_hierarchy_cycles(graph);
    if let Some(path) = report.first() {
        warn!(cycles = report.count, path = %path.join(" -> "), "hierarchy cycle, WBS aborted");
        return Err(AnalyticsError::HierarchyCycle {
            path: path.to_vec(),
        });
    }

    let mut children: HashMap<&str, Vec<&Node>> = HashMap::new();
    let mut has_parent: HashSet<&str> = HashSet::new();
    for edge in graph.edges.iter().filter(|e| e.is_structural()) {
        if let Some(child) = graph.node(&edge.to) {
            children.entry(edge.from.as_str()).or_default().push(child);
            has_parent.insert(edge.to.as_str());
        }
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| compare_siblings(a, b));
    }

    let mut roots: Vec<&Node> = graph
        .nodes
        .values()
        .filter(|n| !has_parent.contains(n.id.as_str()))
        .collect();
    roots.sort_by(|a, b| compare_siblings(a, b));

    // Pass 1: codes and depths in pre-order.
    let mut order: Vec<(&Node, String, usize)> = Vec::with_capacity(graph.node_count());
    let mut stack: Vec<(&Node, String, usize)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, n)| (*n, (i + 1).to_string(), 1))
        .collect();
    while let Some((node, code, depth)) = stack.pop() {
        if let Some(kids) = children.get(node.id.as_str()) {
            for (i, kid) in kids.iter().enumerate().rev() {
                stack.push((*kid, format!("{code}.{}", i + 1), depth + 1));
            }
        }
        order.push((node, code, depth));
    }

    // Pass 2: assemble bottom-up so every child exists before its parent.
    let mut built: HashMap<&str, WbsNode> = HashMap::with_capacity(order.len());
    let mut stats = WbsStats {
        total: order.len(),
        roots: roots.len(),
        ..WbsStats::default()
    };
    let mut progress_sum: usize = 0;
    let mut completed: usize = 0;

    for (node, code, depth) in order.into_iter().rev() {
        let kids: Vec<WbsNode> = children
            .get(node.id.as_str())
            .into_iter()
            .flatten()
            .filter_map(|kid| built.remove(kid.id.as_str()))
            .collect();

        let rollup_progress = if kids.is_empty() {
            stats.leaves += 1;
            node.progress
        } else {
            mean_progress(kids.iter().map(|k| k.progress))
        };

        stats.max_depth = stats.max_depth.max(depth);
        progress_sum += usize::from(node.progress);
        if node.is_completed() {
            completed += 1;
        }

        built.insert(
            node.id.as_str(),
            WbsNode {
                id: node.id.clone(),
                title: node.title.clone(),
                node_type: node.node_type,
                status: node.status.clone(),
                code,
                declared_code: node.wbs_code.clone(),
                depth,
                progress: node.progress,
                rollup_progress,
                children: kids,
            },
        );
    }

    if stats.total > 0 {
        stats.average_progress = percent_u8(progress_sum / stats.total);
        stats.completion_percent = percent_u8(completed * 100 / stats.total);
    }

    let roots: Vec<WbsNode> = roots
        .iter()
        .filter_map(|n| built.remove(n.id.as_str()))
        .collect();

    debug!(
        total = stats.total,
        roots = stats.roots,
        max_depth = stats.max_depth,
        "wbs built"
    );

    Ok(WbsTree {
        max_depth: stats.max_depth,
        roots,
        stats,
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn compare_siblings(a: &Node, b: &Node) -> Ordering {
    let key_a = a.wbs_code.as_deref().map(code_segments);
    let key_b = b.wbs_code.as_deref().map(code_segments);
    match (key_a, key_b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

/// Numeric value of each dotted segment; non-numeric segments sort last.
pub(crate) fn code_segments(code: &str) -> Vec<u64> {
    code.split('.')
        .map(|seg| seg.trim().parse::<u64>().unwrap_or(u64::MAX))
        .collect()
}

fn mean_progress(values: impl Iterator<Item = u8>) -> u8 {
    let (sum, count) = values.fold((0_usize, 0_usize), |(s, c), v| (s + usize::from(v), c + 1));
    if count == 0 {
        return 0;
    }
    percent_u8(sum / count)
}

fn percent_u8(value: usize) -> u8 {
    u8::try_from(value.min(100)).unwrap_or(100)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
