//! Date-aware critical path scheduling.
//!
//! # Overview
//!
//! Every node with a start or due date is scheduled over the `depends_on`
//! edges among dated nodes. Nodes without dates are still listed, with zero
//! duration and no computed dates.
//!
//! # Definitions
//!
//! All values are whole days, stored as offsets from the earliest anchor
//! date and converted back to calendar dates on output.
//!
//! | Term              | Definition |
//! |-------------------|------------|
//! | `duration`        | `max(due − start, 1)`; start only or due only = 1 day. |
//! | `earliest_start`  | Max `earliest_finish` of scheduled dependencies, else the declared start. |
//! | `earliest_finish` | `earliest_start + duration`. |
//! | `latest_finish`   | Min `latest_start` of dependents, else the project finish. |
//! | `latest_start`    | `latest_finish − duration`. |
//! | `slack`           | `latest_start − earliest_start`; zero on the critical path. |
//!
//! A due-only node is anchored one day before its due date.
//!
//! # Algorithm
//!
//! 1. Build a petgraph `DiGraph` over dated nodes with edges
//!    `dependency → dependent`.
//! 2. `toposort`. A cycle aborts with [`AnalyticsError::SchedulingCycle`];
//!    CPM is undefined on a cyclic graph.
//! 3. **Forward pass** in topological order.
//! 4. **Backward pass** in reverse topological order from the project finish.
//! 5. **Path reconstruction**: start at the zero-slack node with the greatest
//!    `earliest_finish`, walk back through zero-slack dependencies whose
//!    `earliest_finish` equals the current `earliest_start`, then reverse.
//!    Ties pick the smallest id.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use keel_core::model::NodeType;
use petgraph::{
    Direction,
    algo::toposort,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::AnalyticsError;
use crate::graph::{Edge, Graph, Node, detect_cycles};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One node of the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineItem {
    pub id: String,
    pub title: String,
    pub node_type: NodeType,
    pub status: String,
    pub assignee: Option<String>,
    /// Computed earliest start; `None` for undated nodes.
    pub start: Option<NaiveDate>,
    /// Computed earliest finish; `None` for undated nodes.
    pub end: Option<NaiveDate>,
    pub declared_start: Option<NaiveDate>,
    pub declared_due: Option<NaiveDate>,
    pub duration_days: i64,
    pub earliest_start: Option<NaiveDate>,
    pub earliest_finish: Option<NaiveDate>,
    pub latest_start: Option<NaiveDate>,
    pub latest_finish: Option<NaiveDate>,
    pub slack_days: Option<i64>,
    pub is_on_critical_path: bool,
    pub is_overdue: bool,
    pub dependencies: Vec<String>,
}

impl TimelineItem {
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        self.slack_days.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelineStats {
    pub scheduled: usize,
    pub unscheduled: usize,
    pub critical_count: usize,
    /// Mean slack in days over scheduled items.
    pub average_slack: f64,
    /// Items due before the as-of date that are not completed.
    pub overdue_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    /// Scheduled items by (earliest start, id), then unscheduled items by id.
    pub items: Vec<TimelineItem>,
    /// Ids of one longest zero-slack chain, dependencies first.
    pub critical_path: Vec<String>,
    pub project_start: Option<NaiveDate>,
    pub project_end: Option<NaiveDate>,
    /// Days from project start to project end.
    pub total_duration: i64,
    pub as_of: NaiveDate,
    pub stats: TimelineStats,
}

impl Timeline {
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&TimelineItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Per-node CPM values, in day offsets.
#[derive(Debug, Clone, Copy, Default)]
struct Timing {
    anchor: i64,
    duration: i64,
    es: i64,
    ef: i64,
    ls: i64,
    lf: i64,
}

impl Timing {
    const fn slack(&self) -> i64 {
        self.ls - self.es
    }
}

/// Schedule every dated node of `graph`.
///
/// `as_of` is the reference date for overdue detection.
///
/// # Errors
///
/// Returns [`AnalyticsError::SchedulingCycle`] if the dependencies among
/// dated nodes contain a cycle.
#[instrument(skip(graph))]
pub fn build_timeline(graph: &Graph, as_of: NaiveDate) -> Result<Timeline, AnalyticsError> {
    let dated: Vec<&Node> = graph.nodes.values().filter(|n| n.is_dated()).collect();

    let Some(origin) = dated.iter().filter_map(|n| anchor_date(n)).min() else {
        let items = graph
            .nodes
            .values()
            .map(|n| unscheduled_item(n, as_of))
            .collect();
        return Ok(assemble(items, Vec::new(), as_of));
    };

    // --- Dependency graph over dated nodes: dependency → dependent ---
    let mut dag = DiGraph::<usize, ()>::with_capacity(dated.len(), graph.edges.len());
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(dated.len());
    let mut timings: Vec<Timing> = Vec::with_capacity(dated.len());
    for (slot, node) in dated.iter().enumerate() {
        index.insert(node.id.as_str(), dag.add_node(slot));
        timings.push(initial_timing(node, origin));
    }
    for edge in graph.edges.iter().filter(|e| e.is_dependency()) {
        if let (Some(&dependent), Some(&dependency)) =
            (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        {
            dag.add_edge(dependency, dependent, ());
        }
    }

    let topo: Vec<NodeIndex> = match toposort(&dag, None) {
        Ok(order) => order,
        Err(cycle) => {
            let path = scheduling_cycle_path(&dated, graph, dag[cycle.node_id()]);
            warn!(path = %path.join(" -> "), "scheduling cycle, timeline aborted");
            return Err(AnalyticsError::SchedulingCycle { path });
        }
    };

    // --- Forward pass ---
    for &v in &topo {
        let slot = dag[v];
        let es = dag
            .edges_directed(v, Direction::Incoming)
            .map(|e| timings[dag[e.source()]].ef)
            .max()
            .unwrap_or(timings[slot].anchor);
        timings[slot].es = es;
        timings[slot].ef = es + timings[slot].duration;
    }

    let project_finish = timings.iter().map(|t| t.ef).max().unwrap_or(0);

    // --- Backward pass ---
    for &v in topo.iter().rev() {
        let slot = dag[v];
        let lf = dag
            .edges_directed(v, Direction::Outgoing)
            .map(|e| timings[dag[e.target()]].ls)
            .min()
            .unwrap_or(project_finish);
        timings[slot].lf = lf;
        timings[slot].ls = lf - timings[slot].duration;
    }

    let critical_path: Vec<String> = reconstruct_critical_path(&dag, &dated, &timings)
        .into_iter()
        .map(|slot| dated[slot].id.clone())
        .collect();

    let mut items: Vec<TimelineItem> = graph
        .nodes
        .values()
        .map(|node| match index.get(node.id.as_str()) {
            Some(&v) => scheduled_item(node, &timings[dag[v]], origin, as_of),
            None => unscheduled_item(node, as_of),
        })
        .collect();
    items.sort_by(|a, b| {
        (!a.is_scheduled(), a.earliest_start, &a.id).cmp(&(!b.is_scheduled(), b.earliest_start, &b.id))
    });

    let timeline = assemble(items, critical_path, as_of);
    debug!(
        scheduled = timeline.stats.scheduled,
        critical = timeline.stats.critical_count,
        total_duration = timeline.total_duration,
        "timeline built"
    );
    Ok(timeline)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Day the node would start on if nothing held it back.
fn anchor_date(node: &Node) -> Option<NaiveDate> {
    match (node.start_date, node.due_date) {
        (Some(start), _) => Some(start),
        (None, Some(due)) => due.checked_sub_signed(Duration::days(1)),
        (None, None) => None,
    }
}

fn declared_duration(node: &Node) -> i64 {
    match (node.start_date, node.due_date) {
        (Some(start), Some(due)) => due.signed_duration_since(start).num_days().max(1),
        (Some(_), None) | (None, Some(_)) => 1,
        (None, None) => 0,
    }
}

fn initial_timing(node: &Node, origin: NaiveDate) -> Timing {
    let anchor = anchor_date(node).map_or(0, |d| d.signed_duration_since(origin).num_days());
    Timing {
        anchor,
        duration: declared_duration(node),
        ..Timing::default()
    }
}

fn day(origin: NaiveDate, offset: i64) -> Option<NaiveDate> {
    origin.checked_add_signed(Duration::days(offset))
}

fn is_overdue(node: &Node, as_of: NaiveDate) -> bool {
    node.due_date.is_some_and(|due| due < as_of) && !node.is_completed()
}

fn scheduled_item(node: &Node, t: &Timing, origin: NaiveDate, as_of: NaiveDate) -> TimelineItem {
    TimelineItem {
        start: day(origin, t.es),
        end: day(origin, t.ef),
        duration_days: t.duration,
        earliest_start: day(origin, t.es),
        earliest_finish: day(origin, t.ef),
        latest_start: day(origin, t.ls),
        latest_finish: day(origin, t.lf),
        slack_days: Some(t.slack()),
        is_on_critical_path: t.slack() == 0,
        ..unscheduled_item(node, as_of)
    }
}

fn unscheduled_item(node: &Node, as_of: NaiveDate) -> TimelineItem {
    TimelineItem {
        id: node.id.clone(),
        title: node.title.clone(),
        node_type: node.node_type,
        status: node.status.clone(),
        assignee: node.assignee.clone(),
        start: None,
        end: None,
        declared_start: node.start_date,
        declared_due: node.due_date,
        duration_days: 0,
        earliest_start: None,
        earliest_finish: None,
        latest_start: None,
        latest_finish: None,
        slack_days: None,
        is_on_critical_path: false,
        is_overdue: is_overdue(node, as_of),
        dependencies: node.dependencies.clone(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn assemble(items: Vec<TimelineItem>, critical_path: Vec<String>, as_of: NaiveDate) -> Timeline {
    let scheduled: Vec<&TimelineItem> = items.iter().filter(|i| i.is_scheduled()).collect();
    let slack_total: i64 = scheduled.iter().filter_map(|i| i.slack_days).sum();

    let stats = TimelineStats {
        scheduled: scheduled.len(),
        unscheduled: items.len() - scheduled.len(),
        critical_count: items.iter().filter(|i| i.is_on_critical_path).count(),
        average_slack: if scheduled.is_empty() {
            0.0
        } else {
            slack_total as f64 / scheduled.len() as f64
        },
        overdue_count: items.iter().filter(|i| i.is_overdue).count(),
    };

    let project_start = scheduled.iter().filter_map(|i| i.start).min();
    let project_end = scheduled.iter().filter_map(|i| i.end).max();
    let total_duration = match (project_start, project_end) {
        (Some(start), Some(end)) => end.signed_duration_since(start).num_days(),
        _ => 0,
    };

    Timeline {
        items,
        critical_path,
        project_start,
        project_end,
        total_duration,
        as_of,
        stats,
    }
}

/// Walk back from the latest-finishing zero-slack node.
///
/// Returns slots into `dated`, dependencies first.
fn reconstruct_critical_path(
    dag: &DiGraph<usize, ()>,
    dated: &[&Node],
    timings: &[Timing],
) -> Vec<usize> {
    let Some(sink) = dag
        .node_indices()
        .filter(|&v| timings[dag[v]].slack() == 0)
        .max_by(|&a, &b| {
            timings[dag[a]]
                .ef
                .cmp(&timings[dag[b]].ef)
                .then_with(|| dated[dag[b]].id.cmp(&dated[dag[a]].id))
        })
    else {
        return Vec::new();
    };

    let mut path: Vec<usize> = vec![dag[sink]];
    let mut current = sink;

    loop {
        let es = timings[dag[current]].es;
        let prev = dag
            .edges_directed(current, Direction::Incoming)
            .map(|e| e.source())
            .filter(|&u| timings[dag[u]].slack() == 0 && timings[dag[u]].ef == es)
            .min_by(|&a, &b| dated[dag[a]].id.cmp(&dated[dag[b]].id));

        match prev {
            Some(u) => {
                current = u;
                path.push(dag[u]);
            }
            None => break,
        }
    }

    path.reverse();
    path
}

/// Id sequence of a dependency cycle among dated nodes.
fn scheduling_cycle_path(dated: &[&Node], graph: &Graph, fallback_slot: usize) -> Vec<String> {
    let report = detect_cycles(
        dated.iter().map(|n| n.id.as_str()),
        &graph.edges,
        Edge::is_dependency,
    );
    report.first().map_or_else(
        || vec![dated[fallback_slot].id.clone()],
        <[String]>::to_vec,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
