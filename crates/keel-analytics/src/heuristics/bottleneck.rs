//! Structural hot spots.
//!
//! Three rules, each producing [`Bottleneck`] findings:
//!
//! - **High fan-in**: a node that many others depend on. `>= threshold`
//!   dependents is medium, `>= 2 × threshold` is high.
//! - **Unmitigated risk**: an open risk with no mitigation attached to an
//!   objective. Score `>= high_risk_score` is high, `>= critical_risk_score`
//!   is critical.
//! - **Problem hotspot**: an objective with many open problems.
//!   `>= threshold` is a warning, `>= 2 × threshold` is high.
//!
//! `health_score = 100 − (25·critical + 10·high + 5·medium + 2·warning)`,
//! floored at zero.

use std::collections::{BTreeMap, HashMap};

use keel_core::config::BottleneckOptions;
use keel_core::model::{Entity, NodeType, is_closed_status};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::graph::Graph;

/// Finding severity, least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Points deducted from the health score per finding.
    #[must_use]
    pub const fn penalty(self) -> u32 {
        match self {
            Self::Critical => 25,
            Self::High => 10,
            Self::Medium => 5,
            Self::Warning => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckKind {
    HighFanIn,
    UnmitigatedRisk,
    ProblemHotspot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bottleneck {
    pub kind: BottleneckKind,
    pub severity: Severity,
    /// The node the finding is about.
    pub entity_id: String,
    pub title: String,
    /// Dependents, risk score, or open problem count.
    pub metric: u32,
    /// Dependents, the risk, or the open problems behind the finding.
    pub related: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BottleneckSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub warning: usize,
    pub health_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BottleneckReport {
    /// Most severe first.
    pub findings: Vec<Bottleneck>,
    pub summary: BottleneckSummary,
}

#[must_use]
#[instrument(skip(graph, risks, problems))]
pub fn analyze_bottlenecks(
    graph: &Graph,
    risks: &[Entity],
    problems: &[Entity],
    options: &BottleneckOptions,
) -> BottleneckReport {
    let mut findings = Vec::new();
    high_fan_in(graph, options, &mut findings);
    unmitigated_risks(graph, risks, options, &mut findings);
    problem_hotspots(graph, problems, options, &mut findings);

    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
            .then_with(|| a.related.cmp(&b.related))
    });

    let summary = summarize(&findings);
    debug!(
        findings = findings.len(),
        health = summary.health_score,
        "bottlenecks analyzed"
    );
    BottleneckReport { findings, summary }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn high_fan_in(graph: &Graph, options: &BottleneckOptions, out: &mut Vec<Bottleneck>) {
    let threshold = options.dependents_threshold.max(1);
    let mut dependents_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges.iter().filter(|e| e.is_dependency() && e.from != e.to) {
        dependents_of.entry(edge.to.as_str()).or_default().push(edge.from.as_str());
    }
    for node in graph.nodes.values() {
        let Some(dependents) = dependents_of.get(node.id.as_str()) else {
            continue;
        };
        let count = dependents.len();
        let severity = if count >= threshold.saturating_mul(2) {
            Severity::High
        } else if count >= threshold {
            Severity::Medium
        } else {
            continue;
        };
        out.push(Bottleneck {
            kind: BottleneckKind::HighFanIn,
            severity,
            entity_id: node.id.clone(),
            title: node.title.clone(),
            metric: saturating_u32(count),
            related: dependents.iter().map(|id| (*id).to_string()).collect(),
            message: format!("{count} items depend on {}", node.id),
        });
    }
}

fn unmitigated_risks(
    graph: &Graph,
    risks: &[Entity],
    options: &BottleneckOptions,
    out: &mut Vec<Bottleneck>,
) {
    for risk in risks {
        if is_closed_status(&risk.status) || has_text(risk.mitigation.as_deref()) {
            continue;
        }
        let score = risk.score.unwrap_or(0);
        let severity = if score >= options.critical_risk_score {
            Severity::Critical
        } else if score >= options.high_risk_score {
            Severity::High
        } else {
            continue;
        };
        let Some(objective) = attached_objective(graph, risk) else {
            debug!(risk = %risk.id, "risk not attached to an objective");
            continue;
        };
        out.push(Bottleneck {
            kind: BottleneckKind::UnmitigatedRisk,
            severity,
            entity_id: objective.0.to_string(),
            title: objective.1.to_string(),
            metric: score,
            related: vec![risk.id.trim().to_string()],
            message: format!("risk {} (score {score}) has no mitigation", risk.id.trim()),
        });
    }
}

fn problem_hotspots(
    graph: &Graph,
    problems: &[Entity],
    options: &BottleneckOptions,
    out: &mut Vec<Bottleneck>,
) {
    let threshold = options.open_problem_threshold.max(1);
    let mut open: BTreeMap<(&str, &str), Vec<String>> = BTreeMap::new();
    for problem in problems.iter().filter(|p| !is_closed_status(&p.status)) {
        if let Some(objective) = attached_objective(graph, problem) {
            open.entry(objective).or_default().push(problem.id.trim().to_string());
        }
    }

    for ((id, title), mut related) in open {
        let count = related.len();
        let severity = if count >= threshold.saturating_mul(2) {
            Severity::High
        } else if count >= threshold {
            Severity::Warning
        } else {
            continue;
        };
        related.sort();
        out.push(Bottleneck {
            kind: BottleneckKind::ProblemHotspot,
            severity,
            entity_id: id.to_string(),
            title: title.to_string(),
            metric: saturating_u32(count),
            related,
            message: format!("{count} open problems on {id}"),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `(id, title)` of the objective a risk or problem hangs off.
fn attached_objective<'g>(graph: &'g Graph, record: &Entity) -> Option<(&'g str, &'g str)> {
    record
        .objective_id
        .iter()
        .chain(record.parent_id.iter())
        .filter_map(|id| graph.node(id.trim()))
        .find(|node| node.node_type == NodeType::Objective)
        .map(|node| (node.id.as_str(), node.title.as_str()))
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn summarize(findings: &[Bottleneck]) -> BottleneckSummary {
    let mut summary = BottleneckSummary::default();
    let mut penalty: u32 = 0;
    for finding in findings {
        match finding.severity {
            Severity::Critical => summary.critical += 1,
            Severity::High => summary.high += 1,
            Severity::Medium => summary.medium += 1,
            Severity::Warning => summary.warning += 1,
        }
        penalty = penalty.saturating_add(finding.severity.penalty());
    }
    summary.health_score = u8::try_from(100_u32.saturating_sub(penalty)).unwrap_or(0);
    summary
}
