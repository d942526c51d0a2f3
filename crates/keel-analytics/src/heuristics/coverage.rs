//! Objective → deliverable → work item coverage.
//!
//! A deliverable belongs to an objective through `objective_id` or
//! `parent_id`; a work item belongs to a deliverable through
//! `deliverable_id` or `parent_id`. An objective is *covered* when at least
//! one deliverable belongs to it.

use std::collections::HashSet;

use keel_core::model::Entity;
use serde::Serialize;
use tracing::{debug, instrument};

use super::percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageIssueKind {
    ObjectiveWithoutDeliverable,
    DeliverableWithoutWorkItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageIssue {
    pub kind: CoverageIssueKind,
    pub entity_id: String,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub issues: Vec<CoverageIssue>,
    pub total_objectives: usize,
    pub covered_objectives: usize,
    pub total_deliverables: usize,
    pub covered_deliverables: usize,
    /// `covered_objectives * 100 / total_objectives`; 100 with no objectives.
    pub score: u8,
}

impl CoverageReport {
    /// Every objective and every deliverable is covered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

#[must_use]
#[instrument(skip_all, fields(objectives = objectives.len(), deliverables = deliverables.len()))]
pub fn analyze_coverage(
    objectives: &[Entity],
    deliverables: &[Entity],
    work_items: &[Entity],
) -> CoverageReport {
    let objectives_with_deliverables: HashSet<&str> = deliverables
        .iter()
        .flat_map(|d| owners(d.objective_id.as_deref(), d.parent_id.as_deref()))
        .collect();
    let deliverables_with_work: HashSet<&str> = work_items
        .iter()
        .flat_map(|w| owners(w.deliverable_id.as_deref(), w.parent_id.as_deref()))
        .collect();

    let mut issues = Vec::new();

    let mut covered_objectives = 0;
    for objective in objectives {
        if objectives_with_deliverables.contains(objective.id.trim()) {
            covered_objectives += 1;
        } else {
            issues.push(issue(
                CoverageIssueKind::ObjectiveWithoutDeliverable,
                objective,
                "objective has no deliverables",
            ));
        }
    }

    let mut covered_deliverables = 0;
    for deliverable in deliverables {
        if deliverables_with_work.contains(deliverable.id.trim()) {
            covered_deliverables += 1;
        } else {
            issues.push(issue(
                CoverageIssueKind::DeliverableWithoutWorkItem,
                deliverable,
                "deliverable has no work items",
            ));
        }
    }

    issues.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.entity_id.cmp(&b.entity_id)));

    let report = CoverageReport {
        total_objectives: objectives.len(),
        covered_objectives,
        total_deliverables: deliverables.len(),
        covered_deliverables,
        score: percent(covered_objectives, objectives.len()),
        issues,
    };
    debug!(score = report.score, issues = report.issues.len(), "coverage analyzed");
    report
}

fn owners<'a>(typed: Option<&'a str>, parent: Option<&'a str>) -> impl Iterator<Item = &'a str> {
    typed
        .into_iter()
        .chain(parent)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn issue(kind: CoverageIssueKind, entity: &Entity, message: &str) -> CoverageIssue {
    CoverageIssue {
        kind,
        entity_id: entity.id.trim().to_string(),
        title: entity.title.clone(),
        message: message.to_string(),
    }
}
