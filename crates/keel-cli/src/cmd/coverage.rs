//! `keel coverage`: objectives without deliverables, deliverables without work.

use std::io::Write;

use clap::Args;
use keel_analytics::heuristics::coverage::{CoverageIssueKind, CoverageReport, analyze_coverage};
use keel_core::model::NodeType;

use super::Context;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

/// Arguments for `keel coverage`.
#[derive(Args, Debug, Default)]
pub struct CoverageArgs {}

/// Execute `keel coverage`.
pub fn run_coverage(_args: &CoverageArgs, ctx: &Context) -> anyhow::Result<()> {
    let snapshot = &ctx.snapshot;
    let report = analyze_coverage(
        snapshot.collection(NodeType::Objective),
        snapshot.collection(NodeType::Deliverable),
        snapshot.collection(NodeType::WorkItem),
    );
    let mode = ctx.output;
    render(mode, &report, |r, w| render_coverage_human(r, mode, w))
}

fn render_coverage_human(
    report: &CoverageReport,
    mode: OutputMode,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    if mode.is_pretty() {
        pretty_section(w, "Coverage")?;
        pretty_kv(w, "score", format!("{}/100", report.score))?;
        pretty_kv(
            w,
            "objectives",
            format!("{}/{} covered", report.covered_objectives, report.total_objectives),
        )?;
        pretty_kv(
            w,
            "deliverables",
            format!("{}/{} covered", report.covered_deliverables, report.total_deliverables),
        )?;
        writeln!(w)?;
    } else {
        writeln!(w, "score={}", report.score)?;
    }

    for issue in &report.issues {
        let tag = match issue.kind {
            CoverageIssueKind::ObjectiveWithoutDeliverable => "objective",
            CoverageIssueKind::DeliverableWithoutWorkItem => "deliverable",
        };
        writeln!(w, "{tag:<12} {}  {}", issue.entity_id, issue.message)?;
    }
    Ok(())
}
