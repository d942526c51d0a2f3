//! `keel bottlenecks`: fan-in hot spots, unmitigated risks, problem clusters.

use std::io::Write;

use clap::Args;
use keel_analytics::heuristics::bottleneck::{BottleneckReport, Severity, analyze_bottlenecks};
use keel_core::model::NodeType;

use super::Context;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

/// Arguments for `keel bottlenecks`.
#[derive(Args, Debug, Default)]
pub struct BottlenecksArgs {
    /// Only list findings at or above this severity.
    #[arg(long, value_parser = parse_severity)]
    pub min_severity: Option<Severity>,
}

fn parse_severity(raw: &str) -> Result<Severity, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "warning" => Ok(Severity::Warning),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        "critical" => Ok(Severity::Critical),
        other => Err(format!("unknown severity '{other}' (warning|medium|high|critical)")),
    }
}

/// Execute `keel bottlenecks`.
pub fn run_bottlenecks(args: &BottlenecksArgs, ctx: &Context) -> anyhow::Result<()> {
    let graph = ctx.graph()?;
    let mut report = analyze_bottlenecks(
        &graph,
        ctx.snapshot.collection(NodeType::Risk),
        ctx.snapshot.collection(NodeType::Problem),
        &ctx.config.bottleneck,
    );
    if let Some(min) = args.min_severity {
        report.findings.retain(|f| f.severity >= min);
    }
    let mode = ctx.output;
    render(mode, &report, |r, w| render_bottlenecks_human(r, mode, w))
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "CRITICAL",
        Severity::High => "HIGH",
        Severity::Medium => "MEDIUM",
        Severity::Warning => "WARNING",
    }
}

fn render_bottlenecks_human(
    report: &BottleneckReport,
    mode: OutputMode,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    let summary = &report.summary;
    if mode.is_pretty() {
        pretty_section(w, "Bottlenecks")?;
        pretty_kv(w, "health", format!("{}/100", summary.health_score))?;
        pretty_kv(
            w,
            "findings",
            format!(
                "{} critical, {} high, {} medium, {} warning",
                summary.critical, summary.high, summary.medium, summary.warning
            ),
        )?;
        writeln!(w)?;
    } else {
        writeln!(w, "health={}", summary.health_score)?;
    }

    for finding in &report.findings {
        writeln!(
            w,
            "{:<8} {}  {}",
            severity_label(finding.severity),
            finding.entity_id,
            finding.message
        )?;
    }
    Ok(())
}
