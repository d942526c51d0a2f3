//! `keel staleness`: entities that have not been touched in a while.

use std::io::Write;

use chrono::Utc;
use clap::Args;
use keel_analytics::heuristics::staleness::{StalenessReport, analyze_staleness};
use keel_core::config::StalenessOptions;

use super::Context;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

/// Arguments for `keel staleness`.
#[derive(Args, Debug, Default)]
pub struct StalenessArgs {
    /// Age in days at which an entity counts as stale.
    #[arg(long)]
    pub threshold_days: Option<i64>,
}

/// Execute `keel staleness`.
pub fn run_staleness(args: &StalenessArgs, ctx: &Context) -> anyhow::Result<()> {
    let options = StalenessOptions {
        threshold_days: args
            .threshold_days
            .unwrap_or(ctx.config.staleness.threshold_days),
    };
    let report = analyze_staleness(ctx.snapshot.entities(), &options, Utc::now());
    let mode = ctx.output;
    render(mode, &report, |r, w| render_staleness_human(r, mode, w))
}

fn render_staleness_human(
    report: &StalenessReport,
    mode: OutputMode,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    let summary = &report.summary;
    if mode.is_pretty() {
        pretty_section(w, "Staleness")?;
        pretty_kv(w, "freshness", format!("{}/100", summary.freshness_score))?;
        pretty_kv(w, "threshold", format!("{} days", report.threshold_days))?;
        pretty_kv(
            w,
            "stale",
            format!(
                "{} stale, {} very stale, {} abandoned",
                summary.stale, summary.very_stale, summary.abandoned
            ),
        )?;
        pretty_kv(w, "unknown age", summary.unknown_age.to_string())?;
        writeln!(w)?;
    } else {
        writeln!(w, "freshness={}", summary.freshness_score)?;
    }

    for item in &report.items {
        writeln!(
            w,
            "{:>4}d  {:<10} {:<8} {}  {}",
            item.age_days,
            item.level.as_str(),
            item.recommendation.as_str(),
            item.id,
            item.title
        )?;
    }
    Ok(())
}
