//! `keel timeline`: critical path schedule.

use std::io::Write;

use chrono::{NaiveDate, Utc};
use clap::Args;
use keel_analytics::timeline::{Timeline, build_timeline};

use super::Context;
use crate::output::{OutputMode, fail, pretty_kv, pretty_section, render};

/// Arguments for `keel timeline`.
#[derive(Args, Debug, Default)]
pub struct TimelineArgs {
    /// Reference date for overdue checks (YYYY-MM-DD, default today).
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Only list items on the critical path.
    #[arg(long)]
    pub critical: bool,
}

/// Execute `keel timeline`.
pub fn run_timeline(args: &TimelineArgs, ctx: &Context) -> anyhow::Result<()> {
    let graph = ctx.graph()?;
    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let timeline = build_timeline(&graph, as_of).map_err(|err| fail(ctx.output, err))?;
    let mode = ctx.output;
    render(mode, &timeline, |t, w| render_timeline_human(t, args.critical, mode, w))
}

fn date_or_dash(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

fn render_timeline_human(
    timeline: &Timeline,
    critical_only: bool,
    mode: OutputMode,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    if mode.is_pretty() {
        pretty_section(w, "Timeline")?;
        pretty_kv(w, "start", date_or_dash(timeline.project_start))?;
        pretty_kv(w, "end", date_or_dash(timeline.project_end))?;
        pretty_kv(w, "duration", format!("{} days", timeline.total_duration))?;
        pretty_kv(w, "critical path", timeline.critical_path.join(" -> "))?;
        pretty_kv(w, "overdue", timeline.stats.overdue_count.to_string())?;
        pretty_kv(w, "unscheduled", timeline.stats.unscheduled.to_string())?;
        writeln!(w)?;
    }

    for item in &timeline.items {
        if critical_only && !item.is_on_critical_path {
            continue;
        }
        let slack = item.slack_days.map_or_else(|| "-".to_string(), |s| s.to_string());
        let mut flags = String::new();
        if item.is_on_critical_path {
            flags.push('*');
        }
        if item.is_overdue {
            flags.push('!');
        }
        writeln!(
            w,
            "{:<2} {}  {} .. {}  slack={slack}  {}",
            flags,
            item.id,
            date_or_dash(item.start),
            date_or_dash(item.end),
            item.title
        )?;
    }
    Ok(())
}
