//! `keel cycles`: dependency and hierarchy cycles.

use std::collections::HashMap;
use std::io::Write;

use clap::Args;
use keel_analytics::Graph;
use keel_analytics::graph::{CycleReport, find_dependency_cycles, find_hierarchy_cycles};
use serde::Serialize;

use super::Context;
use crate::output::render;

/// Arguments for `keel cycles`.
#[derive(Args, Debug, Default)]
pub struct CyclesArgs {}

#[derive(Debug, Serialize)]
struct CyclesOutput {
    dependency: CycleReport,
    hierarchy: CycleReport,
}

impl CyclesOutput {
    const fn total(&self) -> usize {
        self.dependency.count + self.hierarchy.count
    }
}

/// Execute `keel cycles`.
///
/// Exits non-zero when any cycle is found.
pub fn run_cycles(_args: &CyclesArgs, ctx: &Context) -> anyhow::Result<()> {
    let graph = ctx.graph()?;
    let payload = CyclesOutput {
        dependency: find_dependency_cycles(&graph),
        hierarchy: find_hierarchy_cycles(&graph),
    };

    let titles = cycle_titles(&graph, &payload);
    render(ctx.output, &payload, |report, w| render_cycles_human(report, &titles, w))?;

    if payload.total() > 0 {
        anyhow::bail!("{} cycle(s) found", payload.total());
    }
    Ok(())
}

fn cycle_titles<'g>(graph: &'g Graph, payload: &CyclesOutput) -> HashMap<String, &'g str> {
    payload
        .dependency
        .cycles
        .iter()
        .chain(&payload.hierarchy.cycles)
        .flatten()
        .filter_map(|id| graph.node(id).map(|n| (id.clone(), n.title.as_str())))
        .collect()
}

fn render_cycles_human(
    payload: &CyclesOutput,
    titles: &HashMap<String, &str>,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    if payload.total() == 0 {
        writeln!(w, "No cycles found.")?;
        return Ok(());
    }

    for (label, report) in [("Dependency", &payload.dependency), ("Hierarchy", &payload.hierarchy)] {
        if !report.has_cycle {
            continue;
        }
        writeln!(w, "{label} cycles ({})", report.count)?;
        for (idx, cycle) in report.cycles.iter().enumerate() {
            writeln!(w, "\nCycle {}:", idx + 1)?;
            for id in cycle {
                match titles.get(id) {
                    Some(title) if !title.is_empty() => writeln!(w, "  - {id}  {title}")?,
                    _ => writeln!(w, "  - {id}")?,
                }
            }
        }
        writeln!(w)?;
    }
    Ok(())
}
