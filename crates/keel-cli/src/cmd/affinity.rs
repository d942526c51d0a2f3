//! `keel affinity`: weighted relatedness and suggested clusters.

use std::io::Write;

use clap::Args;
use keel_analytics::affinity::{AffinityResult, Signal, calculate_affinity};
use keel_core::config::AffinityOptions;

use super::Context;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

/// Arguments for `keel affinity`.
#[derive(Args, Debug, Default)]
pub struct AffinityArgs {
    /// Family size above which a parent switches to hub mode.
    #[arg(long)]
    pub max_siblings: Option<usize>,

    /// Drop pairs scoring below this.
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Keep at most this many edges (highest scores first).
    #[arg(long)]
    pub max_edges: Option<usize>,
}

impl AffinityArgs {
    /// Config options with flag overrides applied.
    fn options(&self, base: &AffinityOptions) -> AffinityOptions {
        let mut options = base.clone();
        if let Some(max_siblings) = self.max_siblings {
            options.max_siblings = max_siblings;
        }
        if let Some(min_score) = self.min_score {
            options.min_score = min_score;
        }
        if self.max_edges.is_some() {
            options.max_edges = self.max_edges;
        }
        options
    }
}

/// Execute `keel affinity`.
pub fn run_affinity(args: &AffinityArgs, ctx: &Context) -> anyhow::Result<()> {
    let graph = ctx.graph()?;
    let result = calculate_affinity(&graph, &args.options(&ctx.config.affinity));
    let mode = ctx.output;
    render(mode, &result, |r, w| render_affinity_human(r, mode, w))
}

fn render_affinity_human(
    result: &AffinityResult,
    mode: OutputMode,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    if mode.is_pretty() {
        pretty_section(w, "Affinity")?;
        pretty_kv(w, "edges", result.stats.edge_count.to_string())?;
        pretty_kv(w, "candidates", result.stats.candidate_pairs.to_string())?;
        pretty_kv(w, "hubs", result.stats.hub_count.to_string())?;
        pretty_kv(w, "clusters", result.stats.cluster_count.to_string())?;
        writeln!(w)?;
    }

    for cluster in &result.clusters {
        writeln!(
            w,
            "{} \"{}\" ({} members, anchor {})",
            cluster.id,
            cluster.label,
            cluster.members.len(),
            cluster.anchor
        )?;
        for member in &cluster.members {
            writeln!(w, "  - {member}")?;
        }
    }

    if !result.edges.is_empty() {
        writeln!(w)?;
    }
    for edge in &result.edges {
        let signals: Vec<&str> = edge.signals.iter().copied().map(Signal::as_str).collect();
        writeln!(
            w,
            "{:.2}  {} ~ {}  {}",
            edge.score,
            edge.source,
            edge.target,
            signals.join(",")
        )?;
    }
    Ok(())
}
