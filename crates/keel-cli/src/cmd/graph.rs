//! `keel graph`: dependency graph, or the filtered unified graph.

use std::io::Write;

use clap::Args;
use keel_analytics::graph::{GraphFilter, GraphView, build_dependency_graph, build_unified_graph};
use keel_core::model::{Layer, NodeType, Relation};

use super::Context;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

/// Arguments for `keel graph`.
#[derive(Args, Debug, Default)]
pub struct GraphArgs {
    /// Show every relation instead of `depends_on` only.
    #[arg(long)]
    pub unified: bool,

    /// Restrict to nodes within `--depth` hops of this id.
    #[arg(long)]
    pub focus: Option<String>,

    /// Hop limit around `--focus` (default from config).
    #[arg(long)]
    pub depth: Option<usize>,

    /// Node types to keep (comma separated).
    #[arg(long = "type", value_delimiter = ',')]
    pub types: Vec<NodeType>,

    /// Edge layers to keep: structural, reference.
    #[arg(long = "layer", value_delimiter = ',')]
    pub layers: Vec<Layer>,

    /// Relations to keep (comma separated).
    #[arg(long = "relation", value_delimiter = ',')]
    pub relations: Vec<Relation>,

    /// Drop completed nodes.
    #[arg(long)]
    pub hide_completed: bool,

    /// Drop draft nodes.
    #[arg(long)]
    pub hide_draft: bool,
}

impl GraphArgs {
    /// Any filter implies the unified view.
    fn wants_unified(&self) -> bool {
        self.unified
            || self.focus.is_some()
            || !self.types.is_empty()
            || !self.layers.is_empty()
            || !self.relations.is_empty()
            || self.hide_completed
            || self.hide_draft
    }

    fn filter(&self, default_depth: usize) -> GraphFilter {
        GraphFilter {
            focus_id: self.focus.clone(),
            depth: self.depth.unwrap_or(default_depth),
            include_types: self.types.clone(),
            include_layers: self.layers.clone(),
            include_relations: self.relations.clone(),
            hide_completed: self.hide_completed,
            hide_draft: self.hide_draft,
        }
    }
}

/// Execute `keel graph`.
pub fn run_graph(args: &GraphArgs, ctx: &Context) -> anyhow::Result<()> {
    let graph = ctx.graph()?;
    let view = if args.wants_unified() {
        build_unified_graph(&graph, &args.filter(ctx.config.graph.default_depth))
    } else {
        build_dependency_graph(&graph)
    };

    let mode = ctx.output;
    render(mode, &view, |v, w| render_graph_human(v, mode, w))
}

fn render_graph_human(view: &GraphView, mode: OutputMode, w: &mut dyn Write) -> std::io::Result<()> {
    let stats = &view.stats;
    if mode == OutputMode::Pretty {
        pretty_section(w, "Graph")?;
        pretty_kv(w, "nodes", stats.node_count.to_string())?;
        pretty_kv(w, "edges", stats.edge_count.to_string())?;
        pretty_kv(w, "density", format!("{:.3}", stats.density))?;
        pretty_kv(w, "components", stats.weakly_connected_component_count.to_string())?;
        pretty_kv(w, "isolated", stats.isolated_node_count.to_string())?;
        pretty_kv(w, "cycles", stats.cycle_count.to_string())?;
        writeln!(w)?;
    } else {
        writeln!(
            w,
            "nodes={} edges={} cycles={}",
            stats.node_count, stats.edge_count, stats.cycle_count
        )?;
    }

    for edge in &view.edges {
        writeln!(w, "{} -[{}]-> {}", edge.from, edge.relation, edge.to)?;
    }
    for id in &view.isolated {
        writeln!(w, "{id} (isolated)")?;
    }
    for cycle in view.cycles.iter().chain(&view.hierarchy_cycles) {
        writeln!(w, "cycle: {}", cycle.join(" -> "))?;
    }
    for warning in &view.warnings {
        writeln!(w, "warning: {warning}")?;
    }
    Ok(())
}
