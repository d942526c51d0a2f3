//! `keel wbs`: work breakdown tree with position codes.

use std::io::Write;

use clap::Args;
use keel_analytics::wbs::{WbsTree, build_wbs};

use super::{Context, status_suffix};
use crate::output::{OutputMode, fail, pretty_kv, pretty_section, render};

/// Arguments for `keel wbs`.
#[derive(Args, Debug, Default)]
pub struct WbsArgs {
    /// Only show nodes up to this depth (1 = roots).
    #[arg(long)]
    pub max_depth: Option<usize>,
}

/// Execute `keel wbs`.
pub fn run_wbs(args: &WbsArgs, ctx: &Context) -> anyhow::Result<()> {
    let graph = ctx.graph()?;
    let tree = build_wbs(&graph).map_err(|err| fail(ctx.output, err))?;
    let mode = ctx.output;
    render(mode, &tree, |t, w| render_wbs_human(t, args.max_depth, mode, w))
}

fn render_wbs_human(
    tree: &WbsTree,
    max_depth: Option<usize>,
    mode: OutputMode,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    if mode.is_pretty() {
        pretty_section(w, "Work breakdown")?;
        pretty_kv(w, "nodes", tree.stats.total.to_string())?;
        pretty_kv(w, "leaves", tree.stats.leaves.to_string())?;
        pretty_kv(w, "max depth", tree.stats.max_depth.to_string())?;
        pretty_kv(w, "completion", format!("{}%", tree.stats.completion_percent))?;
        writeln!(w)?;
    }

    for node in tree.flatten() {
        if max_depth.is_some_and(|max| node.depth > max) {
            continue;
        }
        let indent = "  ".repeat(node.depth.saturating_sub(1));
        writeln!(
            w,
            "{indent}{}  {}  [{}]",
            node.code,
            node.title,
            status_suffix(&node.status, node.rollup_progress)
        )?;
    }
    Ok(())
}
