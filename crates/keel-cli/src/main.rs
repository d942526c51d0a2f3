#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use keel_core::config::resolve_config;
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "keel: project graph analytics",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Entity snapshot: a .json/.yaml file or a directory of collection files.
    #[arg(long, global = true, default_value = ".keel/snapshot")]
    snapshot: PathBuf,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Structure",
        about = "Show the dependency or unified graph",
        long_about = "Show the depends_on graph, or with --unified (or any filter) every relation.",
        after_help = "EXAMPLES:\n    # Dependencies only\n    keel graph\n\n    # Everything within two hops of a deliverable\n    keel graph --focus del-7 --depth 2\n\n    # Only work items, hide finished ones\n    keel graph --type work-item --hide-completed --json"
    )]
    Graph(cmd::graph::GraphArgs),

    #[command(
        next_help_heading = "Structure",
        about = "List dependency and hierarchy cycles",
        long_about = "List dependency and hierarchy cycles. Exits non-zero when any are found.",
        after_help = "EXAMPLES:\n    keel cycles\n    keel cycles --json"
    )]
    Cycles(cmd::cycles::CyclesArgs),

    #[command(
        next_help_heading = "Structure",
        about = "Show the work breakdown structure",
        after_help = "EXAMPLES:\n    keel wbs\n    keel wbs --max-depth 2"
    )]
    Wbs(cmd::wbs::WbsArgs),

    #[command(
        next_help_heading = "Schedule",
        about = "Compute the critical path schedule",
        after_help = "EXAMPLES:\n    keel timeline\n    keel timeline --as-of 2024-06-01 --critical"
    )]
    Timeline(cmd::timeline::TimelineArgs),

    #[command(
        next_help_heading = "Analysis",
        about = "Score relatedness and suggest clusters",
        after_help = "EXAMPLES:\n    keel affinity\n    keel affinity --max-siblings 10 --min-score 0.8 --max-edges 200"
    )]
    Affinity(cmd::affinity::AffinityArgs),

    #[command(
        next_help_heading = "Health",
        about = "Check objective and deliverable coverage",
        after_help = "EXAMPLES:\n    keel coverage\n    keel coverage --json"
    )]
    Coverage(cmd::coverage::CoverageArgs),

    #[command(
        next_help_heading = "Health",
        about = "Find entities that have not been updated recently",
        after_help = "EXAMPLES:\n    keel staleness\n    keel staleness --threshold-days 14"
    )]
    Staleness(cmd::staleness::StalenessArgs),

    #[command(
        next_help_heading = "Health",
        about = "Find structural hot spots",
        after_help = "EXAMPLES:\n    keel bottlenecks\n    keel bottlenecks --min-severity high"
    )]
    Bottlenecks(cmd::bottlenecks::BottlenecksArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    keel completions bash\n    keel completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("KEEL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "keel=debug,info"
        } else {
            "keel=info,warn"
        })
    });

    let format = env::var("KEEL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let project_root = env::current_dir()?;
    let config = resolve_config(&project_root, cli.json)?;
    let output = cli
        .format
        .unwrap_or_else(|| OutputMode::from_resolved(&config.resolved_output));
    debug!(?output, snapshot = %cli.snapshot.display(), "resolved invocation");

    let ctx = cmd::Context::load(&cli.snapshot, config.project, output)?;

    match &cli.command {
        Commands::Graph(args) => cmd::graph::run_graph(args, &ctx),
        Commands::Cycles(args) => cmd::cycles::run_cycles(args, &ctx),
        Commands::Wbs(args) => cmd::wbs::run_wbs(args, &ctx),
        Commands::Timeline(args) => cmd::timeline::run_timeline(args, &ctx),
        Commands::Affinity(args) => cmd::affinity::run_affinity(args, &ctx),
        Commands::Coverage(args) => cmd::coverage::run_coverage(args, &ctx),
        Commands::Staleness(args) => cmd::staleness::run_staleness(args, &ctx),
        Commands::Bottlenecks(args) => cmd::bottlenecks::run_bottlenecks(args, &ctx),
        Commands::Completions(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_before_subcommand() {
        let cli = Cli::parse_from(["keel", "--json", "cycles"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Cycles(_)));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["keel", "wbs", "--snapshot", "plan.yaml", "--format", "text"]);
        assert_eq!(cli.snapshot, PathBuf::from("plan.yaml"));
        assert_eq!(cli.format, Some(OutputMode::Text));
    }

    #[test]
    fn snapshot_defaults_to_keel_dir() {
        let cli = Cli::parse_from(["keel", "coverage"]);
        assert_eq!(cli.snapshot, PathBuf::from(".keel/snapshot"));
        assert!(cli.format.is_none());
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["keel", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions(cmd::completions::CompletionsArgs {
                shell: clap_complete::Shell::Bash,
            })
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["keel", "graph"],
            vec!["keel", "graph", "--unified", "--focus", "x", "--depth", "2"],
            vec!["keel", "cycles"],
            vec!["keel", "wbs"],
            vec!["keel", "timeline", "--as-of", "2024-01-31"],
            vec!["keel", "affinity", "--max-siblings", "5", "--min-score", "0.5"],
            vec!["keel", "coverage"],
            vec!["keel", "staleness", "--threshold-days", "10"],
            vec!["keel", "bottlenecks", "--min-severity", "high"],
            vec!["keel", "completions", "zsh"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "Failed to parse: {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
