pub mod affinity;
pub mod bottlenecks;
pub mod completions;
pub mod coverage;
pub mod cycles;
pub mod graph;
pub mod staleness;
pub mod timeline;
pub mod wbs;

use std::path::Path;

use anyhow::Context as _;
use keel_analytics::Graph;
use keel_core::config::ProjectConfig;
use keel_core::error::ErrorCode;
use keel_core::snapshot::{Snapshot, load_snapshot};

use crate::output::{CliError, OutputMode, fail, render_error};

/// Everything a command needs: the loaded snapshot, project config, and
/// output mode.
pub struct Context {
    pub snapshot: Snapshot,
    pub config: ProjectConfig,
    pub output: OutputMode,
}

impl Context {
    /// Load the snapshot at `snapshot_path`.
    ///
    /// # Errors
    ///
    /// Returns an error (after rendering it) if the snapshot is missing or
    /// cannot be parsed.
    pub fn load(snapshot_path: &Path, config: ProjectConfig, output: OutputMode) -> anyhow::Result<Self> {
        if !snapshot_path.exists() {
            render_error(
                output,
                &CliError::from_code(
                    ErrorCode::SnapshotNotFound,
                    format!("snapshot not found: {}", snapshot_path.display()),
                ),
            )?;
            anyhow::bail!("snapshot not found: {}", snapshot_path.display());
        }

        let snapshot = match load_snapshot(snapshot_path) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                render_error(
                    output,
                    &CliError::from_code(ErrorCode::SnapshotParseError, format!("{err:#}")),
                )?;
                return Err(err).with_context(|| format!("loading {}", snapshot_path.display()));
            }
        };

        Ok(Self {
            snapshot,
            config,
            output,
        })
    }

    /// Build the analytics graph from the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error (after rendering it) on duplicate entity ids.
    pub fn graph(&self) -> anyhow::Result<Graph> {
        Graph::from_entities(self.snapshot.entities()).map_err(|err| fail(self.output, err))
    }
}

/// `done 40%`-style suffix for human output.
pub fn status_suffix(status: &str, progress: u8) -> String {
    if status.is_empty() {
        format!("{progress}%")
    } else {
        format!("{status} {progress}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_suffix_formats() {
        assert_eq!(status_suffix("doing", 40), "doing 40%");
        assert_eq!(status_suffix("", 0), "0%");
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = Context::load(
            &dir.path().join("nope.json"),
            ProjectConfig::default(),
            OutputMode::Json,
        );
        assert!(result.is_err());
    }

    #[test]
    fn loads_snapshot_and_builds_graph() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshot.json");
        std::fs::write(
            &path,
            r#"{"entities":[{"id":"o","kind":"objective","title":"O"},{"id":"d","kind":"deliverable","title":"D","objective_id":"o"}]}"#,
        )
        .expect("write");
        let ctx = Context::load(&path, ProjectConfig::default(), OutputMode::Json).expect("load");
        let graph = ctx.graph().expect("graph");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }
}
