//! Project and user configuration.
//!
//! Project settings live in `.keel/config.toml`; user settings in
//! `<config_dir>/keel/config.toml`. Every field has a serde default so a
//! missing file or a partial file both resolve to a complete config.
//!
//! The analyzer option types defined here are plain values handed to the
//! analytics engine on every call. Nothing in the engine reads global
//! configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub affinity: AffinityOptions,
    #[serde(default)]
    pub staleness: StalenessOptions,
    #[serde(default)]
    pub bottleneck: BottleneckOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Hop limit used for focused unified-graph views when no depth is given.
    #[serde(default = "default_focus_depth")]
    pub default_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_depth: default_focus_depth(),
        }
    }
}

/// Weight of each relatedness signal in the affinity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityWeights {
    #[serde(default = "default_parent_child_weight")]
    pub parent_child: f64,
    #[serde(default = "default_sibling_weight")]
    pub sibling: f64,
    #[serde(default = "default_wbs_adjacency_weight")]
    pub wbs_adjacency: f64,
    #[serde(default = "default_reference_weight")]
    pub reference: f64,
    #[serde(default = "default_shared_category_weight")]
    pub shared_category: f64,
    /// Weight of the single child → parent edge used in hub mode.
    #[serde(default = "default_hub_weight")]
    pub hub: f64,
}

impl Default for AffinityWeights {
    fn default() -> Self {
        Self {
            parent_child: default_parent_child_weight(),
            sibling: default_sibling_weight(),
            wbs_adjacency: default_wbs_adjacency_weight(),
            reference: default_reference_weight(),
            shared_category: default_shared_category_weight(),
            hub: default_hub_weight(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityOptions {
    #[serde(default)]
    pub weights: AffinityWeights,
    /// Sibling count above which a parent switches to hub mode.
    #[serde(default = "default_max_siblings")]
    pub max_siblings: usize,
    /// Edges scoring below this are dropped.
    #[serde(default)]
    pub min_score: f64,
    /// Keep at most this many edges (highest scores first). `None` = unlimited.
    #[serde(default)]
    pub max_edges: Option<usize>,
}

impl Default for AffinityOptions {
    fn default() -> Self {
        Self {
            weights: AffinityWeights::default(),
            max_siblings: default_max_siblings(),
            min_score: 0.0,
            max_edges: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessOptions {
    /// Age in days after which an entity counts as stale.
    #[serde(default = "default_threshold_days")]
    pub threshold_days: i64,
}

impl Default for StalenessOptions {
    fn default() -> Self {
        Self {
            threshold_days: default_threshold_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BottleneckOptions {
    /// Number of dependents at which a node is flagged as a fan-in hot spot.
    #[serde(default = "default_dependents_threshold")]
    pub dependents_threshold: usize,
    /// Unmitigated risks at or above this score are flagged.
    #[serde(default = "default_high_risk_score")]
    pub high_risk_score: u32,
    /// Unmitigated risks at or above this score are critical.
    #[serde(default = "default_critical_risk_score")]
    pub critical_risk_score: u32,
    /// Open problems per objective at which the objective is flagged.
    #[serde(default = "default_open_problem_threshold")]
    pub open_problem_threshold: usize,
}

impl Default for BottleneckOptions {
    fn default() -> Self {
        Self {
            dependents_threshold: default_dependents_threshold(),
            high_risk_score: default_high_risk_score(),
            critical_risk_score: default_critical_risk_score(),
            open_problem_threshold: default_open_problem_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.keel/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".keel/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("keel/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Combine project config, user config, and the output-mode precedence.
///
/// # Errors
///
/// Returns an error if either config file is present but invalid.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_json,
        user.output.as_deref(),
        env_format.as_deref(),
        std::io::stdout().is_terminal(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
    is_tty: bool,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    let mode = if is_tty { "pretty" } else { "text" };
    mode.to_string()
}

const fn default_focus_depth() -> usize {
    3
}

const fn default_parent_child_weight() -> f64 {
    1.0
}

const fn default_sibling_weight() -> f64 {
    0.6
}

const fn default_wbs_adjacency_weight() -> f64 {
    0.4
}

const fn default_reference_weight() -> f64 {
    0.9
}

const fn default_shared_category_weight() -> f64 {
    0.3
}

const fn default_hub_weight() -> f64 {
    0.5
}

const fn default_max_siblings() -> usize {
    20
}

const fn default_threshold_days() -> i64 {
    30
}

const fn default_dependents_threshold() -> usize {
    5
}

const fn default_high_risk_score() -> u32 {
    15
}

const fn default_critical_risk_score() -> u32 {
    20
}

const fn default_open_problem_threshold() -> usize {
    3
}
