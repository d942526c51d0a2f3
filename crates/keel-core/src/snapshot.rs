//! Immutable entity snapshots read from disk.
//!
//! # Layouts
//!
//! A snapshot is either a single file or a directory:
//!
//! ```text
//! snapshot.yaml             # { entities: [...] } and/or per-kind collections
//! snapshot/
//!   ├─ objectives.yaml      # one list of entities per collection
//!   ├─ deliverables.json
//!   ├─ work_items.yml
//!   └─ ...                  # missing files are empty collections
//! ```
//!
//! Entities listed under a per-kind collection get that kind regardless of
//! any `kind` field they carry. Directory collections are read in parallel;
//! each worker returns its own collection and the results are gathered in
//! collection order, so no worker ever appends to shared state.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::model::{Entity, NodeType};

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// All entities of one project at one point in time, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    collections: BTreeMap<NodeType, Vec<Entity>>,
}

impl Snapshot {
    /// Group `entities` by their `kind`.
    ///
    /// Entities with a blank `id` are dropped with a warning.
    #[must_use]
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut collections: BTreeMap<NodeType, Vec<Entity>> = BTreeMap::new();
        for entity in entities {
            if entity.id.trim().is_empty() {
                warn!(title = %entity.title, "dropping entity without an id");
                continue;
            }
            collections.entry(entity.kind).or_default().push(entity);
        }
        Self { collections }
    }

    /// Entities of one kind (empty slice when there are none).
    #[must_use]
    pub fn collection(&self, kind: NodeType) -> &[Entity] {
        self.collections.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Every entity, grouped by kind in [`NodeType`] order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.collections.values().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// On-disk shape of a single-file snapshot.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SnapshotFile {
    entities: Vec<Entity>,
    objectives: Vec<Entity>,
    deliverables: Vec<Entity>,
    work_items: Vec<Entity>,
    use_cases: Vec<Entity>,
    milestones: Vec<Entity>,
    risks: Vec<Entity>,
    problems: Vec<Entity>,
}

impl SnapshotFile {
    fn into_entities(self) -> Vec<Entity> {
        let mut all = self.entities;
        for (kind, list) in [
            (NodeType::Objective, self.objectives),
            (NodeType::Deliverable, self.deliverables),
            (NodeType::WorkItem, self.work_items),
            (NodeType::UseCase, self.use_cases),
            (NodeType::Milestone, self.milestones),
            (NodeType::Risk, self.risks),
            (NodeType::Problem, self.problems),
        ] {
            all.extend(force_kind(list, kind));
        }
        all
    }
}

/// Load a snapshot from a file or a directory of collection files.
///
/// # Errors
///
/// Returns an error if `path` does not exist, has an unsupported extension,
/// or any file fails to read or parse.
#[instrument]
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        bail!("snapshot not found: {}", path.display());
    }

    let entities = if path.is_dir() {
        load_directory(path)?
    } else {
        let file: SnapshotFile = parse_file(path)?;
        file.into_entities()
    };

    let snapshot = Snapshot::from_entities(entities);
    debug!(entities = snapshot.len(), "snapshot loaded");
    Ok(snapshot)
}

fn load_directory(dir: &Path) -> Result<Vec<Entity>> {
    let collections = NodeType::ALL[..]
        .par_iter()
        .map(|&kind| load_collection(dir, kind))
        .collect::<Result<Vec<Vec<Entity>>>>()?;

    Ok(collections.into_iter().flatten().collect())
}

fn load_collection(dir: &Path, kind: NodeType) -> Result<Vec<Entity>> {
    let Some(path) = EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{ext}", kind.collection())))
        .find(|p| p.is_file())
    else {
        return Ok(Vec::new());
    };

    let list: Vec<Entity> = parse_file(&path)?;
    debug!(collection = kind.collection(), count = list.len(), "collection loaded");
    Ok(force_kind(list, kind).collect())
}

fn parse_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        other => bail!(
            "unsupported snapshot format '{other}' for {} (expected .json, .yaml or .yml)",
            path.display()
        ),
    }
}

fn force_kind(list: Vec<Entity>, kind: NodeType) -> impl Iterator<Item = Entity> {
    list.into_iter().map(move |mut e| {
        e.kind = kind;
        e
    })
}
