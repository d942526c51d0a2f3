use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

/// The closed set of entity kinds tracked in a project.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Objective,
    Deliverable,
    #[default]
    #[serde(alias = "work_item", alias = "workitem", alias = "task")]
    WorkItem,
    #[serde(alias = "use_case", alias = "usecase")]
    UseCase,
    Milestone,
    Risk,
    Problem,
}

impl NodeType {
    pub const ALL: [Self; 7] = [
        Self::Objective,
        Self::Deliverable,
        Self::WorkItem,
        Self::UseCase,
        Self::Milestone,
        Self::Risk,
        Self::Problem,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Objective => "objective",
            Self::Deliverable => "deliverable",
            Self::WorkItem => "work-item",
            Self::UseCase => "use-case",
            Self::Milestone => "milestone",
            Self::Risk => "risk",
            Self::Problem => "problem",
        }
    }

    /// Name of the snapshot collection holding entities of this kind.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Objective => "objectives",
            Self::Deliverable => "deliverables",
            Self::WorkItem => "work_items",
            Self::UseCase => "use_cases",
            Self::Milestone => "milestones",
            Self::Risk => "risks",
            Self::Problem => "problems",
        }
    }

    /// Whether entities of this kind become vertices of the analytics graph.
    ///
    /// Risks and problems are analysis records attached to objectives; they
    /// feed the bottleneck analyzer but carry no structural or reference
    /// edges of their own.
    #[must_use]
    pub const fn is_graph_node(self) -> bool {
        !matches!(self, Self::Risk | Self::Problem)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "objective" => Ok(Self::Objective),
            "deliverable" => Ok(Self::Deliverable),
            "work-item" | "workitem" | "task" => Ok(Self::WorkItem),
            "use-case" | "usecase" => Ok(Self::UseCase),
            "milestone" => Ok(Self::Milestone),
            "risk" => Ok(Self::Risk),
            "problem" => Ok(Self::Problem),
            _ => Err(ParseEnumError::new("node type", s)),
        }
    }
}

/// Edge layer: parent/child containment vs. cross references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Structural,
    Reference,
}

impl Layer {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Reference => "reference",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structural" | "hierarchy" => Ok(Self::Structural),
            "reference" | "references" => Ok(Self::Reference),
            _ => Err(ParseEnumError::new("layer", s)),
        }
    }
}

/// Semantic kind of a derived edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Parent,
    DependsOn,
    Implements,
    Contributes,
    Fulfills,
    Produces,
}

impl Relation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::DependsOn => "depends_on",
            Self::Implements => "implements",
            Self::Contributes => "contributes",
            Self::Fulfills => "fulfills",
            Self::Produces => "produces",
        }
    }

    /// Only `parent` is structural; every other relation is a reference.
    #[must_use]
    pub const fn layer(self) -> Layer {
        match self {
            Self::Parent => Layer::Structural,
            _ => Layer::Reference,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "parent" => Ok(Self::Parent),
            "depends_on" | "dependency" => Ok(Self::DependsOn),
            "implements" => Ok(Self::Implements),
            "contributes" => Ok(Self::Contributes),
            "fulfills" => Ok(Self::Fulfills),
            "produces" => Ok(Self::Produces),
            _ => Err(ParseEnumError::new("relation", s)),
        }
    }
}

/// Error returned when parsing one of the model enums from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub what: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.what, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// One entity as supplied by the entity store.
///
/// Values are kept as the store hands them over (dates as strings, progress
/// as a signed integer). The analytics graph builder parses and clamps them,
/// reporting anything it had to fix as a warning instead of rejecting the
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub id: String,
    #[serde(alias = "type")]
    pub kind: NodeType,
    pub title: String,
    pub status: String,
    /// Any number or numeric string; saturates into `i64`.
    #[serde(deserialize_with = "deserialize_progress")]
    pub progress: i64,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub parent_id: Option<String>,
    pub wbs_code: Option<String>,
    pub dependencies: Vec<String>,
    pub objective_id: Option<String>,
    pub deliverable_id: Option<String>,
    pub use_case_id: Option<String>,
    /// Risk score (likelihood × impact). Only meaningful for risks.
    pub score: Option<u32>,
    /// Mitigation plan text. Only meaningful for risks.
    pub mitigation: Option<String>,
    pub updated_at: Option<String>,
}

impl Entity {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: NodeType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            status: "pending".to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    #[must_use]
    pub const fn with_progress(mut self, progress: i64) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn with_wbs_code(mut self, code: impl Into<String>) -> Self {
        self.wbs_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_dates(mut self, start: impl Into<String>, due: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.due_date = Some(due.into());
        self
    }

    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_objective(mut self, objective_id: impl Into<String>) -> Self {
        self.objective_id = Some(objective_id.into());
        self
    }

    #[must_use]
    pub fn with_deliverable(mut self, deliverable_id: impl Into<String>) -> Self {
        self.deliverable_id = Some(deliverable_id.into());
        self
    }

    #[must_use]
    pub fn with_use_case(mut self, use_case_id: impl Into<String>) -> Self {
        self.use_case_id = Some(use_case_id.into());
        self
    }

    #[must_use]
    pub fn with_updated_at(mut self, updated_at: impl Into<String>) -> Self {
        self.updated_at = Some(updated_at.into());
        self
    }

    /// Typed cross references held by this entity, by kind.
    ///
    /// `dependencies` and `parent_id` apply to every kind and are not
    /// included here.
    #[must_use]
    pub fn typed_references(&self) -> Vec<(&str, Relation)> {
        let mut refs = Vec::new();
        match self.kind {
            NodeType::Deliverable => {
                push_reference(&mut refs, self.objective_id.as_ref(), Relation::Contributes);
            }
            NodeType::UseCase | NodeType::Milestone => {
                push_reference(&mut refs, self.objective_id.as_ref(), Relation::Fulfills);
            }
            NodeType::WorkItem => {
                push_reference(&mut refs, self.deliverable_id.as_ref(), Relation::Produces);
                push_reference(&mut refs, self.use_case_id.as_ref(), Relation::Implements);
            }
            NodeType::Objective | NodeType::Risk | NodeType::Problem => {}
        }
        refs
    }

    /// `parent_id` with blank values treated as absent.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

fn push_reference<'a>(
    refs: &mut Vec<(&'a str, Relation)>,
    target: Option<&'a String>,
    relation: Relation,
) {
    if let Some(t) = target.map(|t| t.trim()).filter(|t| !t.is_empty()) {
        refs.push((t, relation));
    }
}

// ---------------------------------------------------------------------------
// Status conventions
// ---------------------------------------------------------------------------

fn status_is(status: &str, names: &[&str]) -> bool {
    let normalized = status.trim().to_ascii_lowercase();
    names.iter().any(|n| *n == normalized)
}

/// `completed` (or its `done` spelling), case-insensitive.
#[must_use]
pub fn is_completed_status(status: &str) -> bool {
    status_is(status, &["completed", "done"])
}

#[must_use]
pub fn is_draft_status(status: &str) -> bool {
    status_is(status, &["draft"])
}

/// Statuses under which a problem or risk no longer needs attention.
#[must_use]
pub fn is_closed_status(status: &str) -> bool {
    status_is(
        status,
        &["completed", "done", "closed", "resolved", "mitigated", "archived"],
    )
}

// ---------------------------------------------------------------------------
// Lenient numbers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawNumber {
    #[allow(clippy::cast_possible_truncation)]
    fn saturating_i64(self) -> i64 {
        match self {
            Self::Int(value) => value,
            // `as` saturates at the i64 bounds and maps NaN to 0.
            Self::Float(value) => value.round() as i64,
            Self::Text(text) => {
                let text = text.trim();
                text.parse::<i64>().unwrap_or_else(|_| {
                    text.parse::<f64>()
                        .map_or(0, |value| Self::Float(value).saturating_i64())
                })
            }
        }
    }
}

/// Accept integers, floats, numeric strings, and `null` for a progress
/// value. Range checks happen later, when the graph is built.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawNumber>::deserialize(deserializer)?;
    Ok(raw.map_or(0, RawNumber::saturating_i64))
}

// ---------------------------------------------------------------------------
// Date parsing
// ---------------------------------------------------------------------------

/// Parse an ISO calendar date.
///
/// Accepts `YYYY-MM-DD` and full RFC 3339 timestamps (the date part is
/// kept). Returns `None` for anything else.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Parse an RFC 3339 timestamp, falling back to a bare date at midnight UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| ndt.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_round_trips_through_text() {
        for kind in NodeType::ALL {
            assert_eq!(kind.as_str().parse::<NodeType>(), Ok(kind));
        }
        assert_eq!("work_item".parse::<NodeType>(), Ok(NodeType::WorkItem));
        assert!("epic".parse::<NodeType>().is_err());
    }

    #[test]
    fn node_type_serde_uses_kebab_case() {
        let json = serde_json::to_string(&NodeType::UseCase).expect("serialize");
        assert_eq!(json, "\"use-case\"");
        let parsed: NodeType = serde_json::from_str("\"work_item\"").expect("alias");
        assert_eq!(parsed, NodeType::WorkItem);
    }

    #[test]
    fn only_parent_is_structural() {
        assert_eq!(Relation::Parent.layer(), Layer::Structural);
        for rel in [
            Relation::DependsOn,
            Relation::Implements,
            Relation::Contributes,
            Relation::Fulfills,
            Relation::Produces,
        ] {
            assert_eq!(rel.layer(), Layer::Reference, "{rel}");
        }
    }

    #[test]
    fn typed_references_follow_kind() {
        let wi = Entity::new("wi-1", NodeType::WorkItem, "Build")
            .with_deliverable("del-1")
            .with_use_case("uc-1")
            .with_objective("obj-ignored");
        assert_eq!(
            wi.typed_references(),
            vec![("del-1", Relation::Produces), ("uc-1", Relation::Implements)]
        );

        let del = Entity::new("del-1", NodeType::Deliverable, "Doc").with_objective("obj-1");
        assert_eq!(del.typed_references(), vec![("obj-1", Relation::Contributes)]);

        let risk = Entity::new("r-1", NodeType::Risk, "Outage").with_objective("obj-1");
        assert!(risk.typed_references().is_empty());
    }

    #[test]
    fn blank_references_are_ignored() {
        let mut del = Entity::new("del-1", NodeType::Deliverable, "Doc").with_objective("  ");
        del.parent_id = Some(String::new());
        assert!(del.typed_references().is_empty());
        assert_eq!(del.parent(), None);
    }

    #[test]
    fn status_helpers_are_case_insensitive() {
        assert!(is_completed_status("Completed"));
        assert!(is_completed_status(" done "));
        assert!(!is_completed_status("in-progress"));
        assert!(is_draft_status("DRAFT"));
        assert!(is_closed_status("mitigated"));
        assert!(!is_closed_status("open"));
    }

    #[test]
    fn parse_date_accepts_plain_and_rfc3339() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date");
        assert_eq!(parse_date("2024-03-05"), Some(expected));
        assert_eq!(parse_date("2024-03-05T10:00:00Z"), Some(expected));
        assert_eq!(parse_date("05/03/2024"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn parse_timestamp_falls_back_to_midnight() {
        let ts = parse_timestamp("2024-03-05").expect("date-only timestamp");
        assert_eq!(ts.to_rfc3339(), "2024-03-05T00:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn progress_accepts_any_number() {
        let entities: Vec<Entity> = serde_json::from_str(
            r#"[
                {"id": "a", "progress": 42.5},
                {"id": "b", "progress": 99999999999999999999},
                {"id": "c", "progress": "75"},
                {"id": "d", "progress": null},
                {"id": "e", "progress": -3},
                {"id": "f", "progress": "lots"}
            ]"#,
        )
        .expect("lenient progress");
        let progress: Vec<i64> = entities.iter().map(|e| e.progress).collect();
        assert_eq!(progress, vec![43, i64::MAX, 75, 0, -3, 0]);
    }

    proptest::proptest! {
        #[test]
        fn timestamp_and_date_agree(offset in 0_i64..40_000, text in ".{0,24}") {
            let base = NaiveDate::from_ymd_opt(1990, 1, 1).expect("valid base");
            let day = base + chrono::Duration::days(offset);
            let raw = day.format("%Y-%m-%d").to_string();
            proptest::prop_assert_eq!(parse_date(&raw), Some(day));
            proptest::prop_assert_eq!(parse_timestamp(&raw).map(|ts| ts.date_naive()), Some(day));

            // Arbitrary input never panics.
            let _ = parse_date(&text);
            let _ = parse_timestamp(&text);
        }
    }
}
