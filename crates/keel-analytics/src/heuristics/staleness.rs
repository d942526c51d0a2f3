//! Age-based staleness buckets.
//!
//! Age is measured from `updated_at` to `now` in whole days. With threshold
//! `t`:
//!
//! ```text
//! age <  t    fresh
//! age >= t    stale
//! age >= 2t   very-stale
//! age >= 4t   abandoned
//! ```
//!
//! Entities with a missing or unparseable `updated_at` are counted as
//! `unknown_age` and excluded from the freshness score.

use chrono::{DateTime, Utc};
use keel_core::config::StalenessOptions;
use keel_core::model::{Entity, NodeType, is_completed_status, is_draft_status, parse_timestamp};
use serde::Serialize;
use tracing::{debug, instrument};

use super::percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleLevel {
    Stale,
    VeryStale,
    Abandoned,
}

impl StaleLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stale => "stale",
            Self::VeryStale => "very-stale",
            Self::Abandoned => "abandoned",
        }
    }

    /// Bucket for `age_days`, or `None` while still fresh.
    #[must_use]
    pub const fn classify(age_days: i64, threshold_days: i64) -> Option<Self> {
        let t = if threshold_days < 1 { 1 } else { threshold_days };
        if age_days >= t.saturating_mul(4) {
            Some(Self::Abandoned)
        } else if age_days >= t.saturating_mul(2) {
            Some(Self::VeryStale)
        } else if age_days >= t {
            Some(Self::Stale)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Archive,
    Delete,
    Review,
}

impl Recommendation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Delete => "delete",
            Self::Review => "review",
        }
    }

    #[must_use]
    pub fn for_status(status: &str, level: StaleLevel) -> Self {
        if is_completed_status(status) {
            Self::Archive
        } else if is_unstarted(status) && level >= StaleLevel::VeryStale {
            Self::Delete
        } else {
            Self::Review
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleEntity {
    pub id: String,
    pub node_type: NodeType,
    pub title: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
    pub age_days: i64,
    pub level: StaleLevel,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StalenessSummary {
    pub total: usize,
    pub fresh: usize,
    pub stale: usize,
    pub very_stale: usize,
    pub abandoned: usize,
    pub unknown_age: usize,
    /// Fresh share of entities with a known age.
    pub freshness_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StalenessReport {
    pub threshold_days: i64,
    pub now: DateTime<Utc>,
    /// Oldest first.
    pub items: Vec<StaleEntity>,
    pub summary: StalenessSummary,
}

#[must_use]
#[instrument(skip(entities))]
pub fn analyze_staleness<'a, I>(
    entities: I,
    options: &StalenessOptions,
    now: DateTime<Utc>,
) -> StalenessReport
where
    I: IntoIterator<Item = &'a Entity>,
{
    let threshold = options.threshold_days.max(1);
    let mut summary = StalenessSummary::default();
    let mut items = Vec::new();

    for entity in entities {
        summary.total += 1;
        let Some(updated_at) = entity.updated_at.as_deref().and_then(parse_timestamp) else {
            summary.unknown_age += 1;
            continue;
        };
        let age_days = now.signed_duration_since(updated_at).num_days().max(0);
        let Some(level) = StaleLevel::classify(age_days, threshold) else {
            summary.fresh += 1;
            continue;
        };
        match level {
            StaleLevel::Stale => summary.stale += 1,
            StaleLevel::VeryStale => summary.very_stale += 1,
            StaleLevel::Abandoned => summary.abandoned += 1,
        }
        items.push(StaleEntity {
            id: entity.id.trim().to_string(),
            node_type: entity.kind,
            title: entity.title.clone(),
            status: entity.status.clone(),
            updated_at,
            age_days,
            level,
            recommendation: Recommendation::for_status(&entity.status, level),
        });
    }

    items.sort_by(|a, b| b.age_days.cmp(&a.age_days).then_with(|| a.id.cmp(&b.id)));
    summary.freshness_score = percent(summary.fresh, summary.total - summary.unknown_age);

    debug!(
        stale = items.len(),
        unknown = summary.unknown_age,
        score = summary.freshness_score,
        "staleness analyzed"
    );

    StalenessReport {
        threshold_days: threshold,
        now,
        items,
        summary,
    }
}

fn is_unstarted(status: &str) -> bool {
    is_draft_status(status) || status.trim().eq_ignore_ascii_case("pending")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).single().expect("valid now")
    }

    fn aged(id: &str, status: &str, updated: &str) -> Entity {
        Entity::new(id, NodeType::WorkItem, id)
            .with_status(status)
            .with_updated_at(updated)
    }

    fn options() -> StalenessOptions {
        StalenessOptions::default()
    }

    #[test]
    fn classify_buckets() {
        assert_eq!(StaleLevel::classify(29, 30), None);
        assert_eq!(StaleLevel::classify(30, 30), Some(StaleLevel::Stale));
        assert_eq!(StaleLevel::classify(60, 30), Some(StaleLevel::VeryStale));
        assert_eq!(StaleLevel::classify(119, 30), Some(StaleLevel::VeryStale));
        assert_eq!(StaleLevel::classify(120, 30), Some(StaleLevel::Abandoned));
        assert_eq!(StaleLevel::classify(5, 0), Some(StaleLevel::Abandoned));
    }

    #[test]
    fn recommendations_follow_status_and_age() {
        assert_eq!(
            Recommendation::for_status("done", StaleLevel::Stale),
            Recommendation::Archive
        );
        assert_eq!(
            Recommendation::for_status("draft", StaleLevel::VeryStale),
            Recommendation::Delete
        );
        assert_eq!(
            Recommendation::for_status("Pending", StaleLevel::Abandoned),
            Recommendation::Delete
        );
        assert_eq!(
            Recommendation::for_status("draft", StaleLevel::Stale),
            Recommendation::Review
        );
        assert_eq!(
            Recommendation::for_status("in-progress", StaleLevel::Abandoned),
            Recommendation::Review
        );
    }

    #[test]
    fn report_counts_and_orders() {
        let entities = vec![
            aged("fresh", "in-progress", "2024-06-20T00:00:00Z"),
            aged("stale", "in-progress", "2024-05-25T00:00:00Z"),
            aged("old-draft", "draft", "2024-04-01"),
            aged("ancient", "completed", "2023-12-01T00:00:00Z"),
            Entity::new("no-date", NodeType::Objective, "x"),
            aged("garbage", "draft", "last tuesday"),
        ];
        let report = analyze_staleness(&entities, &options(), now());

        assert_eq!(report.summary.total, 6);
        assert_eq!(report.summary.fresh, 1);
        assert_eq!(report.summary.stale, 1);
        assert_eq!(report.summary.very_stale, 1);
        assert_eq!(report.summary.abandoned, 1);
        assert_eq!(report.summary.unknown_age, 2);
        assert_eq!(report.summary.freshness_score, 25);

        let ids: Vec<&str> = report.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ancient", "old-draft", "stale"]);
        assert_eq!(report.items[0].recommendation, Recommendation::Archive);
        assert_eq!(report.items[1].recommendation, Recommendation::Delete);
        assert_eq!(report.items[2].recommendation, Recommendation::Review);
    }

    #[test]
    fn nothing_dated_is_fully_fresh() {
        let entities = vec![Entity::new("a", NodeType::WorkItem, "a")];
        let report = analyze_staleness(&entities, &options(), now());
        assert_eq!(report.summary.freshness_score, 100);
        assert!(report.items.is_empty());
    }

    #[test]
    fn future_timestamps_count_as_fresh() {
        let entities = vec![aged("later", "in-progress", "2024-08-01T00:00:00Z")];
        let report = analyze_staleness(&entities, &options(), now());
        assert_eq!(report.summary.fresh, 1);
    }

    #[test]
    fn custom_threshold() {
        let entities = vec![aged("a", "in-progress", "2024-06-20T00:00:00Z")];
        let report = analyze_staleness(&entities, &StalenessOptions { threshold_days: 7 }, now());
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].level, StaleLevel::Stale);
        assert_eq!(report.threshold_days, 7);
    }
}
