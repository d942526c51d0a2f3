//! Rule-based health checks over a snapshot.
//!
//! Each analyzer returns an itemized issue list plus a 0–100 summary score.
//! They are shallow by intent: a handful of counting rules over the same
//! entities the graph is built from.
//!
//! | Analyzer | Looks at | Score |
//! |----------|----------|-------|
//! | [`coverage`] | objectives → deliverables → work items | covered objectives % |
//! | [`staleness`] | `updated_at` of every entity | fresh entities % |
//! | [`bottleneck`] | dependents, risks, problems | 100 minus severity penalties |

pub mod bottleneck;
pub mod coverage;
pub mod staleness;

pub use bottleneck::{Bottleneck, BottleneckKind, BottleneckReport, Severity, analyze_bottlenecks};
pub use coverage::{CoverageIssue, CoverageIssueKind, CoverageReport, analyze_coverage};
pub use staleness::{Recommendation, StaleEntity, StaleLevel, StalenessReport, analyze_staleness};

/// `part * 100 / whole`, rounding down; 100 for an empty whole.
pub(crate) fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 100;
    }
    u8::try_from(part.min(whole) * 100 / whole).unwrap_or(100)
}
