use keel_core::error::ErrorCode;

/// Faults that abort one analytics computation.
///
/// Each variant carries enough context to render without the graph at hand;
/// cycle variants hold the offending id sequence in edge order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyticsError {
    /// Two entities in the snapshot share an id.
    #[error("duplicate entity id: {0}")]
    DuplicateNodeId(String),

    /// The parent/child hierarchy is not a forest.
    #[error("hierarchy cycle: {}", .path.join(" -> "))]
    HierarchyCycle { path: Vec<String> },

    /// Dependencies among dated items loop back on themselves.
    #[error("scheduling cycle: {}", .path.join(" -> "))]
    SchedulingCycle { path: Vec<String> },
}

impl AnalyticsError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateNodeId(_) => ErrorCode::DuplicateNodeId,
            Self::HierarchyCycle { .. } => ErrorCode::HierarchyCycle,
            Self::SchedulingCycle { .. } => ErrorCode::SchedulingCycle,
        }
    }

    /// The offending id sequence for cycle errors.
    #[must_use]
    pub fn cycle_path(&self) -> Option<&[String]> {
        match self {
            Self::HierarchyCycle { path } | Self::SchedulingCycle { path } => Some(path),
            Self::DuplicateNodeId(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_errors_render_the_path() {
        let err = AnalyticsError::SchedulingCycle {
            path: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "scheduling cycle: a -> b -> c");
        assert_eq!(err.code(), ErrorCode::SchedulingCycle);
        assert_eq!(err.cycle_path().map(<[String]>::len), Some(3));
    }

    #[test]
    fn duplicate_id_has_no_path() {
        let err = AnalyticsError::DuplicateNodeId("wi-1".into());
        assert_eq!(err.code().code(), "E2001");
        assert!(err.cycle_path().is_none());
    }
}
