use std::fmt;

/// Machine-readable error codes surfaced by the CLI and HTTP layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SnapshotNotFound,
    SnapshotParseError,
    ConfigParseError,
    DuplicateNodeId,
    NodeNotFound,
    HierarchyCycle,
    SchedulingCycle,
    InvalidFilterValue,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::SnapshotNotFound => "E1001",
            Self::SnapshotParseError => "E1002",
            Self::ConfigParseError => "E1003",
            Self::DuplicateNodeId => "E2001",
            Self::NodeNotFound => "E2002",
            Self::HierarchyCycle => "E2003",
            Self::SchedulingCycle => "E2004",
            Self::InvalidFilterValue => "E2005",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SnapshotNotFound => "Entity snapshot not found",
            Self::SnapshotParseError => "Entity snapshot parse error",
            Self::ConfigParseError => "Config file parse error",
            Self::DuplicateNodeId => "Duplicate entity ID",
            Self::NodeNotFound => "Entity not found",
            Self::HierarchyCycle => "Parent/child hierarchy contains a cycle",
            Self::SchedulingCycle => "Dependencies between scheduled items contain a cycle",
            Self::InvalidFilterValue => "Invalid type/layer/relation filter value",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::SnapshotNotFound => {
                Some("Pass --snapshot or export entities to .keel/snapshot first.")
            }
            Self::SnapshotParseError => Some("Fix the JSON/YAML syntax of the snapshot and retry."),
            Self::ConfigParseError => Some("Fix syntax in .keel/config.toml and retry."),
            Self::DuplicateNodeId => Some("Every entity ID must be unique across all collections."),
            Self::NodeNotFound => None,
            Self::HierarchyCycle => {
                Some("Re-parent one of the listed entities so the hierarchy forms a tree.")
            }
            Self::SchedulingCycle => {
                Some("Remove one of the listed dependencies to make the schedule acyclic.")
            }
            Self::InvalidFilterValue => Some("Use one of the documented type/layer/relation values."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
