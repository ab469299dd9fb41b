use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a node: `pending -> running -> {succeeded, failed}`.
///
/// `pending` may also move straight to `failed` (cancellation or a dispatch-time failure).
/// Terminal states never transition again; re-running a step means creating a new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl NodeStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Failed)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Accepts canonical names plus the legacy spellings older rows were written with.
impl TryFrom<&str> for NodeStatus {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" | "ok" | "completed" => Ok(Self::Succeeded),
            "failed" | "error" => Ok(Self::Failed),
            _ => Err(format!("Unknown node status: {s}")),
        }
    }
}

impl TryFrom<String> for NodeStatus {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, String> {
        Self::try_from(s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Active,
    Draft,
    Merged,
}

impl BranchStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draft => "draft",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for BranchStatus {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "draft" => Ok(Self::Draft),
            "merged" => Ok(Self::Merged),
            _ => Err(format!("Unknown branch status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for JobStatus {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, String> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown job status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BranchStatus, JobStatus, NodeStatus};

    #[test]
    fn legacy_node_status_strings_canonicalize() {
        assert_eq!(NodeStatus::try_from("ok"), Ok(NodeStatus::Succeeded));
        assert_eq!(NodeStatus::try_from("completed"), Ok(NodeStatus::Succeeded));
        assert_eq!(NodeStatus::try_from("error"), Ok(NodeStatus::Failed));
        assert_eq!(NodeStatus::try_from(" Running "), Ok(NodeStatus::Running));
        assert!(NodeStatus::try_from("paused").is_err());
    }

    #[test]
    fn terminal_states_never_transition() {
        for terminal in [NodeStatus::Succeeded, NodeStatus::Failed] {
            for next in [
                NodeStatus::Pending,
                NodeStatus::Running,
                NodeStatus::Succeeded,
                NodeStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(NodeStatus::Pending.can_transition_to(NodeStatus::Running));
        assert!(NodeStatus::Pending.can_transition_to(NodeStatus::Failed));
        assert!(NodeStatus::Running.can_transition_to(NodeStatus::Succeeded));
        assert!(NodeStatus::Running.can_transition_to(NodeStatus::Failed));
        assert!(!NodeStatus::Running.can_transition_to(NodeStatus::Pending));
        assert!(!NodeStatus::Pending.can_transition_to(NodeStatus::Succeeded));
    }

    #[test]
    fn legacy_spellings_are_accepted_when_deserializing() {
        let parsed: Result<NodeStatus, _> = serde_json::from_str("\"completed\"");
        assert_eq!(parsed.ok(), Some(NodeStatus::Succeeded));
        assert_eq!(
            serde_json::to_string(&NodeStatus::Succeeded).ok().as_deref(),
            Some("\"succeeded\"")
        );
    }

    #[test]
    fn branch_and_job_status_round_trip_through_str() {
        assert_eq!(BranchStatus::try_from("merged"), Ok(BranchStatus::Merged));
        assert_eq!(JobStatus::try_from(JobStatus::Running.as_str()), Ok(JobStatus::Running));
        assert!(JobStatus::Queued.is_active());
        assert!(!JobStatus::Done.is_active());
    }
}
