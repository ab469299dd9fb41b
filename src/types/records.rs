use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identifiers::{ArtifactId, BranchId, JobId, NodeId, ProjectId};
use super::status::{BranchStatus, JobStatus, NodeStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub project_id: ProjectId,
    pub name: String,
    pub status: BranchStatus,
    pub base_node_id: Option<NodeId>,
    pub head_node_id: Option<NodeId>,
    pub created_at: DateTime<Utc>,
}

/// Where a node's output lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseRef {
    Inline { text: String },
    Object { key: String },
}

impl ResponseRef {
    pub const INLINE: &'static str = "inline";
    pub const OBJECT: &'static str = "object";

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Inline { .. } => Self::INLINE,
            Self::Object { .. } => Self::OBJECT,
        }
    }

    /// The stored column value: inline text or object-store key.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Inline { text } => text,
            Self::Object { key } => key,
        }
    }

    /// Rows written before `response_kind` existed carry literal output text.
    pub fn from_columns(kind: Option<&str>, value: Option<String>) -> Result<Option<Self>, String> {
        match (kind, value) {
            (_, None) => Ok(None),
            (None | Some(Self::INLINE), Some(text)) => Ok(Some(Self::Inline { text })),
            (Some(Self::OBJECT), Some(key)) => Ok(Some(Self::Object { key })),
            (Some(other), Some(_)) => Err(format!("Unknown response kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub project_id: ProjectId,
    pub branch_id: Option<BranchId>,
    pub parent_id: Option<NodeId>,
    pub title: Option<String>,
    pub prompt: Option<String>,
    pub response: Option<ResponseRef>,
    pub status: NodeStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    #[must_use]
    pub fn prompt_text(&self) -> &str {
        self.prompt.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub node_id: NodeId,
    pub file_path: String,
    pub file_type: String,
    pub content_hash: Option<String>,
    pub byte_length: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub node_id: NodeId,
    pub status: JobStatus,
    pub attempts: u32,
    pub worker_id: Option<String>,
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// A `running` job whose lease has passed may be claimed by another worker.
    pub lease_expires_at: Option<DateTime<Utc>>,
}

impl Job {
    #[must_use]
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Running && self.lease_expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewBranch {
    pub project_id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub base_node_id: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewNode {
    pub project_id: ProjectId,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Explicit node edit. Status changes still obey [`NodeStatus::can_transition_to`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub status: Option<NodeStatus>,
    #[serde(default)]
    pub response_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArtifact {
    pub node_id: NodeId,
    pub file_path: String,
    pub file_type: String,
    pub content_hash: Option<String>,
    pub byte_length: u64,
}

/// One planned step before it becomes a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub title: String,
    pub prompt: String,
}
