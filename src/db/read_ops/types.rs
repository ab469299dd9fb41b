use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub(crate) const PROJECT_SELECT: &str =
    "SELECT id, name, description, created_at FROM projects";

pub(crate) const BRANCH_SELECT: &str =
    "SELECT id, project_id, name, status, base_node_id, head_node_id, created_at FROM branches";

pub(crate) const NODE_SELECT: &str =
    "SELECT id, project_id, branch_id, parent_id, title, prompt, response_kind, response_ref,
            error_message, status, created_at, updated_at
     FROM nodes";

pub(crate) const ARTIFACT_SELECT: &str =
    "SELECT id, node_id, file_path, file_type, content_hash, byte_length, created_at FROM artifacts";

pub(crate) const JOB_SELECT: &str =
    "SELECT id, node_id, status, attempts, worker_id, error, enqueued_at, started_at, finished_at,
            lease_expires_at
     FROM jobs";

#[derive(FromRow)]
pub(crate) struct ProjectRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(FromRow)]
pub(crate) struct BranchRow {
    pub(crate) id: i64,
    pub(crate) project_id: i64,
    pub(crate) name: String,
    pub(crate) status: String,
    pub(crate) base_node_id: Option<i64>,
    pub(crate) head_node_id: Option<i64>,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(FromRow)]
pub(crate) struct NodeRow {
    pub(crate) id: i64,
    pub(crate) project_id: i64,
    pub(crate) branch_id: Option<i64>,
    pub(crate) parent_id: Option<i64>,
    pub(crate) title: Option<String>,
    pub(crate) prompt: Option<String>,
    pub(crate) response_kind: Option<String>,
    pub(crate) response_ref: Option<String>,
    pub(crate) error_message: Option<String>,
    pub(crate) status: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
pub(crate) struct ArtifactRow {
    pub(crate) id: i64,
    pub(crate) node_id: i64,
    pub(crate) file_path: String,
    pub(crate) file_type: String,
    pub(crate) content_hash: Option<String>,
    pub(crate) byte_length: i64,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(FromRow)]
pub(crate) struct JobRow {
    pub(crate) id: i64,
    pub(crate) node_id: i64,
    pub(crate) status: String,
    pub(crate) attempts: i64,
    pub(crate) worker_id: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) enqueued_at: DateTime<Utc>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
    pub(crate) lease_expires_at: Option<DateTime<Utc>>,
}
