use crate::error::{LucidError, Result};
use crate::types::{
    Artifact, Branch, BranchStatus, Job, JobStatus, Node, NodeStatus, Project, ResponseRef,
};

use super::read_ops::{ArtifactRow, BranchRow, JobRow, NodeRow, ProjectRow};

pub fn parse_project(row: ProjectRow) -> Project {
    Project {
        id: row.id.into(),
        name: row.name,
        description: row.description,
        created_at: row.created_at,
    }
}

pub fn parse_branch(row: BranchRow) -> Result<Branch> {
    let status = BranchStatus::try_from(row.status.as_str()).map_err(LucidError::DatabaseError)?;

    Ok(Branch {
        id: row.id.into(),
        project_id: row.project_id.into(),
        name: row.name,
        status,
        base_node_id: row.base_node_id.map(Into::into),
        head_node_id: row.head_node_id.map(Into::into),
        created_at: row.created_at,
    })
}

/// Legacy status spellings and kind-less responses are canonicalized here.
pub fn parse_node(row: NodeRow) -> Result<Node> {
    let status = NodeStatus::try_from(row.status.as_str()).map_err(LucidError::DatabaseError)?;
    let response = ResponseRef::from_columns(row.response_kind.as_deref(), row.response_ref)
        .map_err(LucidError::DatabaseError)?;

    Ok(Node {
        id: row.id.into(),
        project_id: row.project_id.into(),
        branch_id: row.branch_id.map(Into::into),
        parent_id: row.parent_id.map(Into::into),
        title: row.title,
        prompt: row.prompt,
        response,
        status,
        error_message: row.error_message,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub fn parse_artifact(row: ArtifactRow) -> Artifact {
    Artifact {
        id: row.id.into(),
        node_id: row.node_id.into(),
        file_path: row.file_path,
        file_type: row.file_type,
        content_hash: row.content_hash,
        byte_length: to_u64_i64(row.byte_length),
        created_at: row.created_at,
    }
}

pub fn parse_job(row: JobRow) -> Result<Job> {
    let status = JobStatus::try_from(row.status.as_str()).map_err(LucidError::DatabaseError)?;

    Ok(Job {
        id: row.id.into(),
        node_id: row.node_id.into(),
        status,
        attempts: u32::try_from(to_u64_i64(row.attempts)).unwrap_or(u32::MAX),
        worker_id: row.worker_id,
        error: row.error,
        enqueued_at: row.enqueued_at,
        started_at: row.started_at,
        finished_at: row.finished_at,
        lease_expires_at: row.lease_expires_at,
    })
}

pub fn parse_nodes(rows: Vec<NodeRow>) -> Result<Vec<Node>> {
    rows.into_iter().map(parse_node).collect()
}

pub fn to_u64_i64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub fn to_i64_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{parse_node, to_i64_u64, to_u64_i64};
    use crate::db::read_ops::NodeRow;
    use crate::types::{NodeStatus, ResponseRef};
    use chrono::Utc;

    fn legacy_row(status: &str) -> NodeRow {
        NodeRow {
            id: 1,
            project_id: 1,
            branch_id: None,
            parent_id: None,
            title: Some("Step".to_string()),
            prompt: Some("do it".to_string()),
            response_kind: None,
            response_ref: Some("literal output".to_string()),
            error_message: None,
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn signed_unsigned_helpers_clamp() {
        assert_eq!(to_u64_i64(3), 3);
        assert_eq!(to_u64_i64(-2), 0);
        assert_eq!(to_i64_u64(u64::MAX), i64::MAX);
    }

    #[test]
    fn given_legacy_completed_row_when_parsing_then_status_is_succeeded_and_output_inline() {
        let node = parse_node(legacy_row("completed"));
        assert!(node.is_ok());
        if let Ok(node) = node {
            assert_eq!(node.status, NodeStatus::Succeeded);
            assert_eq!(
                node.response,
                Some(ResponseRef::Inline {
                    text: "literal output".to_string()
                })
            );
        }
    }

    #[test]
    fn given_unknown_status_when_parsing_then_database_error_is_returned() {
        assert!(parse_node(legacy_row("paused")).is_err());
    }
}
