#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use super::helpers::{map_insert_error, not_found};
use crate::db::read_ops::{fetch_branch, fetch_node, fetch_project};
use crate::db::{commit, LucidDb};
use crate::error::{LucidError, Result};
use crate::types::{Branch, BranchId, BranchStatus, NewBranch, NodeId, ProjectId};

pub(super) async fn insert_branch(
    conn: &mut SqliteConnection,
    project_id: i64,
    name: &str,
    status: BranchStatus,
    base_node_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO branches (project_id, name, status, base_node_id, created_at)
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(project_id)
    .bind(name)
    .bind(status.as_str())
    .bind(base_node_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        map_insert_error(
            e,
            "branch",
            &format!("Branch '{name}' already exists in project {project_id}"),
        )
    })
}

/// The node must exist and live in `project_id`.
async fn require_node_in_project(
    conn: &mut SqliteConnection,
    node_id: NodeId,
    project_id: ProjectId,
    role: &str,
) -> Result<()> {
    let node = fetch_node(conn, node_id)
        .await?
        .ok_or_else(|| not_found("Node", node_id.value()))?;
    if node.project_id == project_id {
        Ok(())
    } else {
        Err(LucidError::Validation(format!(
            "{role} node {} belongs to project {}, not {}",
            node_id.value(),
            node.project_id.value(),
            project_id.value()
        )))
    }
}

impl LucidDb {
    /// # Errors
    /// `NotFound` for an unknown project or base node, `Validation` for a blank or
    /// duplicate name or a base node from another project.
    pub async fn create_branch(&self, input: &NewBranch) -> Result<Branch> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(LucidError::Validation(
                "Branch name must not be empty".to_string(),
            ));
        }

        let mut tx = self.begin().await?;
        fetch_project(&mut tx, input.project_id)
            .await?
            .ok_or_else(|| not_found("Project", input.project_id.value()))?;
        if let Some(base) = input.base_node_id {
            require_node_in_project(&mut tx, base, input.project_id, "Base").await?;
        }

        let branch_id = insert_branch(
            &mut tx,
            input.project_id.value(),
            name,
            BranchStatus::Active,
            input.base_node_id.map(NodeId::value),
            Utc::now(),
        )
        .await?;
        let branch = fetch_branch(&mut tx, BranchId::new(branch_id))
            .await?
            .ok_or_else(|| not_found("Branch", branch_id))?;
        commit(tx).await?;

        info!(
            project_id = input.project_id.value(),
            branch_id,
            name = %branch.name,
            "Created branch"
        );
        Ok(branch)
    }

    /// Marks the branch merged. No node content moves.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `Conflict` if the branch is already merged.
    pub async fn merge_branch(&self, branch_id: BranchId) -> Result<Branch> {
        let mut tx = self.begin().await?;
        let branch = fetch_branch(&mut tx, branch_id)
            .await?
            .ok_or_else(|| not_found("Branch", branch_id.value()))?;
        if branch.status == BranchStatus::Merged {
            return Err(LucidError::Conflict(format!(
                "Branch {} is already merged",
                branch_id.value()
            )));
        }

        sqlx::query("UPDATE branches SET status = ? WHERE id = ?")
            .bind(BranchStatus::Merged.as_str())
            .bind(branch_id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to merge branch: {e}")))?;

        let merged = fetch_branch(&mut tx, branch_id)
            .await?
            .ok_or_else(|| not_found("Branch", branch_id.value()))?;
        commit(tx).await?;

        info!(branch_id = branch_id.value(), "Merged branch");
        Ok(merged)
    }

    /// # Errors
    /// `NotFound` for an unknown branch or node, `Validation` if the node belongs to
    /// another project.
    pub async fn set_branch_head(&self, branch_id: BranchId, node_id: NodeId) -> Result<Branch> {
        let mut tx = self.begin().await?;
        let branch = fetch_branch(&mut tx, branch_id)
            .await?
            .ok_or_else(|| not_found("Branch", branch_id.value()))?;
        require_node_in_project(&mut tx, node_id, branch.project_id, "Head").await?;

        sqlx::query("UPDATE branches SET head_node_id = ? WHERE id = ?")
            .bind(node_id.value())
            .bind(branch_id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to set branch head: {e}")))?;

        let updated = fetch_branch(&mut tx, branch_id)
            .await?
            .ok_or_else(|| not_found("Branch", branch_id.value()))?;
        commit(tx).await?;
        Ok(updated)
    }

    /// Deletes a branch and, through the cascade, its nodes.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, or a database error.
    pub async fn delete_branch(&self, branch_id: BranchId) -> Result<()> {
        let result = sqlx::query("DELETE FROM branches WHERE id = ?")
            .bind(branch_id.value())
            .execute(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to delete branch: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(not_found("Branch", branch_id.value()));
        }
        info!(branch_id = branch_id.value(), "Deleted branch");
        Ok(())
    }
}
