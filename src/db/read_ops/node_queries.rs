use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db::mappers::{parse_node, parse_nodes};
use crate::db::LucidDb;
use crate::error::{LucidError, Result};
use crate::types::{BranchId, Node, NodeId, NodeStatus, ProjectId};

use super::types::{NodeRow, NODE_SELECT};

pub(crate) async fn fetch_node(
    conn: &mut SqliteConnection,
    node_id: NodeId,
) -> Result<Option<Node>> {
    sqlx::query_as::<_, NodeRow>(&format!("{NODE_SELECT} WHERE id = ?"))
        .bind(node_id.value())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to get node: {e}")))?
        .map(parse_node)
        .transpose()
}

pub(crate) async fn fetch_branch_nodes(
    conn: &mut SqliteConnection,
    branch_id: BranchId,
) -> Result<Vec<Node>> {
    sqlx::query_as::<_, NodeRow>(&format!("{NODE_SELECT} WHERE branch_id = ? ORDER BY id ASC"))
        .bind(branch_id.value())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to list branch nodes: {e}")))
        .and_then(parse_nodes)
}

impl LucidDb {
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn get_node(&self, node_id: NodeId) -> Result<Option<Node>> {
        let mut conn = self.pool().acquire().await?;
        fetch_node(&mut conn, node_id).await
    }

    /// # Errors
    /// Returns `NotFound` for unknown ids or a database error.
    pub async fn require_node(&self, node_id: NodeId) -> Result<Node> {
        self.get_node(node_id)
            .await?
            .ok_or_else(|| LucidError::NotFound(format!("Node {} not found", node_id.value())))
    }

    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn list_branch_nodes(&self, branch_id: BranchId) -> Result<Vec<Node>> {
        let mut conn = self.pool().acquire().await?;
        fetch_branch_nodes(&mut conn, branch_id).await
    }

    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn list_project_nodes(&self, project_id: ProjectId) -> Result<Vec<Node>> {
        sqlx::query_as::<_, NodeRow>(&format!("{NODE_SELECT} WHERE project_id = ? ORDER BY id ASC"))
            .bind(project_id.value())
            .fetch_all(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to list project nodes: {e}")))
            .and_then(parse_nodes)
    }

    /// Direct children via the parent index.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn list_children(&self, node_id: NodeId) -> Result<Vec<Node>> {
        sqlx::query_as::<_, NodeRow>(&format!("{NODE_SELECT} WHERE parent_id = ? ORDER BY id ASC"))
            .bind(node_id.value())
            .fetch_all(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to list child nodes: {e}")))
            .and_then(parse_nodes)
    }

    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn list_nodes_with_status(&self, status: NodeStatus) -> Result<Vec<Node>> {
        sqlx::query_as::<_, NodeRow>(&format!("{NODE_SELECT} WHERE status = ? ORDER BY id ASC"))
            .bind(status.as_str())
            .fetch_all(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to list nodes by status: {e}")))
            .and_then(parse_nodes)
    }

    /// Nodes that entered `running` before `cutoff` and never finished.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn stale_running_nodes(&self, cutoff: DateTime<Utc>) -> Result<Vec<Node>> {
        self.list_nodes_with_status(NodeStatus::Running)
            .await
            .map(|nodes| {
                nodes
                    .into_iter()
                    .filter(|node| node.updated_at < cutoff)
                    .collect()
            })
    }
}
