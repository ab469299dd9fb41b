#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use super::artifact_ops::insert_artifact_row;
use super::helpers::{classify_failure_category, not_found, redact_sensitive};
use crate::db::read_ops::{fetch_branch, fetch_node, fetch_project};
use crate::db::{commit, LucidDb};
use crate::error::{LucidError, Result};
use crate::types::{
    BranchId, NewArtifact, NewNode, Node, NodeId, NodeStatus, NodeUpdate, ResponseRef,
};

pub(super) struct NodeInsert<'a> {
    pub(super) project_id: i64,
    pub(super) branch_id: Option<i64>,
    pub(super) parent_id: Option<i64>,
    pub(super) title: Option<&'a str>,
    pub(super) prompt: Option<&'a str>,
}

pub(super) async fn insert_node(
    conn: &mut SqliteConnection,
    node: &NodeInsert<'_>,
    now: DateTime<Utc>,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO nodes (project_id, branch_id, parent_id, title, prompt, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(node.project_id)
    .bind(node.branch_id)
    .bind(node.parent_id)
    .bind(node.title)
    .bind(node.prompt)
    .bind(NodeStatus::Pending.as_str())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| LucidError::DatabaseError(format!("Failed to insert node: {e}")))
}

async fn require_node(conn: &mut SqliteConnection, node_id: NodeId) -> Result<Node> {
    fetch_node(conn, node_id)
        .await?
        .ok_or_else(|| not_found("Node", node_id.value()))
}

fn transition_conflict(node_id: NodeId, from: NodeStatus, to: NodeStatus) -> LucidError {
    LucidError::Conflict(format!(
        "Node {} cannot move from {from} to {to}",
        node_id.value()
    ))
}

impl LucidDb {
    /// # Errors
    /// `NotFound` for an unknown project, branch or parent; `Validation` when the branch or
    /// parent belongs to another project.
    pub async fn create_node(&self, input: &NewNode) -> Result<Node> {
        let mut tx = self.begin().await?;
        fetch_project(&mut tx, input.project_id)
            .await?
            .ok_or_else(|| not_found("Project", input.project_id.value()))?;

        if let Some(branch_id) = input.branch_id {
            let branch = fetch_branch(&mut tx, branch_id)
                .await?
                .ok_or_else(|| not_found("Branch", branch_id.value()))?;
            if branch.project_id != input.project_id {
                return Err(LucidError::Validation(format!(
                    "Branch {} does not belong to project {}",
                    branch_id.value(),
                    input.project_id.value()
                )));
            }
        }
        if let Some(parent_id) = input.parent_id {
            let parent = require_node(&mut tx, parent_id).await?;
            if parent.project_id != input.project_id {
                return Err(LucidError::Validation(format!(
                    "Parent node {} does not belong to project {}",
                    parent_id.value(),
                    input.project_id.value()
                )));
            }
        }

        let node_id = insert_node(
            &mut tx,
            &NodeInsert {
                project_id: input.project_id.value(),
                branch_id: input.branch_id.map(BranchId::value),
                parent_id: input.parent_id.map(NodeId::value),
                title: input.title.as_deref(),
                prompt: input.prompt.as_deref(),
            },
            Utc::now(),
        )
        .await?;
        let node = require_node(&mut tx, NodeId::new(node_id)).await?;
        commit(tx).await?;

        info!(
            project_id = input.project_id.value(),
            node_id,
            "Created node"
        );
        Ok(node)
    }

    /// Compare-and-set on the status column. Commits before returning so readers see
    /// the new state immediately.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `Conflict` when the node is no longer in `from` or
    /// the transition is not allowed.
    pub async fn transition_node_status(
        &self,
        node_id: NodeId,
        from: NodeStatus,
        to: NodeStatus,
    ) -> Result<()> {
        if !from.can_transition_to(to) {
            return Err(transition_conflict(node_id, from, to));
        }

        let result = sqlx::query(
            "UPDATE nodes SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(node_id.value())
        .bind(from.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to update node status: {e}")))?;

        if result.rows_affected() == 0 {
            let current = self.require_node(node_id).await?;
            return Err(transition_conflict(node_id, current.status, to));
        }
        info!(node_id = node_id.value(), from = %from, to = %to, "Node status changed");
        Ok(())
    }

    /// `running -> succeeded` with the response pointer, plus the artifact row for
    /// object-stored output, in one transaction.
    ///
    /// # Errors
    /// `Conflict` if the node is not `running`, or a database error.
    pub async fn complete_node_success(
        &self,
        node_id: NodeId,
        response: &ResponseRef,
        artifact: Option<&NewArtifact>,
    ) -> Result<Node> {
        let now = Utc::now();
        let mut tx = self.begin().await?;

        let result = sqlx::query(
            "UPDATE nodes
             SET status = ?, response_kind = ?, response_ref = ?, error_message = NULL, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(NodeStatus::Succeeded.as_str())
        .bind(response.kind())
        .bind(response.value())
        .bind(now)
        .bind(node_id.value())
        .bind(NodeStatus::Running.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to record node output: {e}")))?;

        if result.rows_affected() == 0 {
            let current = require_node(&mut tx, node_id).await?;
            return Err(transition_conflict(
                node_id,
                current.status,
                NodeStatus::Succeeded,
            ));
        }
        if let Some(artifact) = artifact {
            insert_artifact_row(&mut tx, artifact, now).await?;
        }

        let node = require_node(&mut tx, node_id).await?;
        commit(tx).await?;

        info!(
            node_id = node_id.value(),
            response_kind = response.kind(),
            "Node succeeded"
        );
        Ok(node)
    }

    /// Moves a `pending` or `running` node to `failed`, keeping a redacted message.
    ///
    /// # Errors
    /// `Conflict` if the node is already terminal, or a database error.
    pub async fn complete_node_failure(&self, node_id: NodeId, message: &str) -> Result<Node> {
        let redacted = redact_sensitive(message);
        let mut tx = self.begin().await?;

        let result = sqlx::query(
            "UPDATE nodes SET status = ?, error_message = ?, updated_at = ?
             WHERE id = ? AND status IN (?, ?)",
        )
        .bind(NodeStatus::Failed.as_str())
        .bind(&redacted)
        .bind(Utc::now())
        .bind(node_id.value())
        .bind(NodeStatus::Pending.as_str())
        .bind(NodeStatus::Running.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to record node failure: {e}")))?;

        if result.rows_affected() == 0 {
            let current = require_node(&mut tx, node_id).await?;
            return Err(transition_conflict(node_id, current.status, NodeStatus::Failed));
        }

        let node = require_node(&mut tx, node_id).await?;
        commit(tx).await?;

        warn!(
            node_id = node_id.value(),
            category = classify_failure_category(&redacted),
            error = %redacted,
            "Node failed"
        );
        Ok(node)
    }

    /// Explicit edit of status and/or inline response text.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, `Conflict` for an illegal status change.
    pub async fn update_node(&self, node_id: NodeId, update: &NodeUpdate) -> Result<Node> {
        let mut tx = self.begin().await?;
        let current = require_node(&mut tx, node_id).await?;

        let next_status = match update.status {
            Some(next) if next != current.status => {
                if !current.status.can_transition_to(next) {
                    return Err(transition_conflict(node_id, current.status, next));
                }
                next
            }
            _ => current.status,
        };
        let response = update
            .response_ref
            .clone()
            .map(|text| ResponseRef::Inline { text })
            .or(current.response);

        let result = sqlx::query(
            "UPDATE nodes SET status = ?, response_kind = ?, response_ref = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(next_status.as_str())
        .bind(response.as_ref().map(ResponseRef::kind))
        .bind(response.as_ref().map(ResponseRef::value))
        .bind(Utc::now())
        .bind(node_id.value())
        .bind(current.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to update node: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(LucidError::Conflict(format!(
                "Node {} changed while it was being updated (was {})",
                node_id.value(),
                current.status
            )));
        }

        let node = require_node(&mut tx, node_id).await?;
        commit(tx).await?;
        Ok(node)
    }

    /// Deletes a node with its artifacts and jobs; children keep living with a null parent.
    ///
    /// # Errors
    /// `NotFound` for unknown ids, or a database error.
    pub async fn delete_node(&self, node_id: NodeId) -> Result<()> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = ?")
            .bind(node_id.value())
            .execute(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to delete node: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(not_found("Node", node_id.value()));
        }
        info!(node_id = node_id.value(), "Deleted node");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use crate::db::LucidDb;
    use crate::error::LucidError;
    use crate::types::{NewNode, NewProject, Node, NodeStatus, NodeUpdate, ProjectId, ResponseRef};

    async fn seeded() -> (LucidDb, ProjectId) {
        let db = LucidDb::in_memory().await.expect("db");
        let project = db
            .create_project(&NewProject {
                name: "P1".to_string(),
                description: None,
            })
            .await
            .expect("project");
        (db, project.id)
    }

    async fn node(db: &LucidDb, project_id: ProjectId, parent: Option<&Node>) -> Node {
        db.create_node(&NewNode {
            project_id,
            branch_id: None,
            parent_id: parent.map(|p| p.id),
            title: Some("step".to_string()),
            prompt: Some("do it".to_string()),
        })
        .await
        .expect("node")
    }

    #[tokio::test]
    async fn given_parent_in_other_project_when_creating_node_then_validation_error() {
        let (db, p1) = seeded().await;
        let p2 = db
            .create_project(&NewProject {
                name: "P2".to_string(),
                description: None,
            })
            .await
            .expect("p2");
        let foreign = node(&db, p2.id, None).await;

        let result = db
            .create_node(&NewNode {
                project_id: p1,
                branch_id: None,
                parent_id: Some(foreign.id),
                title: None,
                prompt: None,
            })
            .await;
        assert!(matches!(result, Err(LucidError::Validation(_))));
    }

    #[tokio::test]
    async fn given_pending_node_when_transitioning_twice_then_second_guard_conflicts() {
        let (db, p) = seeded().await;
        let n = node(&db, p, None).await;

        db.transition_node_status(n.id, NodeStatus::Pending, NodeStatus::Running)
            .await
            .expect("first transition");
        let second = db
            .transition_node_status(n.id, NodeStatus::Pending, NodeStatus::Running)
            .await;
        assert!(matches!(second, Err(LucidError::Conflict(_))));
    }

    #[tokio::test]
    async fn given_running_node_when_completed_then_response_is_inline() {
        let (db, p) = seeded().await;
        let n = node(&db, p, None).await;
        db.transition_node_status(n.id, NodeStatus::Pending, NodeStatus::Running)
            .await
            .expect("running");

        let done = db
            .complete_node_success(
                n.id,
                &ResponseRef::Inline {
                    text: "answer".to_string(),
                },
                None,
            )
            .await
            .expect("success");
        assert_eq!(done.status, NodeStatus::Succeeded);
        assert_eq!(
            done.response,
            Some(ResponseRef::Inline {
                text: "answer".to_string()
            })
        );
    }

    #[tokio::test]
    async fn given_terminal_node_when_failing_then_conflict() {
        let (db, p) = seeded().await;
        let n = node(&db, p, None).await;
        let failed = db
            .complete_node_failure(n.id, "cancelled token=abc")
            .await
            .expect("fail");
        assert_eq!(failed.status, NodeStatus::Failed);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("cancelled token=<redacted>")
        );

        let again = db.complete_node_failure(n.id, "again").await;
        assert!(matches!(again, Err(LucidError::Conflict(_))));
    }

    #[tokio::test]
    async fn given_illegal_status_edit_when_updating_then_conflict() {
        let (db, p) = seeded().await;
        let n = node(&db, p, None).await;

        let result = db
            .update_node(
                n.id,
                &NodeUpdate {
                    status: Some(NodeStatus::Succeeded),
                    response_ref: None,
                },
            )
            .await;
        assert!(matches!(result, Err(LucidError::Conflict(_))));

        let edited = db
            .update_node(
                n.id,
                &NodeUpdate {
                    status: None,
                    response_ref: Some("manual note".to_string()),
                },
            )
            .await
            .expect("edit");
        assert_eq!(edited.status, NodeStatus::Pending);
        assert_eq!(
            edited.response,
            Some(ResponseRef::Inline {
                text: "manual note".to_string()
            })
        );
    }

    #[tokio::test]
    async fn given_parent_deleted_then_child_survives_with_null_parent() {
        let (db, p) = seeded().await;
        let parent = node(&db, p, None).await;
        let child = node(&db, p, Some(&parent)).await;
        assert_eq!(
            db.list_children(parent.id).await.expect("children").len(),
            1
        );

        db.delete_node(parent.id).await.expect("delete");
        let orphan = db.require_node(child.id).await.expect("child");
        assert_eq!(orphan.parent_id, None);
    }

    #[tokio::test]
    async fn given_row_left_unchanged_when_updating_then_conflict_instead_of_stale_node() {
        let (db, p) = seeded().await;
        let n = node(&db, p, None).await;
        sqlx::query(
            "CREATE TRIGGER freeze_step BEFORE UPDATE ON nodes WHEN OLD.title = 'step'
             BEGIN SELECT RAISE(IGNORE); END",
        )
        .execute(db.pool())
        .await
        .expect("trigger");

        let result = db
            .update_node(
                n.id,
                &NodeUpdate {
                    status: Some(NodeStatus::Running),
                    response_ref: None,
                },
            )
            .await;

        assert!(matches!(result, Err(LucidError::Conflict(_))));
        let stored = db.require_node(n.id).await.expect("node");
        assert_eq!(stored.status, NodeStatus::Pending);
    }
}
