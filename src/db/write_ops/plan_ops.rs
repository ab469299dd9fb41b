#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use chrono::Utc;
use tracing::info;

use super::branch_ops::insert_branch;
use super::helpers::not_found;
use super::node_ops::{insert_node, NodeInsert};
use crate::db::read_ops::{fetch_branch, fetch_branch_nodes, fetch_project};
use crate::db::{commit, LucidDb};
use crate::error::{LucidError, Result};
use crate::types::{Branch, BranchId, BranchStatus, Node, PlanStep, ProjectId};

impl LucidDb {
    /// Inserts a draft branch and one pending node per step, each parented on the
    /// previous one. Either the whole chain commits or nothing does.
    ///
    /// # Errors
    /// `NotFound` for an unknown project, `Validation` for an empty step list, or a
    /// database error (after which no branch or node exists).
    pub async fn create_plan_chain(
        &self,
        project_id: ProjectId,
        branch_name: &str,
        steps: &[PlanStep],
    ) -> Result<(Branch, Vec<Node>)> {
        if steps.is_empty() {
            return Err(LucidError::Validation(
                "A plan needs at least one step".to_string(),
            ));
        }

        let now = Utc::now();
        let mut tx = self.begin().await?;
        fetch_project(&mut tx, project_id)
            .await?
            .ok_or_else(|| not_found("Project", project_id.value()))?;

        let branch_id = insert_branch(
            &mut tx,
            project_id.value(),
            branch_name,
            BranchStatus::Draft,
            None,
            now,
        )
        .await?;

        let mut parent_id = None;
        for step in steps {
            let node_id = insert_node(
                &mut tx,
                &NodeInsert {
                    project_id: project_id.value(),
                    branch_id: Some(branch_id),
                    parent_id,
                    title: Some(step.title.as_str()),
                    prompt: Some(step.prompt.as_str()),
                },
                now,
            )
            .await?;
            parent_id = Some(node_id);
        }

        sqlx::query("UPDATE branches SET head_node_id = ? WHERE id = ?")
            .bind(parent_id)
            .bind(branch_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to set plan head: {e}")))?;

        let branch = fetch_branch(&mut tx, BranchId::new(branch_id))
            .await?
            .ok_or_else(|| not_found("Branch", branch_id))?;
        let nodes = fetch_branch_nodes(&mut tx, branch.id).await?;
        commit(tx).await?;

        info!(
            project_id = project_id.value(),
            branch_id,
            steps = nodes.len(),
            "Created plan chain"
        );
        Ok((branch, nodes))
    }
}
