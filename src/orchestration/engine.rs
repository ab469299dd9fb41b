use serde::Serialize;
use tracing::info;

use super::executor::{ExecutionReport, Executor};
use crate::db::LucidDb;
use crate::error::{LucidError, Result};
use crate::types::{BranchId, NewNode, Node, NodeId, ProjectId};

const GENERATED_NODE_TITLE: &str = "Reasoning Step";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Generation {
    pub node: Node,
    pub report: ExecutionReport,
}

/// In-request generation: create a node for the prompt and execute it immediately.
#[derive(Clone)]
pub struct Engine {
    db: LucidDb,
    executor: Executor,
}

impl Engine {
    #[must_use]
    pub const fn new(db: LucidDb, executor: Executor) -> Self {
        Self { db, executor }
    }

    /// # Errors
    /// `Validation` for a blank prompt, plus anything node creation or execution rejects.
    pub async fn generate(
        &self,
        project_id: ProjectId,
        branch_id: Option<BranchId>,
        parent_id: Option<NodeId>,
        prompt: &str,
    ) -> Result<Generation> {
        if prompt.trim().is_empty() {
            return Err(LucidError::Validation(
                "Prompt must not be empty".to_string(),
            ));
        }

        let created = self
            .db
            .create_node(&NewNode {
                project_id,
                branch_id,
                parent_id,
                title: Some(GENERATED_NODE_TITLE.to_string()),
                prompt: Some(prompt.to_string()),
            })
            .await?;
        let report = self.executor.execute_node(created.id).await?;
        let node = self.db.require_node(created.id).await?;

        info!(
            project_id = project_id.value(),
            node_id = node.id.value(),
            status = %node.status,
            "Generated node"
        );
        Ok(Generation { node, report })
    }
}
