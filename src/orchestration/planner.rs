use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::plan_parsing::{parse_plan, planning_prompt, PlanFormat, PLANNER_SYSTEM_PROMPT};
use crate::db::LucidDb;
use crate::error::{LucidError, Result};
use crate::llm::{CompletionRequest, LlmError, LlmProvider};
use crate::types::{Branch, Node, ProjectId};

/// A plan as persisted: the new draft branch and its node chain in step order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
    pub branch: Branch,
    pub nodes: Vec<Node>,
}

#[derive(Clone)]
pub struct Planner {
    db: LucidDb,
    llm: Arc<dyn LlmProvider>,
    default_format: PlanFormat,
}

impl Planner {
    #[must_use]
    pub fn new(db: LucidDb, llm: Arc<dyn LlmProvider>, default_format: PlanFormat) -> Self {
        Self {
            db,
            llm,
            default_format,
        }
    }

    /// Asks the model to decompose `goal` and stores the steps as a chain under a new
    /// `ai-plan-*` branch. Nothing is written unless the whole chain is.
    ///
    /// # Errors
    /// `Validation` for a blank goal, `NotFound` for an unknown project (checked before
    /// the model is called), `Provider` when the model fails or yields no steps.
    pub async fn generate_plan(
        &self,
        project_id: ProjectId,
        goal: &str,
        format: Option<PlanFormat>,
    ) -> Result<PlanOutcome> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(LucidError::Validation("Goal must not be empty".to_string()));
        }
        self.db.require_project(project_id).await?;

        let format = format.unwrap_or(self.default_format);
        let request = CompletionRequest::new(planning_prompt(goal, format))
            .with_system(PLANNER_SYSTEM_PROMPT)
            .with_temperature(0.0);
        let completion = self.llm.complete(&request).await?;

        let steps = parse_plan(&completion.text, format);
        if steps.is_empty() {
            return Err(LlmError::MalformedResponse {
                provider: completion.provider,
                detail: "planner response contained no steps".to_string(),
            }
            .into());
        }

        let (branch, nodes) = self
            .db
            .create_plan_chain(project_id, &plan_branch_name(), &steps)
            .await?;

        info!(
            project_id = project_id.value(),
            branch_id = branch.id.value(),
            provider = completion.provider,
            format = %format,
            steps = nodes.len(),
            "Plan generated"
        );
        Ok(PlanOutcome { branch, nodes })
    }
}

fn plan_branch_name() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "ai-plan-{}-{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        suffix.get(..8).unwrap_or(&suffix)
    )
}
