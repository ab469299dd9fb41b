//! Planning, execution and dispatch of nodes.

mod dispatch;
mod engine;
mod executor;
mod plan_parsing;
mod planner;
mod worker;

use std::sync::Arc;

pub use dispatch::{Dispatcher, StaleReport};
pub use engine::{Engine, Generation};
pub use executor::{read_response, ExecutionReport, Executor, EXECUTOR_SYSTEM_PROMPT};
pub use plan_parsing::{
    parse_json_steps, parse_numbered_steps, parse_plan, planning_prompt, truncate_chars,
    PlanFormat, PLANNER_SYSTEM_PROMPT,
};
pub use planner::{PlanOutcome, Planner};
pub use worker::{Worker, WorkerTick, INTERRUPTED_NODE_ERROR};

use crate::config::ExecutionSettings;
use crate::db::LucidDb;
use crate::llm::LlmProvider;
use crate::storage::ObjectStore;

/// Everything the API and worker need, wired from one set of collaborators.
#[derive(Clone)]
pub struct Services {
    pub db: LucidDb,
    pub store: Arc<dyn ObjectStore>,
    pub planner: Planner,
    pub executor: Executor,
    pub dispatcher: Dispatcher,
    pub engine: Engine,
}

impl Services {
    #[must_use]
    pub fn new(
        db: LucidDb,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn ObjectStore>,
        execution: ExecutionSettings,
    ) -> Self {
        let executor = Executor::new(
            db.clone(),
            Arc::clone(&llm),
            Arc::clone(&store),
            execution.inline_output_limit,
        );
        Self {
            planner: Planner::new(db.clone(), llm, execution.plan_format),
            dispatcher: Dispatcher::new(db.clone()),
            engine: Engine::new(db.clone(), executor.clone()),
            executor,
            store,
            db,
        }
    }
}
