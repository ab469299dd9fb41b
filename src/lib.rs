pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod orchestration;
pub mod storage;
pub mod types;

pub use config::Settings;
pub use db::LucidDb;
pub use error::{LucidError, Result};
pub use llm::{Completion, CompletionRequest, LlmError, LlmProvider, LlmRouter};
pub use orchestration::{
    Dispatcher, Engine, ExecutionReport, Executor, PlanFormat, PlanOutcome, Planner, Services,
    StaleReport, Worker, WorkerTick, INTERRUPTED_NODE_ERROR,
};
pub use storage::{FsObjectStore, ObjectStore, StorageError};
pub use types::*;
