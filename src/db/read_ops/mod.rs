mod artifact_queries;
mod branch_queries;
mod job_queries;
mod node_queries;
mod project_queries;
mod types;

pub(crate) use artifact_queries::fetch_artifact;
pub(crate) use branch_queries::fetch_branch;
pub(crate) use job_queries::{fetch_active_job_for_node, fetch_job};
pub(crate) use node_queries::{fetch_branch_nodes, fetch_node};
pub(crate) use project_queries::fetch_project;
pub(crate) use types::*;
