use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::LucidDb;
use crate::error::{LucidError, Result};
use crate::types::{Job, Node, NodeId};

/// Work that stopped making progress: nodes stuck in `running` and claims whose lease ran
/// out without the job being finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaleReport {
    pub nodes: Vec<Node>,
    pub jobs: Vec<Job>,
}

impl StaleReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.jobs.is_empty()
    }
}

/// Front door of the job queue: enqueue work and spot nodes that never finished.
#[derive(Clone)]
pub struct Dispatcher {
    db: LucidDb,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(db: LucidDb) -> Self {
        Self { db }
    }

    /// # Errors
    /// `NotFound` for unknown nodes, `Validation` for non-pending nodes, `Conflict` when a
    /// job for the node is already queued or running.
    pub async fn enqueue(&self, node_id: NodeId) -> Result<Job> {
        let job = self.db.enqueue_job(node_id).await?;
        info!(
            node_id = node_id.value(),
            job_id = job.id.value(),
            "Node dispatched"
        );
        Ok(job)
    }

    /// Nodes sitting in `running` for longer than `older_than`. Reported, never repaired.
    ///
    /// # Errors
    /// `Validation` when the window is out of range, or a database error.
    pub async fn stale_running_nodes(&self, older_than: Duration) -> Result<Vec<Node>> {
        let window = chrono::Duration::from_std(older_than)
            .map_err(|e| LucidError::Validation(format!("Invalid staleness window: {e}")))?;
        let stale = self.db.stale_running_nodes(Utc::now() - window).await?;
        for node in &stale {
            warn!(
                node_id = node.id.value(),
                project_id = node.project_id.value(),
                since = %node.updated_at,
                "Node stuck in running"
            );
        }
        Ok(stale)
    }

    /// Running jobs whose lease has expired. The next claim or enqueue picks them up.
    ///
    /// # Errors
    /// Returns a database error.
    pub async fn expired_claims(&self) -> Result<Vec<Job>> {
        let expired = self.db.expired_job_claims(Utc::now()).await?;
        for job in &expired {
            warn!(
                job_id = job.id.value(),
                node_id = job.node_id.value(),
                worker_id = job.worker_id.as_deref().unwrap_or_default(),
                attempts = job.attempts,
                "Job claim expired"
            );
        }
        Ok(expired)
    }

    /// # Errors
    /// `Validation` when the window is out of range, or a database error.
    pub async fn stale_report(&self, older_than: Duration) -> Result<StaleReport> {
        Ok(StaleReport {
            nodes: self.stale_running_nodes(older_than).await?,
            jobs: self.expired_claims().await?,
        })
    }
}
