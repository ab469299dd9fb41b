use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use super::executor::Executor;
use crate::config::DEFAULT_JOB_LEASE_SECS;
use crate::db::LucidDb;
use crate::error::Result;
use crate::types::{Job, JobId, JobStatus, NodeId, NodeStatus};

pub const INTERRUPTED_NODE_ERROR: &str = "Worker stopped while the node was running";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerTick {
    Idle,
    Processed {
        job_id: JobId,
        node_id: NodeId,
        outcome: JobStatus,
    },
}

impl WorkerTick {
    #[must_use]
    pub const fn is_processed(self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Pulls one job at a time and hands its node to the executor. Several workers may
/// share a database; claims are atomic and leased, so a job whose worker died is picked
/// up again once the lease runs out.
pub struct Worker {
    db: LucidDb,
    executor: Executor,
    worker_id: String,
    poll_interval: Duration,
    lease: Duration,
}

impl Worker {
    #[must_use]
    pub fn new(
        db: LucidDb,
        executor: Executor,
        worker_id: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            db,
            executor,
            worker_id: worker_id.into(),
            poll_interval,
            lease: Duration::from_secs(DEFAULT_JOB_LEASE_SECS),
        }
    }

    /// How long a claim stays exclusive. Keep it well above the LLM timeout.
    #[must_use]
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Claims and runs at most one job.
    ///
    /// # Errors
    /// Returns database errors from claiming or closing the job.
    pub async fn run_once(&self) -> Result<WorkerTick> {
        let Some(job) = self
            .db
            .claim_next_job(&self.worker_id, self.lease)
            .await?
        else {
            return Ok(WorkerTick::Idle);
        };

        let (outcome, error) = self.run_claimed(&job).await;
        self.db
            .finish_job(job.id, &self.worker_id, outcome, error.as_deref())
            .await?;

        info!(
            worker_id = %self.worker_id,
            job_id = job.id.value(),
            node_id = job.node_id.value(),
            outcome = %outcome,
            "Job finished"
        );
        Ok(WorkerTick::Processed {
            job_id: job.id,
            node_id: job.node_id,
            outcome,
        })
    }

    async fn run_claimed(&self, job: &Job) -> (JobStatus, Option<String>) {
        if job.attempts > 1 {
            if let Some(settled) = self.settle_reclaimed(job).await {
                return settled;
            }
        }
        match self.executor.execute_node(job.node_id).await {
            Ok(report) if report.status == NodeStatus::Succeeded => (JobStatus::Done, None),
            Ok(report) => (JobStatus::Failed, report.error),
            Err(e) => (JobStatus::Failed, Some(e.to_string())),
        }
    }

    /// A reclaimed job's node shows how far the previous attempt got. Only a node that is
    /// still `pending` is executed again.
    async fn settle_reclaimed(&self, job: &Job) -> Option<(JobStatus, Option<String>)> {
        let node = match self.db.require_node(job.node_id).await {
            Ok(node) => node,
            Err(e) => return Some((JobStatus::Failed, Some(e.to_string()))),
        };
        warn!(
            worker_id = %self.worker_id,
            job_id = job.id.value(),
            node_id = node.id.value(),
            attempts = job.attempts,
            node_status = %node.status,
            "Reclaimed job after lease expiry"
        );

        match node.status {
            NodeStatus::Pending => None,
            NodeStatus::Running => {
                let error = match self
                    .db
                    .complete_node_failure(node.id, INTERRUPTED_NODE_ERROR)
                    .await
                {
                    Ok(_) => INTERRUPTED_NODE_ERROR.to_string(),
                    Err(e) => e.to_string(),
                };
                Some((JobStatus::Failed, Some(error)))
            }
            NodeStatus::Succeeded => Some((JobStatus::Done, None)),
            NodeStatus::Failed => Some((JobStatus::Failed, node.error_message)),
        }
    }

    /// Polls until `shutdown` resolves. A job in flight is always finished first.
    ///
    /// Returns the number of jobs processed.
    ///
    /// # Errors
    /// Never returns an error today; tick failures are logged and retried after the poll
    /// interval.
    pub async fn run<F>(&self, shutdown: F) -> Result<u64>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut processed = 0_u64;
        let poll_ms = u64::try_from(self.poll_interval.as_millis()).unwrap_or(u64::MAX);
        info!(worker_id = %self.worker_id, poll_ms, "Worker started");

        loop {
            let delay = match self.run_once().await {
                Ok(tick) if tick.is_processed() => {
                    processed += 1;
                    Duration::ZERO
                }
                Ok(_) => self.poll_interval,
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "Worker tick failed");
                    self.poll_interval
                }
            };

            tokio::select! {
                biased;
                () = &mut shutdown => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!(worker_id = %self.worker_id, processed, "Worker stopped");
        Ok(processed)
    }
}
