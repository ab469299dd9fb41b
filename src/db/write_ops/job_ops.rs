#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use super::helpers::{not_found, redact_sensitive};
use crate::db::mappers::parse_job;
use crate::db::read_ops::{fetch_active_job_for_node, fetch_job, fetch_node, JobRow};
use crate::db::{commit, LucidDb};
use crate::error::{LucidError, Result};
use crate::types::{Job, JobId, JobStatus, NodeId, NodeStatus};

const JOB_RETURNING: &str =
    "RETURNING id, node_id, status, attempts, worker_id, error, enqueued_at, started_at, \
     finished_at, lease_expires_at";

const CLAIMABLE: &str = "(status = 'queued'
      OR (status = 'running'
          AND lease_expires_at IS NOT NULL
          AND julianday(lease_expires_at) <= julianday(?)))";

pub const LEASE_EXPIRED_ERROR: &str = "Worker lease expired before the job finished";

fn lease_window(lease: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(lease)
        .map_err(|e| LucidError::Validation(format!("Invalid job lease: {e}")))
}

/// Fails the node's running jobs whose lease lapsed so a fresh job can take their place.
async fn retire_expired_claims(
    conn: &mut SqliteConnection,
    node_id: NodeId,
    now: DateTime<Utc>,
) -> Result<u64> {
    let retired = sqlx::query(
        "UPDATE jobs SET status = ?, error = ?, finished_at = ?
         WHERE node_id = ? AND status = ?
           AND lease_expires_at IS NOT NULL
           AND julianday(lease_expires_at) <= julianday(?)",
    )
    .bind(JobStatus::Failed.as_str())
    .bind(LEASE_EXPIRED_ERROR)
    .bind(now)
    .bind(node_id.value())
    .bind(JobStatus::Running.as_str())
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| LucidError::DatabaseError(format!("Failed to retire expired jobs: {e}")))?
    .rows_affected();

    if retired > 0 {
        warn!(node_id = node_id.value(), retired, "Retired jobs with expired leases");
    }
    Ok(retired)
}

impl LucidDb {
    /// Queues a pending node for a worker. Running jobs whose lease expired are failed
    /// first, so they no longer block the node.
    ///
    /// # Errors
    /// `NotFound` for unknown nodes, `Validation` when the node is not `pending`,
    /// `Conflict` when a queued job or a live claim already exists for it.
    pub async fn enqueue_job(&self, node_id: NodeId) -> Result<Job> {
        let mut tx = self.begin().await?;
        let node = fetch_node(&mut tx, node_id)
            .await?
            .ok_or_else(|| not_found("Node", node_id.value()))?;
        if node.status != NodeStatus::Pending {
            return Err(LucidError::Validation(format!(
                "Node {} is {}; only pending nodes can be queued",
                node_id.value(),
                node.status
            )));
        }

        let now = Utc::now();
        retire_expired_claims(&mut tx, node_id, now).await?;
        if let Some(active) = fetch_active_job_for_node(&mut tx, node_id, now).await? {
            return Err(LucidError::Conflict(format!(
                "Node {} already has {} job {}",
                node_id.value(),
                active.status,
                active.id.value()
            )));
        }

        let job_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO jobs (node_id, status, enqueued_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(node_id.value())
        .bind(JobStatus::Queued.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to enqueue job: {e}")))?;

        let job = fetch_job(&mut tx, JobId::new(job_id))
            .await?
            .ok_or_else(|| not_found("Job", job_id))?;
        commit(tx).await?;

        info!(node_id = node_id.value(), job_id, "Enqueued job");
        Ok(job)
    }

    /// Atomically takes the oldest claimable job and leases it to `worker_id` for `lease`.
    ///
    /// Claimable means queued, or running under a lease that has already expired. Two
    /// workers never hold the same live claim.
    ///
    /// # Errors
    /// `Validation` when the lease is out of range, or a database error.
    pub async fn claim_next_job(&self, worker_id: &str, lease: Duration) -> Result<Option<Job>> {
        let now = Utc::now();
        let expires_at = now + lease_window(lease)?;
        let sql = format!(
            "UPDATE jobs
             SET status = ?, worker_id = ?, attempts = attempts + 1, started_at = ?,
                 lease_expires_at = ?
             WHERE id = (SELECT id FROM jobs WHERE {CLAIMABLE} ORDER BY id ASC LIMIT 1)
               AND {CLAIMABLE}
             {JOB_RETURNING}"
        );
        let claimed = sqlx::query_as::<_, JobRow>(&sql)
            .bind(JobStatus::Running.as_str())
            .bind(worker_id)
            .bind(now)
            .bind(expires_at)
            .bind(now)
            .bind(now)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to claim job: {e}")))?
            .map(parse_job)
            .transpose()?;

        if let Some(job) = &claimed {
            info!(
                job_id = job.id.value(),
                node_id = job.node_id.value(),
                worker_id,
                attempts = job.attempts,
                lease_expires_at = %expires_at,
                "Claimed job"
            );
        }
        Ok(claimed)
    }

    /// Closes a job `worker_id` still holds as `done` or `failed`.
    ///
    /// # Errors
    /// `Validation` for a non-terminal outcome, `Conflict` when the job is not running
    /// under `worker_id` (finished already, or reclaimed after the lease ran out).
    pub async fn finish_job(
        &self,
        job_id: JobId,
        worker_id: &str,
        outcome: JobStatus,
        error: Option<&str>,
    ) -> Result<Job> {
        if outcome.is_active() {
            return Err(LucidError::Validation(format!(
                "Job outcome must be done or failed, got {outcome}"
            )));
        }

        let sql = format!(
            "UPDATE jobs SET status = ?, error = ?, finished_at = ?, lease_expires_at = NULL
             WHERE id = ? AND status = ? AND worker_id = ?
             {JOB_RETURNING}"
        );
        let finished = sqlx::query_as::<_, JobRow>(&sql)
            .bind(outcome.as_str())
            .bind(error.map(redact_sensitive))
            .bind(Utc::now())
            .bind(job_id.value())
            .bind(JobStatus::Running.as_str())
            .bind(worker_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to finish job: {e}")))?
            .map(parse_job)
            .transpose()?;

        finished.ok_or_else(|| {
            LucidError::Conflict(format!(
                "Job {} is not running under worker {worker_id}",
                job_id.value()
            ))
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::LEASE_EXPIRED_ERROR;
    use crate::db::LucidDb;
    use crate::error::LucidError;
    use crate::types::{JobStatus, NewNode, NewProject, Node, NodeId, NodeStatus};

    const LEASE: Duration = Duration::from_secs(60);

    async fn expire_lease(db: &LucidDb, job_id: i64) {
        sqlx::query("UPDATE jobs SET lease_expires_at = ? WHERE id = ?")
            .bind(Utc::now() - chrono::Duration::minutes(5))
            .bind(job_id)
            .execute(db.pool())
            .await
            .expect("expire lease");
    }

    async fn pending_node(db: &LucidDb) -> Node {
        let project = db
            .create_project(&NewProject {
                name: "P1".to_string(),
                description: None,
            })
            .await
            .expect("project");
        db.create_node(&NewNode {
            project_id: project.id,
            branch_id: None,
            parent_id: None,
            title: None,
            prompt: Some("hello".to_string()),
        })
        .await
        .expect("node")
    }

    #[tokio::test]
    async fn given_active_job_when_enqueuing_same_node_then_conflict() {
        let db = LucidDb::in_memory().await.expect("db");
        let node = pending_node(&db).await;

        let job = db.enqueue_job(node.id).await.expect("enqueue");
        assert_eq!(job.status, JobStatus::Queued);
        assert!(matches!(
            db.enqueue_job(node.id).await,
            Err(LucidError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn given_unknown_or_finished_node_when_enqueuing_then_rejected() {
        let db = LucidDb::in_memory().await.expect("db");
        assert!(matches!(
            db.enqueue_job(NodeId::new(404)).await,
            Err(LucidError::NotFound(_))
        ));

        let node = pending_node(&db).await;
        db.complete_node_failure(node.id, "cancelled")
            .await
            .expect("cancel");
        assert!(matches!(
            db.enqueue_job(node.id).await,
            Err(LucidError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn given_queued_job_when_claimed_then_only_one_claim_succeeds() {
        let db = LucidDb::in_memory().await.expect("db");
        let node = pending_node(&db).await;
        let job = db.enqueue_job(node.id).await.expect("enqueue");

        let claimed = db
            .claim_next_job("worker-a", LEASE)
            .await
            .expect("claim")
            .expect("job available");
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.worker_id.as_deref(), Some("worker-a"));

        assert!(claimed.lease_expires_at.is_some_and(|at| at > Utc::now()));

        assert!(db
            .claim_next_job("worker-b", LEASE)
            .await
            .expect("claim")
            .is_none());
    }

    #[tokio::test]
    async fn given_running_job_when_finished_then_it_cannot_finish_again() {
        let db = LucidDb::in_memory().await.expect("db");
        let node = pending_node(&db).await;
        db.enqueue_job(node.id).await.expect("enqueue");
        let claimed = db
            .claim_next_job("w", LEASE)
            .await
            .expect("claim")
            .expect("job");

        let done = db
            .finish_job(claimed.id, "w", JobStatus::Done, None)
            .await
            .expect("finish");
        assert_eq!(done.status, JobStatus::Done);
        assert!(done.finished_at.is_some());
        assert!(done.lease_expires_at.is_none());
        assert!(matches!(
            db.finish_job(claimed.id, "w", JobStatus::Failed, Some("late")).await,
            Err(LucidError::Conflict(_))
        ));
        assert!(matches!(
            db.finish_job(claimed.id, "w", JobStatus::Queued, None).await,
            Err(LucidError::Validation(_))
        ));

        let refreshed = db.require_node(node.id).await.expect("node");
        assert_eq!(refreshed.status, NodeStatus::Pending);
    }

    #[tokio::test]
    async fn given_expired_claim_when_another_worker_claims_then_job_is_leased_again() {
        let db = LucidDb::in_memory().await.expect("db");
        let node = pending_node(&db).await;
        db.enqueue_job(node.id).await.expect("enqueue");
        let first = db
            .claim_next_job("dead-worker", LEASE)
            .await
            .expect("claim")
            .expect("job");
        expire_lease(&db, first.id.value()).await;

        let second = db
            .claim_next_job("live-worker", LEASE)
            .await
            .expect("claim")
            .expect("reclaimed");
        assert_eq!(second.id, first.id);
        assert_eq!(second.attempts, 2);
        assert_eq!(second.worker_id.as_deref(), Some("live-worker"));

        assert!(matches!(
            db.finish_job(first.id, "dead-worker", JobStatus::Done, None).await,
            Err(LucidError::Conflict(_))
        ));
        let done = db
            .finish_job(first.id, "live-worker", JobStatus::Done, None)
            .await
            .expect("finish");
        assert_eq!(done.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn given_expired_claim_when_enqueuing_again_then_old_job_is_retired() {
        let db = LucidDb::in_memory().await.expect("db");
        let node = pending_node(&db).await;
        let old = db.enqueue_job(node.id).await.expect("enqueue");
        db.claim_next_job("dead-worker", LEASE)
            .await
            .expect("claim")
            .expect("job");
        assert!(matches!(
            db.enqueue_job(node.id).await,
            Err(LucidError::Conflict(_))
        ));
        expire_lease(&db, old.id.value()).await;

        let fresh = db.enqueue_job(node.id).await.expect("re-enqueue");
        assert_ne!(fresh.id, old.id);
        let retired = db.get_job(old.id).await.expect("job").expect("exists");
        assert_eq!(retired.status, JobStatus::Failed);
        assert_eq!(retired.error.as_deref(), Some(LEASE_EXPIRED_ERROR));
        assert!(db
            .expired_job_claims(Utc::now())
            .await
            .expect("expired")
            .is_empty());
    }
}
