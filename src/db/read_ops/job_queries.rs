use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db::mappers::parse_job;
use crate::db::LucidDb;
use crate::error::{LucidError, Result};
use crate::types::{Job, JobId, NodeId};

use super::types::{JobRow, JOB_SELECT};

/// Queued jobs and running jobs still inside their lease.
pub(crate) async fn fetch_active_job_for_node(
    conn: &mut SqliteConnection,
    node_id: NodeId,
    now: DateTime<Utc>,
) -> Result<Option<Job>> {
    sqlx::query_as::<_, JobRow>(&format!(
        "{JOB_SELECT}
         WHERE node_id = ?
           AND (status = 'queued'
                OR (status = 'running'
                    AND (lease_expires_at IS NULL
                         OR julianday(lease_expires_at) > julianday(?))))
         ORDER BY id ASC LIMIT 1"
    ))
    .bind(node_id.value())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| LucidError::DatabaseError(format!("Failed to inspect node jobs: {e}")))?
    .map(parse_job)
    .transpose()
}

pub(crate) async fn fetch_job(conn: &mut SqliteConnection, job_id: JobId) -> Result<Option<Job>> {
    sqlx::query_as::<_, JobRow>(&format!("{JOB_SELECT} WHERE id = ?"))
        .bind(job_id.value())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to get job: {e}")))?
        .map(parse_job)
        .transpose()
}

impl LucidDb {
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn get_job(&self, job_id: JobId) -> Result<Option<Job>> {
        let mut conn = self.pool().acquire().await?;
        fetch_job(&mut conn, job_id).await
    }

    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn list_jobs_for_node(&self, node_id: NodeId) -> Result<Vec<Job>> {
        sqlx::query_as::<_, JobRow>(&format!("{JOB_SELECT} WHERE node_id = ? ORDER BY id ASC"))
            .bind(node_id.value())
            .fetch_all(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to list jobs: {e}")))?
            .into_iter()
            .map(parse_job)
            .collect()
    }

    /// Running jobs whose lease lapsed before `now`: their worker stopped reporting back.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn expired_job_claims(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
        sqlx::query_as::<_, JobRow>(&format!(
            "{JOB_SELECT}
             WHERE status = 'running'
               AND lease_expires_at IS NOT NULL
               AND julianday(lease_expires_at) <= julianday(?)
             ORDER BY id ASC"
        ))
        .bind(now)
        .fetch_all(self.pool())
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to list expired claims: {e}")))?
        .into_iter()
        .map(parse_job)
        .collect()
    }
}
