#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use super::helpers::not_found;
use crate::db::mappers::to_i64_u64;
use crate::db::read_ops::{fetch_artifact, fetch_node};
use crate::db::{commit, LucidDb};
use crate::error::{LucidError, Result};
use crate::types::{Artifact, ArtifactId, NewArtifact};

pub(super) async fn insert_artifact_row(
    conn: &mut SqliteConnection,
    artifact: &NewArtifact,
    now: DateTime<Utc>,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO artifacts (node_id, file_path, file_type, content_hash, byte_length, created_at)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(artifact.node_id.value())
    .bind(&artifact.file_path)
    .bind(&artifact.file_type)
    .bind(artifact.content_hash.as_deref())
    .bind(to_i64_u64(artifact.byte_length))
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| LucidError::DatabaseError(format!("Failed to insert artifact: {e}")))
}

impl LucidDb {
    /// Records an artifact whose bytes are already in the object store.
    ///
    /// # Errors
    /// `NotFound` for an unknown node, or a database error.
    pub async fn insert_artifact(&self, artifact: &NewArtifact) -> Result<Artifact> {
        let mut tx = self.begin().await?;
        fetch_node(&mut tx, artifact.node_id)
            .await?
            .ok_or_else(|| not_found("Node", artifact.node_id.value()))?;

        let artifact_id = insert_artifact_row(&mut tx, artifact, Utc::now()).await?;
        let stored = fetch_artifact(&mut tx, ArtifactId::new(artifact_id))
            .await?
            .ok_or_else(|| not_found("Artifact", artifact_id))?;
        commit(tx).await?;

        info!(
            node_id = artifact.node_id.value(),
            artifact_id,
            file_path = %stored.file_path,
            "Recorded artifact"
        );
        Ok(stored)
    }
}
