use sqlx::SqliteConnection;

use crate::db::mappers::parse_artifact;
use crate::db::LucidDb;
use crate::error::{LucidError, Result};
use crate::types::{Artifact, ArtifactId, NodeId};

use super::types::{ArtifactRow, ARTIFACT_SELECT};

pub(crate) async fn fetch_artifact(
    conn: &mut SqliteConnection,
    artifact_id: ArtifactId,
) -> Result<Option<Artifact>> {
    sqlx::query_as::<_, ArtifactRow>(&format!("{ARTIFACT_SELECT} WHERE id = ?"))
        .bind(artifact_id.value())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to get artifact: {e}")))
        .map(|row| row.map(parse_artifact))
}

impl LucidDb {
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn get_artifact(&self, artifact_id: ArtifactId) -> Result<Option<Artifact>> {
        let mut conn = self.pool().acquire().await?;
        fetch_artifact(&mut conn, artifact_id).await
    }

    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn list_artifacts(&self, node_id: NodeId) -> Result<Vec<Artifact>> {
        sqlx::query_as::<_, ArtifactRow>(&format!(
            "{ARTIFACT_SELECT} WHERE node_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(node_id.value())
        .fetch_all(self.pool())
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to list artifacts: {e}")))
        .map(|rows| rows.into_iter().map(parse_artifact).collect())
    }

    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn count_artifacts(&self) -> Result<u64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM artifacts")
            .fetch_one(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to count artifacts: {e}")))
            .map(crate::db::mappers::to_u64_i64)
    }
}
