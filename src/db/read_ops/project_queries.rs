use sqlx::SqliteConnection;

use crate::db::mappers::parse_project;
use crate::db::LucidDb;
use crate::error::{LucidError, Result};
use crate::types::{Project, ProjectId};

use super::types::{ProjectRow, PROJECT_SELECT};

pub(crate) async fn fetch_project(
    conn: &mut SqliteConnection,
    project_id: ProjectId,
) -> Result<Option<Project>> {
    sqlx::query_as::<_, ProjectRow>(&format!("{PROJECT_SELECT} WHERE id = ?"))
        .bind(project_id.value())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to get project: {e}")))
        .map(|row| row.map(parse_project))
}

impl LucidDb {
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn get_project(&self, project_id: ProjectId) -> Result<Option<Project>> {
        let mut conn = self.pool().acquire().await?;
        fetch_project(&mut conn, project_id).await
    }

    /// Like [`LucidDb::get_project`] but absence is a `NotFound` error.
    ///
    /// # Errors
    /// Returns `NotFound` for unknown ids or a database error.
    pub async fn require_project(&self, project_id: ProjectId) -> Result<Project> {
        self.get_project(project_id)
            .await?
            .ok_or_else(|| {
                LucidError::NotFound(format!("Project {} not found", project_id.value()))
            })
    }

    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        sqlx::query_as::<_, ProjectRow>(&format!("{PROJECT_SELECT} ORDER BY id ASC"))
            .fetch_all(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to list projects: {e}")))
            .map(|rows| rows.into_iter().map(parse_project).collect())
    }
}
