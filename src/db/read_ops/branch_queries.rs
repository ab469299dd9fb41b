use sqlx::SqliteConnection;

use crate::db::mappers::parse_branch;
use crate::db::LucidDb;
use crate::error::{LucidError, Result};
use crate::types::{Branch, BranchId, ProjectId};

use super::types::{BranchRow, BRANCH_SELECT};

pub(crate) async fn fetch_branch(
    conn: &mut SqliteConnection,
    branch_id: BranchId,
) -> Result<Option<Branch>> {
    sqlx::query_as::<_, BranchRow>(&format!("{BRANCH_SELECT} WHERE id = ?"))
        .bind(branch_id.value())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to get branch: {e}")))?
        .map(parse_branch)
        .transpose()
}

impl LucidDb {
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn get_branch(&self, branch_id: BranchId) -> Result<Option<Branch>> {
        let mut conn = self.pool().acquire().await?;
        fetch_branch(&mut conn, branch_id).await
    }

    /// # Errors
    /// Returns `NotFound` for unknown ids or a database error.
    pub async fn require_branch(&self, branch_id: BranchId) -> Result<Branch> {
        self.get_branch(branch_id)
            .await?
            .ok_or_else(|| LucidError::NotFound(format!("Branch {} not found", branch_id.value())))
    }

    /// Branches of a project in creation order; the default `main` branch comes first.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn list_branches(&self, project_id: ProjectId) -> Result<Vec<Branch>> {
        sqlx::query_as::<_, BranchRow>(&format!(
            "{BRANCH_SELECT} WHERE project_id = ? ORDER BY id ASC"
        ))
        .bind(project_id.value())
        .fetch_all(self.pool())
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to list branches: {e}")))?
        .into_iter()
        .map(parse_branch)
        .collect()
    }
}
