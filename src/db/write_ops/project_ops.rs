#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use chrono::Utc;
use tracing::info;

use super::branch_ops::insert_branch;
use super::helpers::not_found;
use crate::db::read_ops::fetch_project;
use crate::db::{commit, LucidDb};
use crate::error::{LucidError, Result};
use crate::types::{BranchStatus, NewProject, Project, ProjectId};

pub const DEFAULT_BRANCH: &str = "main";

impl LucidDb {
    /// Creates the project together with its `main` branch.
    ///
    /// # Errors
    /// Returns `Validation` for a blank name, or a database error.
    pub async fn create_project(&self, input: &NewProject) -> Result<Project> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(LucidError::Validation(
                "Project name must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let mut tx = self.begin().await?;

        let project_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO projects (name, description, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(input.description.as_deref())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| LucidError::DatabaseError(format!("Failed to insert project: {e}")))?;

        insert_branch(
            &mut tx,
            project_id,
            DEFAULT_BRANCH,
            BranchStatus::Active,
            None,
            now,
        )
        .await?;

        let project = fetch_project(&mut tx, ProjectId::new(project_id))
            .await?
            .ok_or_else(|| not_found("Project", project_id))?;
        commit(tx).await?;

        info!(project_id, name = %project.name, "Created project");
        Ok(project)
    }

    /// Deletes a project; branches, nodes, artifacts and jobs cascade.
    ///
    /// # Errors
    /// Returns `NotFound` for unknown ids, or a database error.
    pub async fn delete_project(&self, project_id: ProjectId) -> Result<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id.value())
            .execute(self.pool())
            .await
            .map_err(|e| LucidError::DatabaseError(format!("Failed to delete project: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(not_found("Project", project_id.value()));
        }
        info!(project_id = project_id.value(), "Deleted project");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use crate::db::LucidDb;
    use crate::error::LucidError;
    use crate::types::{BranchStatus, NewProject, ProjectId};

    #[tokio::test]
    async fn given_new_project_when_created_then_main_branch_exists() {
        let db = LucidDb::in_memory().await.expect("db");
        let project = db
            .create_project(&NewProject {
                name: " P1 ".to_string(),
                description: None,
            })
            .await
            .expect("create project");

        assert_eq!(project.name, "P1");
        let branches = db.list_branches(project.id).await.expect("branches");
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].name, "main");
        assert_eq!(branches[0].status, BranchStatus::Active);
    }

    #[tokio::test]
    async fn given_blank_name_when_creating_then_validation_error() {
        let db = LucidDb::in_memory().await.expect("db");
        let result = db.create_project(&NewProject::default()).await;
        assert!(matches!(result, Err(LucidError::Validation(_))));
        assert!(db.list_projects().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn given_unknown_project_when_deleting_then_not_found() {
        let db = LucidDb::in_memory().await.expect("db");
        let result = db.delete_project(ProjectId::new(42)).await;
        assert!(matches!(result, Err(LucidError::NotFound(_))));
    }
}
