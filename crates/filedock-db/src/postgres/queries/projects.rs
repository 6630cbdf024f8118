use chrono::{DateTime, Utc};

use filedock_core::project::{CreateProject, Project};

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::DbError;

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    owner_id: String,
    created_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(r: ProjectRow) -> Self {
        Project {
            id: r.id,
            name: r.name,
            owner_id: r.owner_id,
            created_at: r.created_at,
        }
    }
}

impl PostgresDatabase {
    pub(crate) async fn pg_create_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let row = sqlx::query_as::<_, ProjectRow>(
            "INSERT INTO projects (id, name, owner_id, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(&id)
        .bind(&input.name)
        .bind(&input.owner_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(row.into())
    }

    pub(crate) async fn pg_get_project(&self, id: &str) -> Result<Project, DbError> {
        let row = sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?
            .ok_or_else(|| pg_not_found(&format!("project {id}")))?;

        Ok(row.into())
    }

    pub(crate) async fn pg_add_project_member(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO project_members (project_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(project_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(())
    }
}
