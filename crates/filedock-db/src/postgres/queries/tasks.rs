use chrono::{DateTime, Utc};

use filedock_core::task::{CreateTask, Status, Task};

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::DbError;

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    project_id: String,
    title: String,
    status: String,
    assignee_id: Option<String>,
    creator_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(r: TaskRow) -> Self {
        Task {
            id: r.id,
            project_id: r.project_id,
            title: r.title,
            status: Status::parse_str(&r.status).unwrap_or(Status::Backlog),
            assignee_id: r.assignee_id,
            creator_id: r.creator_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const TASK_ACCESS_PREDICATE: &str = "(p.owner_id = $1
      OR t.creator_id = $1
      OR t.assignee_id = $1
      OR EXISTS (SELECT 1 FROM project_members m
                 WHERE m.project_id = p.id AND m.user_id = $1))";

impl PostgresDatabase {
    pub(crate) async fn pg_create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let row = sqlx::query_as::<_, TaskRow>(
            "INSERT INTO tasks (id, project_id, title, status, assignee_id, creator_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING *",
        )
        .bind(&id)
        .bind(&input.project_id)
        .bind(&input.title)
        .bind(input.status.as_str())
        .bind(&input.assignee_id)
        .bind(&input.creator_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(row.into())
    }

    pub(crate) async fn pg_get_task(&self, id: &str) -> Result<Task, DbError> {
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?
            .ok_or_else(|| pg_not_found(&format!("task {id}")))?;

        Ok(row.into())
    }

    pub(crate) async fn pg_has_task_access(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<bool, DbError> {
        let sql = format!(
            "SELECT EXISTS (
                SELECT 1 FROM tasks t
                JOIN projects p ON p.id = t.project_id
                WHERE t.id = $2 AND {TASK_ACCESS_PREDICATE}
             )"
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(user_id)
            .bind(task_id)
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)
    }

    pub(crate) async fn pg_has_attachment_access(
        &self,
        user_id: &str,
        attachment_id: &str,
    ) -> Result<bool, DbError> {
        let sql = format!(
            "SELECT EXISTS (
                SELECT 1 FROM attachments a
                JOIN tasks t ON t.id = a.task_id
                JOIN projects p ON p.id = t.project_id
                WHERE a.id = $2 AND NOT a.is_deleted AND {TASK_ACCESS_PREDICATE}
             )"
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(user_id)
            .bind(attachment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)
    }
}
