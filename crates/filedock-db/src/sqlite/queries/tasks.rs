use chrono::Utc;
use rusqlite::{params, Row};

use filedock_core::task::{CreateTask, Status, Task};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get("status")?;
    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        title: row.get("title")?,
        status: Status::parse_str(&status).unwrap_or(Status::Backlog),
        assignee_id: row.get("assignee_id")?,
        creator_id: row.get("creator_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

// A task is reachable by its project's owner and members, its creator, and its assignee.
const TASK_ACCESS_PREDICATE: &str = "(p.owner_id = ?1
      OR t.creator_id = ?1
      OR t.assignee_id = ?1
      OR EXISTS (SELECT 1 FROM project_members m
                 WHERE m.project_id = p.id AND m.user_id = ?1))";

impl SqliteDatabase {
    pub fn create_task_sync(&self, input: &CreateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO tasks (id, project_id, title, status, assignee_id, creator_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    input.project_id,
                    input.title,
                    input.status.as_str(),
                    input.assignee_id,
                    input.creator_id,
                    now,
                    now
                ],
            )
            .to_db()?;
            conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
                .to_db()
        })
    }

    pub fn get_task_sync(&self, id: &str) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
                .map_err(not_found_or(format!("task {id}")))
        })
    }

    pub fn has_task_access_sync(&self, user_id: &str, task_id: &str) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT EXISTS (
                    SELECT 1 FROM tasks t
                    JOIN projects p ON p.id = t.project_id
                    WHERE t.id = ?2 AND {TASK_ACCESS_PREDICATE}
                 )"
            );
            conn.query_row(&sql, params![user_id, task_id], |row| row.get(0))
                .to_db()
        })
    }

    pub fn has_attachment_access_sync(
        &self,
        user_id: &str,
        attachment_id: &str,
    ) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT EXISTS (
                    SELECT 1 FROM attachments a
                    JOIN tasks t ON t.id = a.task_id
                    JOIN projects p ON p.id = t.project_id
                    WHERE a.id = ?2 AND a.is_deleted = 0 AND {TASK_ACCESS_PREDICATE}
                 )"
            );
            conn.query_row(&sql, params![user_id, attachment_id], |row| row.get(0))
                .to_db()
        })
    }
}
