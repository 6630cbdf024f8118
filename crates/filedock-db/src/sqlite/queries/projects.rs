use chrono::Utc;
use rusqlite::{params, Row};

use filedock_core::project::{CreateProject, Project};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        owner_id: row.get("owner_id")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_project_sync(&self, input: &CreateProject) -> Result<Project, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO projects (id, name, owner_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, input.name, input.owner_id, Utc::now()],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM projects WHERE id = ?1",
                params![id],
                row_to_project,
            )
            .to_db()
        })
    }

    pub fn get_project_sync(&self, id: &str) -> Result<Project, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM projects WHERE id = ?1",
                params![id],
                row_to_project,
            )
            .map_err(not_found_or(format!("project {id}")))
        })
    }

    pub fn add_project_member_sync(&self, project_id: &str, user_id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO project_members (project_id, user_id) VALUES (?1, ?2)",
                params![project_id, user_id],
            )
            .to_db()?;
            Ok(())
        })
    }
}
