use chrono::Utc;
use rusqlite::{params, Row};

use filedock_core::user::{CreateUser, User};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        display_name: row.get("display_name")?,
        email: row.get("email")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn create_user_sync(&self, input: &CreateUser) -> Result<User, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let display_name = if input.display_name.is_empty() {
                input.username.clone()
            } else {
                input.display_name.clone()
            };
            conn.execute(
                "INSERT INTO users (id, username, display_name, email, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, input.username, display_name, input.email, Utc::now()],
            )
            .to_db()?;
            conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
                .to_db()
        })
    }

    pub fn get_user_sync(&self, id: &str) -> Result<User, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
                .map_err(not_found_or(format!("user {id}")))
        })
    }
}
