use chrono::{DateTime, Utc};

use filedock_core::user::{CreateUser, User};

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::DbError;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    display_name: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            display_name: r.display_name,
            email: r.email,
            created_at: r.created_at,
        }
    }
}

impl PostgresDatabase {
    pub(crate) async fn pg_create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let display_name = if input.display_name.is_empty() {
            input.username.as_str()
        } else {
            input.display_name.as_str()
        };

        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, username, display_name, email, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(&id)
        .bind(&input.username)
        .bind(display_name)
        .bind(&input.email)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(row.into())
    }

    pub(crate) async fn pg_get_user(&self, id: &str) -> Result<User, DbError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?
            .ok_or_else(|| pg_not_found(&format!("user {id}")))?;

        Ok(row.into())
    }
}
