use chrono::Utc;
use rusqlite::{params, Row};

use filedock_core::activity::{ActivityAction, ActivityEntry, CreateActivity};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_activity(row: &Row) -> rusqlite::Result<ActivityEntry> {
    let action: String = row.get("action")?;
    let action = ActivityAction::parse_str(&action).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown activity action {action}").into(),
        )
    })?;
    Ok(ActivityEntry {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        action,
        details: row.get("details")?,
        created_at: row.get("created_at")?,
    })
}

impl SqliteDatabase {
    pub fn record_activity_sync(&self, input: &CreateActivity) -> Result<ActivityEntry, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO activity_log (id, task_id, user_id, action, details, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    input.task_id,
                    input.user_id,
                    input.action.as_str(),
                    input.details,
                    Utc::now()
                ],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM activity_log WHERE id = ?1",
                params![id],
                row_to_activity,
            )
            .to_db()
        })
    }

    pub fn list_task_activity_sync(&self, task_id: &str) -> Result<Vec<ActivityEntry>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM activity_log WHERE task_id = ?1 ORDER BY created_at ASC, rowid ASC",
                )
                .to_db()?;
            let entries = stmt
                .query_map(params![task_id], row_to_activity)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(entries)
        })
    }
}
