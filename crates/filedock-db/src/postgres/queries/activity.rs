use chrono::{DateTime, Utc};

use filedock_core::activity::{ActivityAction, ActivityEntry, CreateActivity};

use super::super::{pg_err, PostgresDatabase};
use crate::DbError;

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: String,
    task_id: String,
    user_id: String,
    action: String,
    details: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for ActivityEntry {
    type Error = DbError;

    fn try_from(r: ActivityRow) -> Result<Self, Self::Error> {
        let action = ActivityAction::parse_str(&r.action)
            .ok_or_else(|| DbError::Internal(format!("unknown activity action {}", r.action)))?;
        Ok(ActivityEntry {
            id: r.id,
            task_id: r.task_id,
            user_id: r.user_id,
            action,
            details: r.details,
            created_at: r.created_at,
        })
    }
}

impl PostgresDatabase {
    pub(crate) async fn pg_record_activity(
        &self,
        input: &CreateActivity,
    ) -> Result<ActivityEntry, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let row = sqlx::query_as::<_, ActivityRow>(
            "INSERT INTO activity_log (id, task_id, user_id, action, details, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, task_id, user_id, action, details, created_at",
        )
        .bind(&id)
        .bind(&input.task_id)
        .bind(&input.user_id)
        .bind(input.action.as_str())
        .bind(&input.details)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        row.try_into()
    }

    pub(crate) async fn pg_list_task_activity(
        &self,
        task_id: &str,
    ) -> Result<Vec<ActivityEntry>, DbError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, task_id, user_id, action, details, created_at
             FROM activity_log WHERE task_id = $1
             ORDER BY created_at ASC, seq ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
