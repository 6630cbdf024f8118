use std::sync::Arc;

use async_trait::async_trait;

use filedock_core::activity::{ActivityAction, CreateActivity};
use filedock_db::Database;

use crate::ServiceError;

/// Sink for task activity events.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record(&self, entry: &CreateActivity) -> Result<(), ServiceError>;
}

/// Writes activity to the `activity_log` table.
pub struct DbActivityLog {
    db: Arc<dyn Database>,
}

impl DbActivityLog {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityLog for DbActivityLog {
    async fn record(&self, entry: &CreateActivity) -> Result<(), ServiceError> {
        self.db.record_activity(entry).await?;
        Ok(())
    }
}

/// Record an event on a detached task. The caller never waits and failures
/// are only logged.
pub fn emit(
    log: &Arc<dyn ActivityLog>,
    task_id: &str,
    user_id: &str,
    action: ActivityAction,
    details: String,
) {
    let log = Arc::clone(log);
    let entry = CreateActivity {
        task_id: task_id.to_string(),
        user_id: user_id.to_string(),
        action,
        details,
    };
    tokio::spawn(async move {
        if let Err(e) = log.record(&entry).await {
            tracing::warn!(task_id = %entry.task_id, action = %entry.action, error = %e, "failed to record activity");
        }
    });
}
