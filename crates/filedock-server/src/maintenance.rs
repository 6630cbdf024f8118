use std::sync::Arc;
use std::time::Duration;

use filedock_service::AttachmentService;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::ServerConfig;

/// Hourly pass that re-mints presigned URLs close to expiry.
pub async fn run_url_refresh(service: Arc<AttachmentService>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately; skip it so startup does not sweep.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = service.refresh_expiring_urls().await {
            error!("url refresh sweep failed: {e}");
        }
    }
}

/// Daily pass that hard-deletes long soft-deleted attachment rows.
pub async fn run_purge(service: Arc<AttachmentService>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = service.purge_deleted_attachments().await {
            error!("attachment purge failed: {e}");
        }
    }
}

/// Start both sweeps on their own tasks.
pub fn spawn_sweeps(
    service: Arc<AttachmentService>,
    config: &ServerConfig,
) -> (JoinHandle<()>, JoinHandle<()>) {
    info!(
        refresh_secs = config.refresh_interval.as_secs(),
        purge_secs = config.purge_interval.as_secs(),
        "starting maintenance sweeps"
    );
    let refresh = tokio::spawn(run_url_refresh(service.clone(), config.refresh_interval));
    let purge = tokio::spawn(run_purge(service, config.purge_interval));
    (refresh, purge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedock_db::{Database, SqliteDatabase};
    use filedock_service::{AttachmentStorage, DbActivityLog, JobQueue, ServiceConfig};
    use filedock_store::{LocalStore, StoreConfig};

    fn service(dir: &std::path::Path) -> Arc<AttachmentService> {
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let store = Arc::new(LocalStore::new(&StoreConfig::local(
            dir.to_string_lossy().to_string(),
        )));
        let storage = AttachmentStorage::new(store, Duration::from_secs(3600));
        let (jobs, _rx) = JobQueue::new();
        let activity = Arc::new(DbActivityLog::new(db.clone()));
        Arc::new(AttachmentService::new(
            db,
            storage,
            jobs,
            activity,
            ServiceConfig::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_keep_running_on_an_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            refresh_interval: Duration::from_secs(60),
            purge_interval: Duration::from_secs(120),
            ..ServerConfig::default()
        };
        let (refresh, purge) = spawn_sweeps(service(dir.path()), &config);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(!refresh.is_finished());
        assert!(!purge.is_finished());
        refresh.abort();
        purge.abort();
    }
}
