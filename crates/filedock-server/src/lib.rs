pub mod auth;
pub mod config;
pub mod maintenance;
mod routes;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use filedock_db::Database;
use filedock_service::{
    AttachmentService, AttachmentStorage, DbActivityLog, JobQueue, ServiceConfig,
};
use filedock_store::{LocalStore, ObjectStore, StoreConfig};
use tokio::net::TcpListener;

pub use routes::{build_router, AppState, InnerAppState};

/// Wire the service, its job worker and the router state together.
///
/// When S3 is not configured the local store is also handed to the router so
/// it can serve `/files` downloads.
pub fn build_state(
    db: Arc<dyn Database>,
    store_config: &StoreConfig,
    service_config: ServiceConfig,
) -> Result<AppState> {
    let (store, local_store) = if store_config.is_s3() {
        (filedock_store::create_store(store_config)?, None)
    } else {
        let local = Arc::new(LocalStore::new(store_config));
        tracing::info!(dir = %local.base_dir().display(), "using local object store");
        let store: Arc<dyn ObjectStore> = local.clone();
        (store, Some(local))
    };

    let storage = AttachmentStorage::new(store, service_config.url_ttl);
    let (jobs, _worker) = JobQueue::spawn(db.clone(), storage.clone());
    let activity = Arc::new(DbActivityLog::new(db.clone()));
    let service = AttachmentService::new(db.clone(), storage, jobs, activity, service_config);

    Ok(Arc::new(InnerAppState {
        service: Arc::new(service),
        db,
        local_store,
    }))
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = routes::build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
