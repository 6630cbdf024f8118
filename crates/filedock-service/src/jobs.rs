//! Fire-and-forget work that runs after the request that queued it has
//! returned. Jobs have no result channel; failures are logged and dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use filedock_db::Database;

use crate::storage::AttachmentStorage;

#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundJob {
    /// Write a freshly minted URL back to the attachment row.
    PersistUrl {
        attachment_id: String,
        url: String,
        expires_at: DateTime<Utc>,
    },
    /// Remove an object from the store.
    DeleteObject { storage_key: String },
}

impl BackgroundJob {
    fn kind(&self) -> &'static str {
        match self {
            BackgroundJob::PersistUrl { .. } => "persist_url",
            BackgroundJob::DeleteObject { .. } => "delete_object",
        }
    }
}

/// Cloneable submission handle.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<BackgroundJob>,
}

impl JobQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BackgroundJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue and worker wired together, with the worker running on its own task.
    pub fn spawn(
        db: Arc<dyn Database>,
        storage: AttachmentStorage,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::new();
        let worker = JobWorker::new(rx, db, storage);
        let handle = tokio::spawn(worker.run());
        (queue, handle)
    }

    /// Never blocks. If the worker has shut down the job is dropped.
    pub fn submit(&self, job: BackgroundJob) {
        let kind = job.kind();
        if self.tx.send(job).is_err() {
            warn!(job = kind, "job worker is gone, dropping job");
        }
    }
}

pub struct JobWorker {
    rx: mpsc::UnboundedReceiver<BackgroundJob>,
    db: Arc<dyn Database>,
    storage: AttachmentStorage,
}

impl JobWorker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<BackgroundJob>,
        db: Arc<dyn Database>,
        storage: AttachmentStorage,
    ) -> Self {
        Self { rx, db, storage }
    }

    /// Process jobs one at a time until every queue handle is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            self.process(job).await;
        }
        debug!("job queue closed, worker exiting");
    }

    /// Process whatever is queued right now, then return the count handled.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(job) = self.rx.try_recv() {
            self.process(job).await;
            handled += 1;
        }
        handled
    }

    async fn process(&self, job: BackgroundJob) {
        match job {
            BackgroundJob::PersistUrl {
                attachment_id,
                url,
                expires_at,
            } => {
                match self
                    .db
                    .update_attachment_url(&attachment_id, &url, expires_at)
                    .await
                {
                    Ok(()) => debug!(attachment_id, "persisted refreshed url"),
                    Err(e) => warn!(attachment_id, error = %e, "failed to persist url"),
                }
            }
            BackgroundJob::DeleteObject { storage_key } => {
                match self.storage.delete(&storage_key).await {
                    Ok(()) => debug!(storage_key, "deleted stored object"),
                    Err(e) => warn!(storage_key, error = %e, "failed to delete stored object"),
                }
            }
        }
    }
}
