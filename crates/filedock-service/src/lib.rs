pub mod activity;
pub mod attachments;
mod config;
pub mod jobs;
pub mod mapper;
pub mod permissions;
pub mod storage;

pub use activity::{ActivityLog, DbActivityLog};
pub use attachments::{AttachmentService, StreamedFile, SweepReport, UploadResult};
pub use config::ServiceConfig;
pub use jobs::{BackgroundJob, JobQueue, JobWorker};
pub use storage::{AttachmentStorage, StoredObject, UploadFile};

use filedock_core::FiledockError;
use filedock_db::DbError;
use filedock_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => ServiceError::NotFound(format!("stored object {key}")),
            StoreError::Internal(msg) => ServiceError::Storage(msg),
        }
    }
}

impl From<FiledockError> for ServiceError {
    fn from(e: FiledockError) -> Self {
        match e {
            FiledockError::NotFound(msg) => ServiceError::NotFound(msg),
            FiledockError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
            FiledockError::Forbidden(msg) => ServiceError::Forbidden(msg),
        }
    }
}
