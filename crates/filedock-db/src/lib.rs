#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PostgresDatabase;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use filedock_core::activity::{ActivityEntry, CreateActivity};
use filedock_core::api_key::ApiKey;
use filedock_core::attachment::{
    Attachment, AttachmentStats, CreateAttachment, ARCHIVE_TYPES, DOCUMENT_TYPES,
};
use filedock_core::pagination::{Page, PageRequest};
use filedock_core::project::{CreateProject, Project};
use filedock_core::task::{CreateTask, Task};
use filedock_core::user::{CreateUser, User};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence for attachments and the read-only task/user/project data they
/// hang off.
///
/// Every attachment query except [`Database::purge_attachments_deleted_before`]
/// skips soft-deleted rows, so a deleted attachment behaves as missing.
#[async_trait]
pub trait Database: Send + Sync {
    // -- Users --
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError>;
    async fn get_user(&self, id: &str) -> Result<User, DbError>;

    // -- Projects --
    async fn create_project(&self, input: &CreateProject) -> Result<Project, DbError>;
    async fn get_project(&self, id: &str) -> Result<Project, DbError>;
    async fn add_project_member(&self, project_id: &str, user_id: &str) -> Result<(), DbError>;

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError>;
    async fn get_task(&self, id: &str) -> Result<Task, DbError>;

    // -- Access --
    /// True when the user owns or belongs to the task's project, created the
    /// task, or is assigned to it.
    async fn has_task_access(&self, user_id: &str, task_id: &str) -> Result<bool, DbError>;
    /// Same rule as `has_task_access`, applied to the attachment's task.
    async fn has_attachment_access(
        &self,
        user_id: &str,
        attachment_id: &str,
    ) -> Result<bool, DbError>;

    // -- Attachments --
    async fn create_attachment(&self, input: &CreateAttachment) -> Result<Attachment, DbError>;
    async fn get_attachment(&self, id: &str) -> Result<Attachment, DbError>;
    async fn list_task_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, DbError>;
    async fn list_user_attachments(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<Attachment>, DbError>;
    async fn search_task_attachments(
        &self,
        task_id: &str,
        query: &str,
    ) -> Result<Vec<Attachment>, DbError>;
    /// Replace the presigned URL and its expiry together.
    async fn update_attachment_url(
        &self,
        id: &str,
        presigned_url: &str,
        url_expires_at: DateTime<Utc>,
    ) -> Result<(), DbError>;
    async fn soft_delete_attachment(
        &self,
        id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<Attachment, DbError>;
    async fn find_attachments_expiring_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Attachment>, DbError>;
    /// Hard-delete soft-deleted rows whose `deleted_at` is older than `cutoff`.
    async fn purge_attachments_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbError>;
    async fn task_attachment_stats(&self, task_id: &str) -> Result<AttachmentStats, DbError>;
    async fn user_attachment_stats(&self, user_id: &str) -> Result<AttachmentStats, DbError>;

    // -- Activity --
    async fn record_activity(&self, input: &CreateActivity) -> Result<ActivityEntry, DbError>;
    async fn list_task_activity(&self, task_id: &str) -> Result<Vec<ActivityEntry>, DbError>;

    // -- API Keys --
    async fn insert_api_key(
        &self,
        user_id: &str,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, DbError>;
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError>;
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError>;
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError>;
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError>;
}

// -- Configuration --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbBackend {
    Sqlite,
    Postgres,
}

/// Which backend to open and where.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub backend: DbBackend,
    /// SQLite file path. Defaults to `<data_dir>/filedock.db`.
    pub sqlite_path: Option<String>,
    /// Postgres connection URL.
    pub database_url: Option<String>,
}

impl DbConfig {
    /// `FILEDOCK_DATABASE_URL` selects Postgres when it has a `postgres` scheme;
    /// otherwise SQLite at `FILEDOCK_SQLITE_PATH` or the default data dir.
    pub fn from_env() -> Self {
        let database_url = std::env::var("FILEDOCK_DATABASE_URL").ok();
        let backend = match database_url.as_deref() {
            Some(url) if url.starts_with("postgres") => DbBackend::Postgres,
            _ => DbBackend::Sqlite,
        };
        Self {
            backend,
            sqlite_path: std::env::var("FILEDOCK_SQLITE_PATH").ok(),
            database_url,
        }
    }

    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            backend: DbBackend::Sqlite,
            sqlite_path: Some(path.into()),
            database_url: None,
        }
    }
}

/// Open the configured backend behind the `Database` trait.
pub async fn open_database(config: &DbConfig) -> Result<Arc<dyn Database>, DbError> {
    match config.backend {
        #[cfg(feature = "sqlite")]
        DbBackend::Sqlite => {
            let db = SqliteDatabase::open(config)?;
            tracing::info!(path = ?config.sqlite_path, "opened sqlite database");
            Ok(Arc::new(db))
        }
        #[cfg(feature = "postgres")]
        DbBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| DbError::Internal("database url required".into()))?;
            let db = PostgresDatabase::connect(url).await?;
            tracing::info!("connected to postgres");
            Ok(Arc::new(db))
        }
        #[allow(unreachable_patterns)]
        other => Err(DbError::Internal(format!(
            "{other:?} backend is not enabled in this build"
        ))),
    }
}

pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("filedock")
}

// -- SQL shared by both backends --

fn quoted_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Aggregate columns for attachment stats, in `AttachmentStats` field order.
pub(crate) fn stats_columns_sql() -> String {
    format!(
        "CAST(COUNT(*) AS BIGINT) AS total_count,
         CAST(COALESCE(SUM(file_size), 0) AS BIGINT) AS total_size,
         CAST(COALESCE(SUM(CASE WHEN LOWER(content_type) LIKE 'image/%' THEN 1 ELSE 0 END), 0) AS BIGINT) AS image_count,
         CAST(COALESCE(SUM(CASE WHEN LOWER(content_type) IN ({docs}) THEN 1 ELSE 0 END), 0) AS BIGINT) AS document_count,
         CAST(COALESCE(SUM(CASE WHEN LOWER(content_type) IN ({archives}) THEN 1 ELSE 0 END), 0) AS BIGINT) AS archive_count",
        docs = quoted_list(DOCUMENT_TYPES),
        archives = quoted_list(ARCHIVE_TYPES),
    )
}

/// Lowercased `%query%` pattern with LIKE wildcards escaped by `\`.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" Report "), "%report%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn stats_sql_lists_every_category_type() {
        let sql = stats_columns_sql();
        for t in DOCUMENT_TYPES.iter().chain(ARCHIVE_TYPES) {
            assert!(sql.contains(t), "missing {t}");
        }
    }

    #[test]
    fn sqlite_config_helper() {
        let config = DbConfig::sqlite("/tmp/x.db");
        assert_eq!(config.backend, DbBackend::Sqlite);
        assert_eq!(config.sqlite_path.as_deref(), Some("/tmp/x.db"));
    }
}
