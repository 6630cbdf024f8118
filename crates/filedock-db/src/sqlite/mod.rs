pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use filedock_core::activity::{ActivityEntry, CreateActivity};
use filedock_core::api_key::ApiKey;
use filedock_core::attachment::{Attachment, AttachmentStats, CreateAttachment};
use filedock_core::pagination::{Page, PageRequest};
use filedock_core::project::{CreateProject, Project};
use filedock_core::task::{CreateTask, Task};
use filedock_core::user::{CreateUser, User};

use crate::{Database, DbConfig, DbError};

/// Extension trait that converts `rusqlite::Result<T>` into `Result<T, DbError>`.
///
/// Calling `.to_db()?` is the shortest way to map rusqlite errors inside the
/// query modules.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("filedock.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").to_db()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    fn run_migrations(&self) -> Result<(), DbError> {
        self.with_conn(migrations::run)
    }

    /// Run a synchronous query on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

/// Map a `rusqlite::Error` into a `DbError::Internal`.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

/// Like `map_sqlite_err`, but turns an empty result into `NotFound(entity)`.
pub(crate) fn not_found_or(entity: String) -> impl FnOnce(rusqlite::Error) -> DbError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(entity),
        other => map_sqlite_err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_returns_working_db() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))
                .to_db()?;
            assert!(count > 0); // migrations created tables
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn open_path_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("test.db");
        assert!(!db_path.exists());

        let _db = SqliteDatabase::open_path(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn migrations_are_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("twice.db");
        drop(SqliteDatabase::open_path(&db_path).unwrap());
        SqliteDatabase::open_path(&db_path).unwrap();
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // -- Users --
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_user_sync(&input)).await
    }
    async fn get_user(&self, id: &str) -> Result<User, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_user_sync(&id)).await
    }

    // -- Projects --
    async fn create_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_project_sync(&input)).await
    }
    async fn get_project(&self, id: &str) -> Result<Project, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_project_sync(&id)).await
    }
    async fn add_project_member(&self, project_id: &str, user_id: &str) -> Result<(), DbError> {
        let project_id = project_id.to_string();
        let user_id = user_id.to_string();
        self.blocking(move |db| db.add_project_member_sync(&project_id, &user_id))
            .await
    }

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_task_sync(&input)).await
    }
    async fn get_task(&self, id: &str) -> Result<Task, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_task_sync(&id)).await
    }

    // -- Access --
    async fn has_task_access(&self, user_id: &str, task_id: &str) -> Result<bool, DbError> {
        let user_id = user_id.to_string();
        let task_id = task_id.to_string();
        self.blocking(move |db| db.has_task_access_sync(&user_id, &task_id))
            .await
    }
    async fn has_attachment_access(
        &self,
        user_id: &str,
        attachment_id: &str,
    ) -> Result<bool, DbError> {
        let user_id = user_id.to_string();
        let attachment_id = attachment_id.to_string();
        self.blocking(move |db| db.has_attachment_access_sync(&user_id, &attachment_id))
            .await
    }

    // -- Attachments --
    async fn create_attachment(&self, input: &CreateAttachment) -> Result<Attachment, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.create_attachment_sync(&input)).await
    }
    async fn get_attachment(&self, id: &str) -> Result<Attachment, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_attachment_sync(&id)).await
    }
    async fn list_task_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, DbError> {
        let task_id = task_id.to_string();
        self.blocking(move |db| db.list_task_attachments_sync(&task_id))
            .await
    }
    async fn list_user_attachments(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<Attachment>, DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.list_user_attachments_sync(&user_id, page))
            .await
    }
    async fn search_task_attachments(
        &self,
        task_id: &str,
        query: &str,
    ) -> Result<Vec<Attachment>, DbError> {
        let task_id = task_id.to_string();
        let query = query.to_string();
        self.blocking(move |db| db.search_task_attachments_sync(&task_id, &query))
            .await
    }
    async fn update_attachment_url(
        &self,
        id: &str,
        presigned_url: &str,
        url_expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let id = id.to_string();
        let presigned_url = presigned_url.to_string();
        self.blocking(move |db| db.update_attachment_url_sync(&id, &presigned_url, url_expires_at))
            .await
    }
    async fn soft_delete_attachment(
        &self,
        id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<Attachment, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.soft_delete_attachment_sync(&id, deleted_at))
            .await
    }
    async fn find_attachments_expiring_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Attachment>, DbError> {
        self.blocking(move |db| db.find_attachments_expiring_before_sync(threshold))
            .await
    }
    async fn purge_attachments_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        self.blocking(move |db| db.purge_attachments_deleted_before_sync(cutoff))
            .await
    }
    async fn task_attachment_stats(&self, task_id: &str) -> Result<AttachmentStats, DbError> {
        let task_id = task_id.to_string();
        self.blocking(move |db| db.task_attachment_stats_sync(&task_id))
            .await
    }
    async fn user_attachment_stats(&self, user_id: &str) -> Result<AttachmentStats, DbError> {
        let user_id = user_id.to_string();
        self.blocking(move |db| db.user_attachment_stats_sync(&user_id))
            .await
    }

    // -- Activity --
    async fn record_activity(&self, input: &CreateActivity) -> Result<ActivityEntry, DbError> {
        let input = input.clone();
        self.blocking(move |db| db.record_activity_sync(&input)).await
    }
    async fn list_task_activity(&self, task_id: &str) -> Result<Vec<ActivityEntry>, DbError> {
        let task_id = task_id.to_string();
        self.blocking(move |db| db.list_task_activity_sync(&task_id)).await
    }

    // -- API Keys --
    async fn insert_api_key(
        &self,
        user_id: &str,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, DbError> {
        let user_id = user_id.to_string();
        let name = name.to_string();
        let key_hash = key_hash.to_string();
        self.blocking(move |db| db.insert_api_key_sync(&user_id, &name, &key_hash))
            .await
    }
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError> {
        let key_hash = key_hash.to_string();
        self.blocking(move |db| db.find_api_key_by_hash_sync(&key_hash))
            .await
    }
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.touch_api_key_sync(&id)).await
    }
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        self.blocking(|db| db.list_api_keys_sync()).await
    }
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.delete_api_key_sync(&id)).await
    }
}
