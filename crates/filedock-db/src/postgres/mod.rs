pub(crate) mod migrations;
pub mod queries;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use filedock_core::activity::{ActivityEntry, CreateActivity};
use filedock_core::api_key::ApiKey;
use filedock_core::attachment::{Attachment, AttachmentStats, CreateAttachment};
use filedock_core::pagination::{Page, PageRequest};
use filedock_core::project::{CreateProject, Project};
use filedock_core::task::{CreateTask, Task};
use filedock_core::user::{CreateUser, User};

use crate::{Database, DbError};

/// Map a sqlx::Error into a DbError::Internal.
pub(crate) fn pg_err(e: sqlx::Error) -> DbError {
    DbError::Internal(e.to_string())
}

/// Create a DbError::NotFound with the given entity description.
pub(crate) fn pg_not_found(entity: &str) -> DbError {
    DbError::NotFound(entity.to_string())
}

#[derive(Clone)]
pub struct PostgresDatabase {
    pub(crate) pool: PgPool,
}

impl PostgresDatabase {
    /// Connect to a Postgres database and run migrations.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(pg_err)?;

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        Ok(db)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    // -- Users --
    async fn create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        self.pg_create_user(input).await
    }
    async fn get_user(&self, id: &str) -> Result<User, DbError> {
        self.pg_get_user(id).await
    }

    // -- Projects --
    async fn create_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        self.pg_create_project(input).await
    }
    async fn get_project(&self, id: &str) -> Result<Project, DbError> {
        self.pg_get_project(id).await
    }
    async fn add_project_member(&self, project_id: &str, user_id: &str) -> Result<(), DbError> {
        self.pg_add_project_member(project_id, user_id).await
    }

    // -- Tasks --
    async fn create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        self.pg_create_task(input).await
    }
    async fn get_task(&self, id: &str) -> Result<Task, DbError> {
        self.pg_get_task(id).await
    }

    // -- Access --
    async fn has_task_access(&self, user_id: &str, task_id: &str) -> Result<bool, DbError> {
        self.pg_has_task_access(user_id, task_id).await
    }
    async fn has_attachment_access(
        &self,
        user_id: &str,
        attachment_id: &str,
    ) -> Result<bool, DbError> {
        self.pg_has_attachment_access(user_id, attachment_id).await
    }

    // -- Attachments --
    async fn create_attachment(&self, input: &CreateAttachment) -> Result<Attachment, DbError> {
        self.pg_create_attachment(input).await
    }
    async fn get_attachment(&self, id: &str) -> Result<Attachment, DbError> {
        self.pg_get_attachment(id).await
    }
    async fn list_task_attachments(&self, task_id: &str) -> Result<Vec<Attachment>, DbError> {
        self.pg_list_task_attachments(task_id).await
    }
    async fn list_user_attachments(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<Attachment>, DbError> {
        self.pg_list_user_attachments(user_id, page).await
    }
    async fn search_task_attachments(
        &self,
        task_id: &str,
        query: &str,
    ) -> Result<Vec<Attachment>, DbError> {
        self.pg_search_task_attachments(task_id, query).await
    }
    async fn update_attachment_url(
        &self,
        id: &str,
        presigned_url: &str,
        url_expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.pg_update_attachment_url(id, presigned_url, url_expires_at)
            .await
    }
    async fn soft_delete_attachment(
        &self,
        id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<Attachment, DbError> {
        self.pg_soft_delete_attachment(id, deleted_at).await
    }
    async fn find_attachments_expiring_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Attachment>, DbError> {
        self.pg_find_attachments_expiring_before(threshold).await
    }
    async fn purge_attachments_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        self.pg_purge_attachments_deleted_before(cutoff).await
    }
    async fn task_attachment_stats(&self, task_id: &str) -> Result<AttachmentStats, DbError> {
        self.pg_task_attachment_stats(task_id).await
    }
    async fn user_attachment_stats(&self, user_id: &str) -> Result<AttachmentStats, DbError> {
        self.pg_user_attachment_stats(user_id).await
    }

    // -- Activity --
    async fn record_activity(&self, input: &CreateActivity) -> Result<ActivityEntry, DbError> {
        self.pg_record_activity(input).await
    }
    async fn list_task_activity(&self, task_id: &str) -> Result<Vec<ActivityEntry>, DbError> {
        self.pg_list_task_activity(task_id).await
    }

    // -- API Keys --
    async fn insert_api_key(
        &self,
        user_id: &str,
        name: &str,
        key_hash: &str,
    ) -> Result<ApiKey, DbError> {
        self.pg_insert_api_key(user_id, name, key_hash).await
    }
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, DbError> {
        self.pg_find_api_key_by_hash(key_hash).await
    }
    async fn touch_api_key(&self, id: &str) -> Result<(), DbError> {
        self.pg_touch_api_key(id).await
    }
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, DbError> {
        self.pg_list_api_keys().await
    }
    async fn delete_api_key(&self, id: &str) -> Result<(), DbError> {
        self.pg_delete_api_key(id).await
    }
}
