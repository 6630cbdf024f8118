use chrono::{DateTime, Utc};

use filedock_core::attachment::{Attachment, AttachmentStats, CreateAttachment};
use filedock_core::pagination::{Page, PageRequest};

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::{like_pattern, stats_columns_sql, DbError};

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: String,
    task_id: String,
    uploaded_by: String,
    file_name: String,
    original_file_name: String,
    file_size: i64,
    content_type: String,
    storage_key: String,
    presigned_url: String,
    url_expires_at: DateTime<Utc>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(r: AttachmentRow) -> Self {
        Attachment {
            id: r.id,
            task_id: r.task_id,
            uploaded_by: r.uploaded_by,
            file_name: r.file_name,
            original_file_name: r.original_file_name,
            file_size: r.file_size,
            content_type: r.content_type,
            storage_key: r.storage_key,
            presigned_url: r.presigned_url,
            url_expires_at: r.url_expires_at,
            is_deleted: r.is_deleted,
            deleted_at: r.deleted_at,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total_count: i64,
    total_size: i64,
    image_count: i64,
    document_count: i64,
    archive_count: i64,
}

impl From<StatsRow> for AttachmentStats {
    fn from(r: StatsRow) -> Self {
        AttachmentStats {
            total_count: r.total_count,
            total_size: r.total_size,
            image_count: r.image_count,
            document_count: r.document_count,
            archive_count: r.archive_count,
        }
    }
}

impl PostgresDatabase {
    pub(crate) async fn pg_create_attachment(
        &self,
        input: &CreateAttachment,
    ) -> Result<Attachment, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let row = sqlx::query_as::<_, AttachmentRow>(
            "INSERT INTO attachments (
                id, task_id, uploaded_by, file_name, original_file_name, file_size,
                content_type, storage_key, presigned_url, url_expires_at, is_deleted, created_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11)
             RETURNING id, task_id, uploaded_by, file_name, original_file_name, file_size,
                       content_type, storage_key, presigned_url, url_expires_at,
                       is_deleted, deleted_at, created_at",
        )
        .bind(&id)
        .bind(&input.task_id)
        .bind(&input.uploaded_by)
        .bind(&input.file_name)
        .bind(&input.original_file_name)
        .bind(input.file_size)
        .bind(&input.content_type)
        .bind(&input.storage_key)
        .bind(&input.presigned_url)
        .bind(input.url_expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(row.into())
    }

    pub(crate) async fn pg_get_attachment(&self, id: &str) -> Result<Attachment, DbError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM attachments WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?
        .ok_or_else(|| pg_not_found(&format!("attachment {id}")))?;

        Ok(row.into())
    }

    pub(crate) async fn pg_list_task_attachments(
        &self,
        task_id: &str,
    ) -> Result<Vec<Attachment>, DbError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM attachments
             WHERE task_id = $1 AND NOT is_deleted
             ORDER BY created_at DESC, id DESC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub(crate) async fn pg_list_user_attachments(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<Attachment>, DbError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attachments WHERE uploaded_by = $1 AND NOT is_deleted",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        let rows = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM attachments
             WHERE uploaded_by = $1 AND NOT is_deleted
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        let items = rows.into_iter().map(Into::into).collect();
        Ok(Page::new(items, page, total))
    }

    pub(crate) async fn pg_search_task_attachments(
        &self,
        task_id: &str,
        query: &str,
    ) -> Result<Vec<Attachment>, DbError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM attachments
             WHERE task_id = $1 AND NOT is_deleted
               AND (LOWER(original_file_name) LIKE $2 ESCAPE '\\'
                    OR LOWER(content_type) LIKE $2 ESCAPE '\\')
             ORDER BY created_at DESC, id DESC",
        )
        .bind(task_id)
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub(crate) async fn pg_update_attachment_url(
        &self,
        id: &str,
        presigned_url: &str,
        url_expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE attachments SET presigned_url = $1, url_expires_at = $2
             WHERE id = $3 AND NOT is_deleted",
        )
        .bind(presigned_url)
        .bind(url_expires_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(pg_err)?;

        if result.rows_affected() == 0 {
            return Err(pg_not_found(&format!("attachment {id}")));
        }
        Ok(())
    }

    pub(crate) async fn pg_soft_delete_attachment(
        &self,
        id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<Attachment, DbError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            "UPDATE attachments SET is_deleted = TRUE, deleted_at = $1
             WHERE id = $2 AND NOT is_deleted
             RETURNING *",
        )
        .bind(deleted_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?
        .ok_or_else(|| pg_not_found(&format!("attachment {id}")))?;

        Ok(row.into())
    }

    pub(crate) async fn pg_find_attachments_expiring_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Attachment>, DbError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            "SELECT * FROM attachments
             WHERE NOT is_deleted AND url_expires_at < $1
             ORDER BY url_expires_at ASC",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub(crate) async fn pg_purge_attachments_deleted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let result =
            sqlx::query("DELETE FROM attachments WHERE is_deleted AND deleted_at < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await
                .map_err(pg_err)?;

        Ok(result.rows_affected())
    }

    pub(crate) async fn pg_task_attachment_stats(
        &self,
        task_id: &str,
    ) -> Result<AttachmentStats, DbError> {
        let sql = format!(
            "SELECT {} FROM attachments WHERE task_id = $1 AND NOT is_deleted",
            stats_columns_sql()
        );
        let row = sqlx::query_as::<_, StatsRow>(&sql)
            .bind(task_id)
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)?;

        Ok(row.into())
    }

    pub(crate) async fn pg_user_attachment_stats(
        &self,
        user_id: &str,
    ) -> Result<AttachmentStats, DbError> {
        let sql = format!(
            "SELECT {} FROM attachments WHERE uploaded_by = $1 AND NOT is_deleted",
            stats_columns_sql()
        );
        let row = sqlx::query_as::<_, StatsRow>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(pg_err)?;

        Ok(row.into())
    }
}
