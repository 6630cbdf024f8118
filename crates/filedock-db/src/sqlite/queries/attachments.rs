use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use filedock_core::attachment::{Attachment, AttachmentStats, CreateAttachment};
use filedock_core::pagination::{Page, PageRequest};

use super::super::{not_found_or, SqliteDatabase, SqliteResultExt};
use crate::{like_pattern, stats_columns_sql, DbError};

fn row_to_attachment(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        uploaded_by: row.get("uploaded_by")?,
        file_name: row.get("file_name")?,
        original_file_name: row.get("original_file_name")?,
        file_size: row.get("file_size")?,
        content_type: row.get("content_type")?,
        storage_key: row.get("storage_key")?,
        presigned_url: row.get("presigned_url")?,
        url_expires_at: row.get("url_expires_at")?,
        is_deleted: row.get("is_deleted")?,
        deleted_at: row.get("deleted_at")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_stats(row: &Row) -> rusqlite::Result<AttachmentStats> {
    Ok(AttachmentStats {
        total_count: row.get("total_count")?,
        total_size: row.get("total_size")?,
        image_count: row.get("image_count")?,
        document_count: row.get("document_count")?,
        archive_count: row.get("archive_count")?,
    })
}

impl SqliteDatabase {
    pub fn create_attachment_sync(&self, input: &CreateAttachment) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO attachments (
                    id, task_id, uploaded_by, file_name, original_file_name, file_size,
                    content_type, storage_key, presigned_url, url_expires_at, is_deleted, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)",
                params![
                    id,
                    input.task_id,
                    input.uploaded_by,
                    input.file_name,
                    input.original_file_name,
                    input.file_size,
                    input.content_type,
                    input.storage_key,
                    input.presigned_url,
                    input.url_expires_at,
                    Utc::now()
                ],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                row_to_attachment,
            )
            .to_db()
        })
    }

    pub fn get_attachment_sync(&self, id: &str) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1 AND is_deleted = 0",
                params![id],
                row_to_attachment,
            )
            .map_err(not_found_or(format!("attachment {id}")))
        })
    }

    pub fn list_task_attachments_sync(&self, task_id: &str) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM attachments
                     WHERE task_id = ?1 AND is_deleted = 0
                     ORDER BY created_at DESC, id DESC",
                )
                .to_db()?;
            let attachments = stmt
                .query_map(params![task_id], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(attachments)
        })
    }

    pub fn list_user_attachments_sync(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<Attachment>, DbError> {
        self.with_conn(|conn| {
            let total: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM attachments WHERE uploaded_by = ?1 AND is_deleted = 0",
                    params![user_id],
                    |row| row.get(0),
                )
                .to_db()?;
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM attachments
                     WHERE uploaded_by = ?1 AND is_deleted = 0
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2 OFFSET ?3",
                )
                .to_db()?;
            let items = stmt
                .query_map(
                    params![user_id, page.limit(), page.offset()],
                    row_to_attachment,
                )
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(Page::new(items, page, total))
        })
    }

    pub fn search_task_attachments_sync(
        &self,
        task_id: &str,
        query: &str,
    ) -> Result<Vec<Attachment>, DbError> {
        let pattern = like_pattern(query);
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM attachments
                     WHERE task_id = ?1 AND is_deleted = 0
                       AND (LOWER(original_file_name) LIKE ?2 ESCAPE '\\'
                            OR LOWER(content_type) LIKE ?2 ESCAPE '\\')
                     ORDER BY created_at DESC, id DESC",
                )
                .to_db()?;
            let attachments = stmt
                .query_map(params![task_id, pattern], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(attachments)
        })
    }

    pub fn update_attachment_url_sync(
        &self,
        id: &str,
        presigned_url: &str,
        url_expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE attachments SET presigned_url = ?1, url_expires_at = ?2
                     WHERE id = ?3 AND is_deleted = 0",
                    params![presigned_url, url_expires_at, id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("attachment {id}")));
            }
            Ok(())
        })
    }

    pub fn soft_delete_attachment_sync(
        &self,
        id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE attachments SET is_deleted = 1, deleted_at = ?1
                     WHERE id = ?2 AND is_deleted = 0",
                    params![deleted_at, id],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("attachment {id}")));
            }
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                row_to_attachment,
            )
            .to_db()
        })
    }

    pub fn find_attachments_expiring_before_sync(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM attachments
                     WHERE is_deleted = 0 AND url_expires_at < ?1
                     ORDER BY url_expires_at ASC",
                )
                .to_db()?;
            let attachments = stmt
                .query_map(params![threshold], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(attachments)
        })
    }

    pub fn purge_attachments_deleted_before_sync(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        self.with_conn(|conn| {
            let purged = conn
                .execute(
                    "DELETE FROM attachments WHERE is_deleted = 1 AND deleted_at < ?1",
                    params![cutoff],
                )
                .to_db()?;
            Ok(purged as u64)
        })
    }

    pub fn task_attachment_stats_sync(&self, task_id: &str) -> Result<AttachmentStats, DbError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM attachments WHERE task_id = ?1 AND is_deleted = 0",
                stats_columns_sql()
            );
            conn.query_row(&sql, params![task_id], row_to_stats).to_db()
        })
    }

    pub fn user_attachment_stats_sync(&self, user_id: &str) -> Result<AttachmentStats, DbError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM attachments WHERE uploaded_by = ?1 AND is_deleted = 0",
                stats_columns_sql()
            );
            conn.query_row(&sql, params![user_id], row_to_stats).to_db()
        })
    }
}
