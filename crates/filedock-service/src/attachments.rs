use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use filedock_core::activity::ActivityAction;
use filedock_core::attachment::{
    normalize_content_type, validate_upload, Attachment, CreateAttachment,
};
use filedock_core::pagination::{Page, PageRequest};
use filedock_core::task::Task;
use filedock_core::user::User;
use filedock_db::Database;

use crate::activity::{self, ActivityLog};
use crate::jobs::{BackgroundJob, JobQueue};
use crate::mapper::{
    self, AttachmentResponse, AttachmentStatsResponse, AttachmentSummary, PreviewData,
};
use crate::permissions;
use crate::storage::{AttachmentStorage, UploadFile};
use crate::{ServiceConfig, ServiceError};

/// Outcome of an upload. Failures are reported here instead of as `Err`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentResponse>,
}

impl UploadResult {
    fn ok(attachment: AttachmentResponse) -> Self {
        Self {
            success: true,
            message: "File uploaded successfully".into(),
            error: None,
            attachment: Some(attachment),
        }
    }

    pub fn failed(error: &ServiceError) -> Self {
        Self {
            success: false,
            message: "Failed to upload file".into(),
            error: Some(error.to_string()),
            attachment: None,
        }
    }
}

/// Raw bytes of an attachment plus what a client needs to save them.
#[derive(Debug, Clone)]
pub struct StreamedFile {
    pub data: Bytes,
    pub content_type: String,
    pub file_name: String,
}

/// Counters from one pass of the URL refresh sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub refreshed: usize,
    pub failed: usize,
}

/// Attachment lifecycle: upload, access-checked reads, URL refresh, deletion
/// and the maintenance sweeps.
pub struct AttachmentService {
    db: Arc<dyn Database>,
    storage: AttachmentStorage,
    jobs: JobQueue,
    activity: Arc<dyn ActivityLog>,
    config: ServiceConfig,
}

impl AttachmentService {
    pub fn new(
        db: Arc<dyn Database>,
        storage: AttachmentStorage,
        jobs: JobQueue,
        activity: Arc<dyn ActivityLog>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            db,
            storage,
            jobs,
            activity,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // -- Access --

    /// Load a task the user can see. Missing is NotFound, hidden is Forbidden.
    async fn resolve_task(&self, task_id: &str, user_id: &str) -> Result<Task, ServiceError> {
        let task = self.db.get_task(task_id).await?;
        if !self.db.has_task_access(user_id, task_id).await? {
            return Err(ServiceError::Forbidden(format!(
                "no access to task {task_id}"
            )));
        }
        Ok(task)
    }

    /// Load a live attachment the user can see. Soft-deleted rows are NotFound.
    async fn resolve_attachment(
        &self,
        attachment_id: &str,
        user_id: &str,
    ) -> Result<Attachment, ServiceError> {
        let attachment = self.db.get_attachment(attachment_id).await?;
        if !self.db.has_attachment_access(user_id, attachment_id).await? {
            return Err(ServiceError::Forbidden(format!(
                "no access to attachment {attachment_id}"
            )));
        }
        Ok(attachment)
    }

    // -- Upload --

    pub async fn upload_attachment(
        &self,
        task_id: &str,
        file: UploadFile,
        user_id: &str,
    ) -> UploadResult {
        match self.try_upload(task_id, &file, user_id).await {
            Ok(response) => UploadResult::ok(response),
            Err(e) => {
                warn!(task_id, user_id, file = %file.file_name, error = %e, "upload failed");
                UploadResult::failed(&e)
            }
        }
    }

    async fn try_upload(
        &self,
        task_id: &str,
        file: &UploadFile,
        user_id: &str,
    ) -> Result<AttachmentResponse, ServiceError> {
        let task = self.resolve_task(task_id, user_id).await?;
        if !permissions::can_upload(user_id, &task) {
            return Err(ServiceError::Forbidden(format!(
                "user {user_id} may not upload to task {task_id}"
            )));
        }
        validate_upload(&file.file_name, file.size(), self.config.max_upload_bytes)?;
        let uploader = self.db.get_user(user_id).await?;

        let stored = self.storage.upload(file, task_id, user_id).await?;
        // Stored bare so SQL stats bucket rows the same way `category()` does.
        let content_type = match normalize_content_type(&file.content_type) {
            ct if ct.is_empty() => "application/octet-stream".to_string(),
            ct => ct,
        };

        let input = CreateAttachment {
            task_id: task_id.to_string(),
            uploaded_by: user_id.to_string(),
            file_name: stored.file_name,
            original_file_name: file.file_name.clone(),
            file_size: file.size() as i64,
            content_type,
            storage_key: stored.storage_key.clone(),
            presigned_url: stored.presigned_url,
            url_expires_at: stored.url_expires_at,
        };
        let attachment = match self.db.create_attachment(&input).await {
            Ok(a) => a,
            Err(e) => {
                self.jobs.submit(BackgroundJob::DeleteObject {
                    storage_key: stored.storage_key,
                });
                return Err(e.into());
            }
        };

        info!(
            attachment_id = %attachment.id,
            task_id,
            user_id,
            size = attachment.file_size,
            "attachment uploaded"
        );
        activity::emit(
            &self.activity,
            task_id,
            user_id,
            ActivityAction::FileUploaded,
            attachment.original_file_name.clone(),
        );

        Ok(mapper::to_response(&attachment, &task, &uploader, Utc::now()))
    }

    // -- Reads --

    pub async fn get_attachment(
        &self,
        attachment_id: &str,
        user_id: &str,
    ) -> Result<AttachmentResponse, ServiceError> {
        let attachment = self.resolve_attachment(attachment_id, user_id).await?;
        let task = self.db.get_task(&attachment.task_id).await?;
        let uploader = self.db.get_user(&attachment.uploaded_by).await?;
        Ok(mapper::to_response(&attachment, &task, &uploader, Utc::now()))
    }

    /// Preview metadata. An expired URL is refreshed before it is handed out.
    pub async fn get_preview_data(
        &self,
        attachment_id: &str,
        user_id: &str,
    ) -> Result<PreviewData, ServiceError> {
        let mut attachment = self.resolve_attachment(attachment_id, user_id).await?;
        if attachment.is_url_expired(Utc::now()) {
            attachment = self.refresh_attachment_url(&attachment).await?;
        }
        Ok(mapper::to_preview(&attachment, &self.config.preview_base_url))
    }

    pub async fn stream_attachment(
        &self,
        attachment_id: &str,
        user_id: &str,
    ) -> Result<StreamedFile, ServiceError> {
        let attachment = self.resolve_attachment(attachment_id, user_id).await?;
        let data = self.storage.get_bytes(&attachment.storage_key).await?;
        Ok(StreamedFile {
            data,
            content_type: attachment.content_type,
            file_name: attachment.original_file_name,
        })
    }

    /// Mint a fresh download URL. Persisting it happens in the background.
    pub async fn get_download_url(
        &self,
        attachment_id: &str,
        user_id: &str,
    ) -> Result<String, ServiceError> {
        let attachment = self.resolve_attachment(attachment_id, user_id).await?;
        let (url, expires_at) = self
            .storage
            .mint_presigned_url(&attachment.storage_key)
            .await?;

        self.jobs.submit(BackgroundJob::PersistUrl {
            attachment_id: attachment.id.clone(),
            url: url.clone(),
            expires_at,
        });
        activity::emit(
            &self.activity,
            &attachment.task_id,
            user_id,
            ActivityAction::FileDownloaded,
            attachment.original_file_name.clone(),
        );
        Ok(url)
    }

    // -- Delete --

    pub async fn delete_attachment(
        &self,
        attachment_id: &str,
        user_id: &str,
    ) -> Result<(), ServiceError> {
        let attachment = self.resolve_attachment(attachment_id, user_id).await?;
        let task = self.db.get_task(&attachment.task_id).await?;
        let project = self.db.get_project(&task.project_id).await?;
        if !permissions::can_delete(user_id, &attachment, &task, &project) {
            return Err(ServiceError::Forbidden(format!(
                "user {user_id} may not delete attachment {attachment_id}"
            )));
        }

        let deleted = self
            .db
            .soft_delete_attachment(attachment_id, Utc::now())
            .await?;
        self.jobs.submit(BackgroundJob::DeleteObject {
            storage_key: deleted.storage_key.clone(),
        });

        info!(attachment_id, task_id = %deleted.task_id, user_id, "attachment deleted");
        activity::emit(
            &self.activity,
            &deleted.task_id,
            user_id,
            ActivityAction::FileDeleted,
            deleted.original_file_name,
        );
        Ok(())
    }

    // -- Listing / search / stats --

    pub async fn list_task_attachments(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Vec<AttachmentSummary>, ServiceError> {
        self.resolve_task(task_id, user_id).await?;
        let attachments = self.db.list_task_attachments(task_id).await?;
        self.summarize(attachments).await
    }

    pub async fn list_user_attachments(
        &self,
        user_id: &str,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<Page<AttachmentSummary>, ServiceError> {
        let request = PageRequest::new(page, per_page);
        let uploader = self.db.get_user(user_id).await?;
        let page = self.db.list_user_attachments(user_id, request).await?;
        let now = Utc::now();
        Ok(page.map(|a| mapper::to_summary(&a, &uploader, now)))
    }

    /// Case-insensitive match on file name or content type. A blank query
    /// lists everything.
    pub async fn search_task_attachments(
        &self,
        task_id: &str,
        query: &str,
        user_id: &str,
    ) -> Result<Vec<AttachmentSummary>, ServiceError> {
        if query.trim().is_empty() {
            return self.list_task_attachments(task_id, user_id).await;
        }
        self.resolve_task(task_id, user_id).await?;
        let attachments = self.db.search_task_attachments(task_id, query).await?;
        self.summarize(attachments).await
    }

    pub async fn task_stats(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<AttachmentStatsResponse, ServiceError> {
        self.resolve_task(task_id, user_id).await?;
        let raw = self.db.task_attachment_stats(task_id).await?;
        Ok(mapper::to_stats(&raw))
    }

    pub async fn user_stats(&self, user_id: &str) -> Result<AttachmentStatsResponse, ServiceError> {
        let raw = self.db.user_attachment_stats(user_id).await?;
        Ok(mapper::to_stats(&raw))
    }

    async fn summarize(
        &self,
        attachments: Vec<Attachment>,
    ) -> Result<Vec<AttachmentSummary>, ServiceError> {
        let mut users: HashMap<String, User> = HashMap::new();
        let now = Utc::now();
        let mut out = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            if !users.contains_key(&attachment.uploaded_by) {
                let user = self.db.get_user(&attachment.uploaded_by).await?;
                users.insert(user.id.clone(), user);
            }
            if let Some(user) = users.get(&attachment.uploaded_by) {
                out.push(mapper::to_summary(&attachment, user, now));
            }
        }
        Ok(out)
    }

    // -- Maintenance --

    /// Mint and persist a new URL for `attachment`. Returns the updated copy.
    pub async fn refresh_attachment_url(
        &self,
        attachment: &Attachment,
    ) -> Result<Attachment, ServiceError> {
        let (url, expires_at) = self
            .storage
            .mint_presigned_url(&attachment.storage_key)
            .await?;
        self.db
            .update_attachment_url(&attachment.id, &url, expires_at)
            .await?;
        debug!(attachment_id = %attachment.id, %expires_at, "refreshed presigned url");

        let mut updated = attachment.clone();
        updated.presigned_url = url;
        updated.url_expires_at = expires_at;
        Ok(updated)
    }

    /// Refresh every live attachment whose URL expires within the refresh
    /// window. One failure never stops the rest.
    pub async fn refresh_expiring_urls(&self) -> Result<SweepReport, ServiceError> {
        self.refresh_expiring_urls_at(Utc::now()).await
    }

    pub async fn refresh_expiring_urls_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, ServiceError> {
        let window = chrono::Duration::from_std(self.config.refresh_window)
            .map_err(|e| ServiceError::Internal(format!("refresh window: {e}")))?;
        let expiring = self
            .db
            .find_attachments_expiring_before(now + window)
            .await?;

        let mut report = SweepReport {
            scanned: expiring.len(),
            ..SweepReport::default()
        };
        for attachment in &expiring {
            match self.refresh_attachment_url(attachment).await {
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(attachment_id = %attachment.id, error = %e, "url refresh failed");
                }
            }
        }
        info!(
            scanned = report.scanned,
            refreshed = report.refreshed,
            failed = report.failed,
            "url refresh sweep finished"
        );
        Ok(report)
    }

    /// Hard-delete rows soft-deleted longer ago than the retention period.
    pub async fn purge_deleted_attachments(&self) -> Result<u64, ServiceError> {
        self.purge_deleted_attachments_at(Utc::now()).await
    }

    pub async fn purge_deleted_attachments_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, ServiceError> {
        let retention = chrono::Duration::from_std(self.config.retention)
            .map_err(|e| ServiceError::Internal(format!("retention: {e}")))?;
        let purged = self
            .db
            .purge_attachments_deleted_before(now - retention)
            .await?;
        info!(purged, "purged soft-deleted attachments");
        Ok(purged)
    }
}
