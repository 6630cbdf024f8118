//! Client-facing views of attachments. Everything here is a pure function of
//! its inputs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use filedock_core::attachment::{format_file_size, Attachment, AttachmentCategory, AttachmentStats};
use filedock_core::task::{Status, Task};
use filedock_core::user::User;

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub file_name: String,
    pub original_file_name: String,
    pub file_size: i64,
    pub formatted_file_size: String,
    pub content_type: String,
    pub download_url: String,
    pub url_expires_at: DateTime<Utc>,
    pub url_expired: bool,
    pub is_image: bool,
    pub is_document: bool,
    pub is_archive: bool,
    pub task: TaskSummary,
    pub uploaded_by: UserSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentSummary {
    pub id: String,
    pub task_id: String,
    pub file_name: String,
    pub original_file_name: String,
    pub file_size: i64,
    pub formatted_file_size: String,
    pub content_type: String,
    pub download_url: String,
    pub url_expired: bool,
    pub is_image: bool,
    pub is_document: bool,
    pub is_archive: bool,
    pub uploaded_by: UserSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentStatsResponse {
    pub total_count: i64,
    pub total_size: i64,
    pub formatted_total_size: String,
    pub image_count: i64,
    pub document_count: i64,
    pub archive_count: i64,
    pub other_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewData {
    pub id: String,
    pub file_name: String,
    pub original_file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub formatted_file_size: String,
    pub preview_type: String,
    pub previewable: bool,
    pub stream_url: String,
    pub download_url: String,
}

pub fn task_summary(task: &Task) -> TaskSummary {
    TaskSummary {
        id: task.id.clone(),
        title: task.title.clone(),
        status: task.status,
    }
}

pub fn user_summary(user: &User) -> UserSummary {
    UserSummary {
        id: user.id.clone(),
        username: user.username.clone(),
        display_name: user.display_name.clone(),
    }
}

pub fn to_response(
    attachment: &Attachment,
    task: &Task,
    uploader: &User,
    now: DateTime<Utc>,
) -> AttachmentResponse {
    let category = attachment.category();
    AttachmentResponse {
        id: attachment.id.clone(),
        file_name: attachment.file_name.clone(),
        original_file_name: attachment.original_file_name.clone(),
        file_size: attachment.file_size,
        formatted_file_size: format_file_size(attachment.file_size),
        content_type: attachment.content_type.clone(),
        download_url: attachment.presigned_url.clone(),
        url_expires_at: attachment.url_expires_at,
        url_expired: attachment.is_url_expired(now),
        is_image: category == AttachmentCategory::Image,
        is_document: category == AttachmentCategory::Document,
        is_archive: category == AttachmentCategory::Archive,
        task: task_summary(task),
        uploaded_by: user_summary(uploader),
        created_at: attachment.created_at,
    }
}

pub fn to_summary(attachment: &Attachment, uploader: &User, now: DateTime<Utc>) -> AttachmentSummary {
    let category = attachment.category();
    AttachmentSummary {
        id: attachment.id.clone(),
        task_id: attachment.task_id.clone(),
        file_name: attachment.file_name.clone(),
        original_file_name: attachment.original_file_name.clone(),
        file_size: attachment.file_size,
        formatted_file_size: format_file_size(attachment.file_size),
        content_type: attachment.content_type.clone(),
        download_url: attachment.presigned_url.clone(),
        url_expired: attachment.is_url_expired(now),
        is_image: category == AttachmentCategory::Image,
        is_document: category == AttachmentCategory::Document,
        is_archive: category == AttachmentCategory::Archive,
        uploaded_by: user_summary(uploader),
        created_at: attachment.created_at,
    }
}

pub fn to_stats(raw: &AttachmentStats) -> AttachmentStatsResponse {
    AttachmentStatsResponse {
        total_count: raw.total_count,
        total_size: raw.total_size,
        formatted_total_size: format_file_size(raw.total_size),
        image_count: raw.image_count,
        document_count: raw.document_count,
        archive_count: raw.archive_count,
        other_count: raw.other_count(),
    }
}

pub fn to_preview(attachment: &Attachment, preview_base_url: &str) -> PreviewData {
    let preview_type = attachment.preview_type();
    PreviewData {
        id: attachment.id.clone(),
        file_name: attachment.file_name.clone(),
        original_file_name: attachment.original_file_name.clone(),
        content_type: attachment.content_type.clone(),
        file_size: attachment.file_size,
        formatted_file_size: format_file_size(attachment.file_size),
        preview_type: preview_type.as_str().to_string(),
        previewable: preview_type.is_previewable(),
        stream_url: format!("{preview_base_url}/api/attachments/{}/stream", attachment.id),
        download_url: attachment.presigned_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn attachment(content_type: &str, size: i64, expires_at: DateTime<Utc>) -> Attachment {
        Attachment {
            id: "att-1".into(),
            task_id: "task-1".into(),
            uploaded_by: "user-1".into(),
            file_name: "report_1700000000000.pdf".into(),
            original_file_name: "report.pdf".into(),
            file_size: size,
            content_type: content_type.into(),
            storage_key: "tasks/task-1/attachments/o/report_1700000000000.pdf".into(),
            presigned_url: "https://files.example.com/report".into(),
            url_expires_at: expires_at,
            is_deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    fn task() -> Task {
        Task {
            id: "task-1".into(),
            project_id: "p".into(),
            title: "Ship it".into(),
            status: Status::InReview,
            assignee_id: None,
            creator_id: "user-1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user() -> User {
        User {
            id: "user-1".into(),
            username: "alice".into(),
            display_name: "Alice".into(),
            email: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn response_carries_flags_and_summaries() {
        let now = Utc::now();
        let att = attachment("application/pdf", 2048, now + Duration::hours(1));
        let resp = to_response(&att, &task(), &user(), now);

        assert_eq!(resp.formatted_file_size, "2.0 KB");
        assert!(resp.is_document);
        assert!(!resp.is_image);
        assert!(!resp.is_archive);
        assert!(!resp.url_expired);
        assert_eq!(resp.task.title, "Ship it");
        assert_eq!(resp.task.status, Status::InReview);
        assert_eq!(resp.uploaded_by.username, "alice");
        assert_eq!(resp.download_url, att.presigned_url);
    }

    #[test]
    fn summary_marks_expired_urls() {
        let now = Utc::now();
        let att = attachment("image/png", 10, now - Duration::seconds(1));
        let summary = to_summary(&att, &user(), now);
        assert!(summary.url_expired);
        assert!(summary.is_image);
        assert_eq!(summary.task_id, "task-1");

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("task").is_none());
    }

    #[test]
    fn stats_other_count_never_negative() {
        let stats = to_stats(&AttachmentStats {
            total_count: 3,
            total_size: 5_242_880,
            image_count: 2,
            document_count: 2,
            archive_count: 1,
        });
        assert_eq!(stats.other_count, 0);
        assert_eq!(stats.formatted_total_size, "5.0 MB");

        let stats = to_stats(&AttachmentStats {
            total_count: 10,
            total_size: 500,
            image_count: 2,
            document_count: 3,
            archive_count: 1,
        });
        assert_eq!(stats.other_count, 4);
    }

    #[test]
    fn preview_for_pdf() {
        let att = attachment("application/pdf", 500, Utc::now());
        let preview = to_preview(&att, "http://localhost:8080");
        assert_eq!(preview.preview_type, "pdf");
        assert!(preview.previewable);
        assert_eq!(preview.formatted_file_size, "500 B");
        assert_eq!(
            preview.stream_url,
            "http://localhost:8080/api/attachments/att-1/stream"
        );
    }

    #[test]
    fn preview_for_unknown_type() {
        let att = attachment("application/octet-stream", 1, Utc::now());
        let preview = to_preview(&att, "http://localhost:8080");
        assert_eq!(preview.preview_type, "unsupported");
        assert!(!preview.previewable);
    }
}
