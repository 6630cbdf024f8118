use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FiledockError;

/// Longest base name (before the extension) kept by [`generate_secure_file_name`].
pub const MAX_BASE_NAME_LEN: usize = 50;

const IMAGE_PREVIEW_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

// PDF sits in the document set but gets its own preview bucket.
const TEXT_PREVIEW_TYPES: &[&str] = &[
    "text/plain",
    "text/csv",
    "application/json",
    "application/xml",
    "text/xml",
    "application/pdf",
];

const CODE_PREVIEW_TYPES: &[&str] = &[
    "text/javascript",
    "application/javascript",
    "text/css",
    "text/html",
];

pub const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "text/csv",
];

pub const ARCHIVE_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/x-rar-compressed",
    "application/vnd.rar",
    "application/x-7z-compressed",
    "application/x-tar",
    "application/gzip",
    "application/x-gzip",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub task_id: String,
    pub uploaded_by: String,
    pub file_name: String,
    pub original_file_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub storage_key: String,
    pub presigned_url: String,
    pub url_expires_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn is_url_expired(&self, now: DateTime<Utc>) -> bool {
        self.url_expires_at <= now
    }

    pub fn category(&self) -> AttachmentCategory {
        AttachmentCategory::from_content_type(&self.content_type)
    }

    pub fn preview_type(&self) -> PreviewType {
        PreviewType::from_content_type(&self.content_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttachment {
    pub task_id: String,
    pub uploaded_by: String,
    pub file_name: String,
    pub original_file_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub storage_key: String,
    pub presigned_url: String,
    pub url_expires_at: DateTime<Utc>,
}

/// Raw aggregate counts as returned by the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentStats {
    pub total_count: i64,
    pub total_size: i64,
    pub image_count: i64,
    pub document_count: i64,
    pub archive_count: i64,
}

impl AttachmentStats {
    pub fn other_count(&self) -> i64 {
        (self.total_count - self.image_count - self.document_count - self.archive_count).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentCategory {
    Image,
    Document,
    Archive,
    Other,
}

impl AttachmentCategory {
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = normalize_content_type(content_type);
        if ct.starts_with("image/") {
            AttachmentCategory::Image
        } else if DOCUMENT_TYPES.contains(&ct.as_str()) {
            AttachmentCategory::Document
        } else if ARCHIVE_TYPES.contains(&ct.as_str()) {
            AttachmentCategory::Archive
        } else {
            AttachmentCategory::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewType {
    Image,
    Pdf,
    Text,
    Code,
    Unsupported,
}

impl PreviewType {
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = normalize_content_type(content_type);
        let ct = ct.as_str();
        if IMAGE_PREVIEW_TYPES.contains(&ct) {
            PreviewType::Image
        } else if ct == "application/pdf" {
            PreviewType::Pdf
        } else if TEXT_PREVIEW_TYPES.contains(&ct) {
            PreviewType::Text
        } else if CODE_PREVIEW_TYPES.contains(&ct) {
            PreviewType::Code
        } else {
            PreviewType::Unsupported
        }
    }

    pub fn is_previewable(&self) -> bool {
        !matches!(self, PreviewType::Unsupported)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewType::Image => "image",
            PreviewType::Pdf => "pdf",
            PreviewType::Text => "text",
            PreviewType::Code => "code",
            PreviewType::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for PreviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase and drop parameters such as `; charset=utf-8`.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Build a storage-safe file name from a user supplied one.
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_`, the part before the
/// last dot is cut to [`MAX_BASE_NAME_LEN`] characters, and `_<millis>` is
/// inserted ahead of the extension so repeated uploads never collide.
pub fn generate_secure_file_name(original: &str, timestamp_millis: i64) -> String {
    let sanitized: String = original
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let (base, extension) = match sanitized.rfind('.') {
        Some(idx) if idx > 0 => sanitized.split_at(idx),
        _ => (sanitized.as_str(), ""),
    };

    let mut base: String = base.chars().take(MAX_BASE_NAME_LEN).collect();
    if base.is_empty() {
        base.push_str("file");
    }

    format!("{base}_{timestamp_millis}{extension}")
}

/// Reject uploads with no name, no content, or more than `max_bytes` of content.
pub fn validate_upload(file_name: &str, size: usize, max_bytes: usize) -> Result<(), FiledockError> {
    if file_name.trim().is_empty() {
        return Err(FiledockError::InvalidInput("file name is required".into()));
    }
    if size == 0 {
        return Err(FiledockError::InvalidInput("file is empty".into()));
    }
    if size > max_bytes {
        return Err(FiledockError::InvalidInput(format!(
            "file is {} but the limit is {}",
            format_file_size(size as i64),
            format_file_size(max_bytes as i64)
        )));
    }
    Ok(())
}

/// Human-readable size using binary units with one decimal place.
pub fn format_file_size(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let size = bytes as f64;
    if size < MB {
        format!("{:.1} KB", size / KB)
    } else if size < GB {
        format!("{:.1} MB", size / MB)
    } else {
        format!("{:.1} GB", size / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_upload_checks_name_and_size() {
        assert!(validate_upload("a.txt", 10, 100).is_ok());
        assert!(validate_upload("a.txt", 100, 100).is_ok());
        assert!(matches!(
            validate_upload("  ", 10, 100),
            Err(FiledockError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_upload("a.txt", 0, 100),
            Err(FiledockError::InvalidInput(_))
        ));
        let err = validate_upload("a.txt", 2048, 1024).unwrap_err();
        assert_eq!(err.to_string(), "invalid input: file is 2.0 KB but the limit is 1.0 KB");
    }

    #[test]
    fn secure_file_name_replaces_unsafe_chars() {
        let name = generate_secure_file_name("My File (1).PNG", 1_700_000_000_123);
        assert_eq!(name, "My_File__1__1700000000123.PNG");
    }

    #[test]
    fn secure_file_name_matches_expected_shape() {
        let name = generate_secure_file_name("My File (1).PNG", Utc::now().timestamp_millis());
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "PNG");
        let (base, millis) = stem.rsplit_once('_').unwrap();
        assert_eq!(base, "My_File__1_");
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert!(base.len() <= MAX_BASE_NAME_LEN);
    }

    #[test]
    fn secure_file_name_caps_base_length() {
        let original = format!("{}.txt", "a".repeat(120));
        let name = generate_secure_file_name(&original, 42);
        assert_eq!(name, format!("{}_42.txt", "a".repeat(MAX_BASE_NAME_LEN)));
    }

    #[test]
    fn secure_file_name_without_extension() {
        assert_eq!(generate_secure_file_name("README", 7), "README_7");
        assert_eq!(generate_secure_file_name(".env", 7), ".env_7");
        assert_eq!(generate_secure_file_name("", 7), "file_7");
    }

    #[test]
    fn secure_file_name_replaces_non_ascii() {
        assert_eq!(generate_secure_file_name("résumé.pdf", 1), "r_sum__1.pdf");
    }

    #[test]
    fn normalize_content_type_drops_parameters() {
        assert_eq!(normalize_content_type("Text/Plain; charset=UTF-8"), "text/plain");
        assert_eq!(normalize_content_type(" application/pdf "), "application/pdf");
        assert_eq!(normalize_content_type(""), "");
    }

    #[test]
    fn format_file_size_units() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(500), "500 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(5_242_880), "5.0 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn pdf_previews_as_pdf_not_text() {
        assert_eq!(PreviewType::from_content_type("application/pdf"), PreviewType::Pdf);
        assert_eq!(
            AttachmentCategory::from_content_type("application/pdf"),
            AttachmentCategory::Document
        );
    }

    #[test]
    fn preview_types_by_content_type() {
        assert_eq!(PreviewType::from_content_type("image/png"), PreviewType::Image);
        assert_eq!(PreviewType::from_content_type("image/svg+xml"), PreviewType::Image);
        assert_eq!(PreviewType::from_content_type("text/csv"), PreviewType::Text);
        assert_eq!(
            PreviewType::from_content_type("application/json; charset=utf-8"),
            PreviewType::Text
        );
        assert_eq!(PreviewType::from_content_type("text/css"), PreviewType::Code);
        assert_eq!(PreviewType::from_content_type("application/zip"), PreviewType::Unsupported);
        assert!(!PreviewType::Unsupported.is_previewable());
        assert!(PreviewType::Code.is_previewable());
    }

    #[test]
    fn categories_by_content_type() {
        assert_eq!(AttachmentCategory::from_content_type("image/bmp"), AttachmentCategory::Image);
        assert_eq!(
            AttachmentCategory::from_content_type("application/x-7z-compressed"),
            AttachmentCategory::Archive
        );
        assert_eq!(
            AttachmentCategory::from_content_type("video/mp4"),
            AttachmentCategory::Other
        );
    }

    #[test]
    fn other_count_is_remainder_and_never_negative() {
        let stats = AttachmentStats {
            total_count: 10,
            total_size: 1000,
            image_count: 3,
            document_count: 4,
            archive_count: 1,
        };
        assert_eq!(stats.other_count(), 2);

        let skewed = AttachmentStats {
            total_count: 1,
            image_count: 2,
            ..Default::default()
        };
        assert_eq!(skewed.other_count(), 0);
    }

    #[test]
    fn url_expiry_is_inclusive_of_now() {
        let now = Utc::now();
        let attachment = Attachment {
            id: "a".into(),
            task_id: "t".into(),
            uploaded_by: "u".into(),
            file_name: "f_1.txt".into(),
            original_file_name: "f.txt".into(),
            file_size: 1,
            content_type: "text/plain".into(),
            storage_key: "k".into(),
            presigned_url: "http://x".into(),
            url_expires_at: now,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
        };
        assert!(attachment.is_url_expired(now));
        assert!(!attachment.is_url_expired(now - chrono::Duration::seconds(1)));
    }
}
