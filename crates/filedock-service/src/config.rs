use std::time::Duration;

pub const DEFAULT_PREVIEW_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const HOUR: Duration = Duration::from_secs(3600);

/// Tunables for the attachment lifecycle.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Prefix for the `stream_url` handed out in preview data.
    pub preview_base_url: String,
    pub max_upload_bytes: usize,
    /// Lifetime of every minted presigned URL.
    pub url_ttl: Duration,
    /// The refresh sweep picks up URLs expiring within this window.
    pub refresh_window: Duration,
    /// How long soft-deleted rows are kept before the purge sweep removes them.
    pub retention: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            preview_base_url: DEFAULT_PREVIEW_BASE_URL.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            url_ttl: 24 * HOUR,
            refresh_window: 2 * HOUR,
            retention: 30 * 24 * HOUR,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `FILEDOCK_PREVIEW_BASE_URL` and
    /// `FILEDOCK_MAX_UPLOAD_BYTES`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("FILEDOCK_PREVIEW_BASE_URL") {
            config.preview_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(max) = std::env::var("FILEDOCK_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_upload_bytes = max;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.preview_base_url, "http://localhost:8080");
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.url_ttl.as_secs(), 86_400);
        assert_eq!(config.refresh_window.as_secs(), 7_200);
        assert_eq!(config.retention.as_secs(), 30 * 86_400);
    }

    #[test]
    fn from_env_overrides() {
        std::env::set_var("FILEDOCK_PREVIEW_BASE_URL", "https://app.example.com/");
        std::env::set_var("FILEDOCK_MAX_UPLOAD_BYTES", "1024");
        let config = ServiceConfig::from_env();
        std::env::remove_var("FILEDOCK_PREVIEW_BASE_URL");
        std::env::remove_var("FILEDOCK_MAX_UPLOAD_BYTES");

        assert_eq!(config.preview_base_url, "https://app.example.com");
        assert_eq!(config.max_upload_bytes, 1024);
    }
}
