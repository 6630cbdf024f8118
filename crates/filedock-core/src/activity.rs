use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    FileUploaded,
    FileDownloaded,
    FileDeleted,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::FileUploaded => "file_uploaded",
            ActivityAction::FileDownloaded => "file_downloaded",
            ActivityAction::FileDeleted => "file_deleted",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "file_uploaded" => Some(ActivityAction::FileUploaded),
            "file_downloaded" => Some(ActivityAction::FileDownloaded),
            "file_deleted" => Some(ActivityAction::FileDeleted),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub action: ActivityAction,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivity {
    pub task_id: String,
    pub user_id: String,
    pub action: ActivityAction,
    #[serde(default)]
    pub details: String,
}
