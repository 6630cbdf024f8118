pub mod activity;
pub mod api_key;
pub mod attachment;
pub mod error;
pub mod pagination;
pub mod project;
pub mod task;
pub mod user;

pub use attachment::{Attachment, AttachmentCategory, AttachmentStats, PreviewType};
pub use error::FiledockError;
pub use pagination::Page;
pub use project::Project;
pub use task::{Status, Task};
pub use user::User;
