pub mod activity;
pub mod api_keys;
pub mod attachments;
pub mod projects;
pub mod tasks;
pub mod users;
