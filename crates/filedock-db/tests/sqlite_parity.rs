// Runs the shared Database assertions in `common/mod.rs` against the
// in-memory SQLite backend.

mod common;

use std::sync::Arc;
use filedock_db::Database;

async fn make_db() -> Arc<dyn Database> {
    Arc::new(filedock_db::SqliteDatabase::open_in_memory().unwrap())
}

#[tokio::test]
async fn user_crud() {
    let db = make_db().await;
    common::test_user_crud(&*db).await;
}

#[tokio::test]
async fn project_and_task() {
    let db = make_db().await;
    common::test_project_and_task(&*db).await;
}

#[tokio::test]
async fn task_access() {
    let db = make_db().await;
    common::test_task_access(&*db).await;
}

#[tokio::test]
async fn attachment_crud() {
    let db = make_db().await;
    common::test_attachment_crud(&*db).await;
}

#[tokio::test]
async fn storage_key_unique() {
    let db = make_db().await;
    common::test_storage_key_unique(&*db).await;
}

#[tokio::test]
async fn list_task_attachments() {
    let db = make_db().await;
    common::test_list_task_attachments(&*db).await;
}

#[tokio::test]
async fn list_user_attachments_paged() {
    let db = make_db().await;
    common::test_list_user_attachments_paged(&*db).await;
}

#[tokio::test]
async fn search_task_attachments() {
    let db = make_db().await;
    common::test_search_task_attachments(&*db).await;
}

#[tokio::test]
async fn update_attachment_url() {
    let db = make_db().await;
    common::test_update_attachment_url(&*db).await;
}

#[tokio::test]
async fn soft_delete() {
    let db = make_db().await;
    common::test_soft_delete(&*db).await;
}

#[tokio::test]
async fn find_expiring() {
    let db = make_db().await;
    common::test_find_expiring(&*db).await;
}

#[tokio::test]
async fn purge_deleted() {
    let db = make_db().await;
    common::test_purge_deleted(&*db).await;
}

#[tokio::test]
async fn attachment_stats() {
    let db = make_db().await;
    common::test_attachment_stats(&*db).await;
}

#[tokio::test]
async fn activity_log() {
    let db = make_db().await;
    common::test_activity_log(&*db).await;
}

#[tokio::test]
async fn api_keys() {
    let db = make_db().await;
    common::test_api_keys(&*db).await;
}
