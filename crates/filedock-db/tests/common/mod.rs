// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so that the same logic
// can be exercised against both the SQLite and Postgres backends.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use filedock_core::activity::{ActivityAction, CreateActivity};
use filedock_core::attachment::CreateAttachment;
use filedock_core::pagination::PageRequest;
use filedock_core::project::CreateProject;
use filedock_core::task::{CreateTask, Status};
use filedock_core::user::CreateUser;
use filedock_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn make_user(db: &dyn Database, username: &str) -> String {
    db.create_user(&CreateUser {
        username: username.to_string(),
        display_name: String::new(),
        email: format!("{username}@example.com"),
    })
    .await
    .unwrap()
    .id
}

/// Owner, project and a task created by the owner. Returns (owner, project, task).
async fn seed_task(db: &dyn Database, owner: &str) -> (String, String, String) {
    let owner_id = make_user(db, owner).await;
    let project = db
        .create_project(&CreateProject {
            name: format!("{owner}-project"),
            owner_id: owner_id.clone(),
        })
        .await
        .unwrap();
    let task = db
        .create_task(&CreateTask {
            project_id: project.id.clone(),
            title: "Write report".into(),
            status: Status::Todo,
            assignee_id: None,
            creator_id: owner_id.clone(),
        })
        .await
        .unwrap();
    (owner_id, project.id, task.id)
}

fn make_attachment(task_id: &str, user_id: &str, name: &str, content_type: &str) -> CreateAttachment {
    CreateAttachment {
        task_id: task_id.to_string(),
        uploaded_by: user_id.to_string(),
        file_name: format!("{name}_1700000000000"),
        original_file_name: name.to_string(),
        file_size: 1024,
        content_type: content_type.to_string(),
        storage_key: format!("tasks/{task_id}/attachments/{name}"),
        presigned_url: format!("https://files.example.com/{name}"),
        url_expires_at: Utc::now() + ChronoDuration::hours(24),
    }
}

async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

// ---------------------------------------------------------------------------
// Users, projects, tasks
// ---------------------------------------------------------------------------

/// Users default their display name to the username.
pub async fn test_user_crud(db: &dyn Database) {
    let id = make_user(db, "alice").await;
    let user = db.get_user(&id).await.unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.display_name, "alice");
    assert_eq!(user.email, "alice@example.com");

    let missing = db.get_user("nope").await;
    assert!(matches!(missing, Err(DbError::NotFound(_))));
}

pub async fn test_project_and_task(db: &dyn Database) {
    let (owner, project_id, task_id) = seed_task(db, "owner").await;

    let project = db.get_project(&project_id).await.unwrap();
    assert_eq!(project.owner_id, owner);

    let task = db.get_task(&task_id).await.unwrap();
    assert_eq!(task.project_id, project_id);
    assert_eq!(task.status, Status::Todo);
    assert_eq!(task.creator_id, owner);
    assert!(task.assignee_id.is_none());

    assert!(matches!(
        db.get_task("missing").await,
        Err(DbError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Owner, member, creator and assignee see the task; outsiders do not.
pub async fn test_task_access(db: &dyn Database) {
    let owner = make_user(db, "owner").await;
    let member = make_user(db, "member").await;
    let creator = make_user(db, "creator").await;
    let assignee = make_user(db, "assignee").await;
    let outsider = make_user(db, "outsider").await;

    let project = db
        .create_project(&CreateProject {
            name: "Shared".into(),
            owner_id: owner.clone(),
        })
        .await
        .unwrap();
    db.add_project_member(&project.id, &member).await.unwrap();
    // Adding twice is a no-op.
    db.add_project_member(&project.id, &member).await.unwrap();

    let task = db
        .create_task(&CreateTask {
            project_id: project.id.clone(),
            title: "Access".into(),
            status: Status::InProgress,
            assignee_id: Some(assignee.clone()),
            creator_id: creator.clone(),
        })
        .await
        .unwrap();

    for user in [&owner, &member, &creator, &assignee] {
        assert!(db.has_task_access(user, &task.id).await.unwrap());
    }
    assert!(!db.has_task_access(&outsider, &task.id).await.unwrap());
    assert!(!db.has_task_access(&owner, "missing-task").await.unwrap());

    let att = db
        .create_attachment(&make_attachment(&task.id, &member, "notes.txt", "text/plain"))
        .await
        .unwrap();
    assert!(db.has_attachment_access(&assignee, &att.id).await.unwrap());
    assert!(!db.has_attachment_access(&outsider, &att.id).await.unwrap());

    db.soft_delete_attachment(&att.id, Utc::now()).await.unwrap();
    assert!(!db.has_attachment_access(&assignee, &att.id).await.unwrap());
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

pub async fn test_attachment_crud(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;
    let input = make_attachment(&task_id, &owner, "report.pdf", "application/pdf");

    let att = db.create_attachment(&input).await.unwrap();
    assert_eq!(att.task_id, task_id);
    assert_eq!(att.uploaded_by, owner);
    assert_eq!(att.original_file_name, "report.pdf");
    assert_eq!(att.file_size, 1024);
    assert_eq!(att.storage_key, input.storage_key);
    assert!(!att.is_deleted);
    assert!(att.deleted_at.is_none());

    let fetched = db.get_attachment(&att.id).await.unwrap();
    assert_eq!(fetched.id, att.id);
    assert_eq!(fetched.presigned_url, input.presigned_url);

    assert!(matches!(
        db.get_attachment("missing").await,
        Err(DbError::NotFound(_))
    ));
}

/// Storage keys are unique across attachments.
pub async fn test_storage_key_unique(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;
    let input = make_attachment(&task_id, &owner, "a.txt", "text/plain");
    db.create_attachment(&input).await.unwrap();
    assert!(db.create_attachment(&input).await.is_err());
}

/// Task listings are newest first and exclude soft-deleted rows.
pub async fn test_list_task_attachments(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;

    let first = db
        .create_attachment(&make_attachment(&task_id, &owner, "first.txt", "text/plain"))
        .await
        .unwrap();
    tick().await;
    let second = db
        .create_attachment(&make_attachment(&task_id, &owner, "second.txt", "text/plain"))
        .await
        .unwrap();
    tick().await;
    let third = db
        .create_attachment(&make_attachment(&task_id, &owner, "third.txt", "text/plain"))
        .await
        .unwrap();

    let list = db.list_task_attachments(&task_id).await.unwrap();
    let ids: Vec<_> = list.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);

    db.soft_delete_attachment(&second.id, Utc::now()).await.unwrap();
    let list = db.list_task_attachments(&task_id).await.unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|a| a.id != second.id));

    assert!(db.list_task_attachments("other").await.unwrap().is_empty());
}

pub async fn test_list_user_attachments_paged(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;
    let other = make_user(db, "other").await;

    for i in 0..5 {
        db.create_attachment(&make_attachment(
            &task_id,
            &owner,
            &format!("file{i}.txt"),
            "text/plain",
        ))
        .await
        .unwrap();
        tick().await;
    }
    db.create_attachment(&make_attachment(&task_id, &other, "theirs.txt", "text/plain"))
        .await
        .unwrap();

    let page1 = db
        .list_user_attachments(&owner, PageRequest::new(Some(1), Some(2)))
        .await
        .unwrap();
    assert_eq!(page1.total, 5);
    assert_eq!(page1.total_pages, 3);
    assert_eq!(page1.items.len(), 2);
    assert_eq!(page1.items[0].original_file_name, "file4.txt");
    assert_eq!(page1.items[1].original_file_name, "file3.txt");

    let page3 = db
        .list_user_attachments(&owner, PageRequest::new(Some(3), Some(2)))
        .await
        .unwrap();
    assert_eq!(page3.items.len(), 1);
    assert_eq!(page3.items[0].original_file_name, "file0.txt");

    let beyond = db
        .list_user_attachments(&owner, PageRequest::new(Some(9), Some(2)))
        .await
        .unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 5);
}

/// Search matches file name or content type, case-insensitively.
pub async fn test_search_task_attachments(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;
    db.create_attachment(&make_attachment(&task_id, &owner, "Quarterly Report.pdf", "application/pdf"))
        .await
        .unwrap();
    db.create_attachment(&make_attachment(&task_id, &owner, "diagram.png", "image/png"))
        .await
        .unwrap();
    let deleted = db
        .create_attachment(&make_attachment(&task_id, &owner, "report-old.pdf", "application/pdf"))
        .await
        .unwrap();
    db.soft_delete_attachment(&deleted.id, Utc::now()).await.unwrap();

    let by_name = db.search_task_attachments(&task_id, "REPORT").await.unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].original_file_name, "Quarterly Report.pdf");

    let by_type = db.search_task_attachments(&task_id, "image").await.unwrap();
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type[0].original_file_name, "diagram.png");

    // LIKE wildcards in the query are matched literally.
    assert!(db.search_task_attachments(&task_id, "%").await.unwrap().is_empty());
    assert!(db.search_task_attachments(&task_id, "zip").await.unwrap().is_empty());
}

pub async fn test_update_attachment_url(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;
    let att = db
        .create_attachment(&make_attachment(&task_id, &owner, "a.txt", "text/plain"))
        .await
        .unwrap();

    let expires = Utc::now() + ChronoDuration::hours(48);
    db.update_attachment_url(&att.id, "https://files.example.com/new", expires)
        .await
        .unwrap();

    let fetched = db.get_attachment(&att.id).await.unwrap();
    assert_eq!(fetched.presigned_url, "https://files.example.com/new");
    assert_eq!(fetched.storage_key, att.storage_key);
    assert!((fetched.url_expires_at - expires).num_milliseconds().abs() < 1);

    assert!(matches!(
        db.update_attachment_url("missing", "x", expires).await,
        Err(DbError::NotFound(_))
    ));

    db.soft_delete_attachment(&att.id, Utc::now()).await.unwrap();
    assert!(matches!(
        db.update_attachment_url(&att.id, "y", expires).await,
        Err(DbError::NotFound(_))
    ));
}

/// A second soft delete reports NotFound; the row stays until purged.
pub async fn test_soft_delete(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;
    let att = db
        .create_attachment(&make_attachment(&task_id, &owner, "a.txt", "text/plain"))
        .await
        .unwrap();

    let deleted = db.soft_delete_attachment(&att.id, Utc::now()).await.unwrap();
    assert!(deleted.is_deleted);
    assert!(deleted.deleted_at.is_some());

    assert!(matches!(
        db.get_attachment(&att.id).await,
        Err(DbError::NotFound(_))
    ));
    assert!(matches!(
        db.soft_delete_attachment(&att.id, Utc::now()).await,
        Err(DbError::NotFound(_))
    ));
}

pub async fn test_find_expiring(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;
    let now = Utc::now();

    let mut soon = make_attachment(&task_id, &owner, "soon.txt", "text/plain");
    soon.url_expires_at = now + ChronoDuration::minutes(30);
    let soon = db.create_attachment(&soon).await.unwrap();

    let mut expired = make_attachment(&task_id, &owner, "expired.txt", "text/plain");
    expired.url_expires_at = now - ChronoDuration::minutes(5);
    let expired = db.create_attachment(&expired).await.unwrap();

    let mut later = make_attachment(&task_id, &owner, "later.txt", "text/plain");
    later.url_expires_at = now + ChronoDuration::hours(5);
    db.create_attachment(&later).await.unwrap();

    let mut gone = make_attachment(&task_id, &owner, "gone.txt", "text/plain");
    gone.url_expires_at = now + ChronoDuration::minutes(10);
    let gone = db.create_attachment(&gone).await.unwrap();
    db.soft_delete_attachment(&gone.id, now).await.unwrap();

    let found = db
        .find_attachments_expiring_before(now + ChronoDuration::hours(1))
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![expired.id.as_str(), soon.id.as_str()]);
}

/// Only rows soft-deleted before the cutoff are removed.
pub async fn test_purge_deleted(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;
    let now = Utc::now();

    let old = db
        .create_attachment(&make_attachment(&task_id, &owner, "old.txt", "text/plain"))
        .await
        .unwrap();
    db.soft_delete_attachment(&old.id, now - ChronoDuration::days(31))
        .await
        .unwrap();

    let recent = db
        .create_attachment(&make_attachment(&task_id, &owner, "recent.txt", "text/plain"))
        .await
        .unwrap();
    db.soft_delete_attachment(&recent.id, now - ChronoDuration::days(29))
        .await
        .unwrap();

    let live = db
        .create_attachment(&make_attachment(&task_id, &owner, "live.txt", "text/plain"))
        .await
        .unwrap();

    let purged = db
        .purge_attachments_deleted_before(now - ChronoDuration::days(30))
        .await
        .unwrap();
    assert_eq!(purged, 1);

    // The recent soft delete is still pending; purging again is a no-op.
    let purged = db
        .purge_attachments_deleted_before(now - ChronoDuration::days(30))
        .await
        .unwrap();
    assert_eq!(purged, 0);

    assert!(db.get_attachment(&live.id).await.is_ok());
    let remaining = db.purge_attachments_deleted_before(now).await.unwrap();
    assert_eq!(remaining, 1);
}

pub async fn test_attachment_stats(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;

    let empty = db.task_attachment_stats(&task_id).await.unwrap();
    assert_eq!(empty.total_count, 0);
    assert_eq!(empty.total_size, 0);

    let mut png = make_attachment(&task_id, &owner, "a.png", "image/png");
    png.file_size = 100;
    db.create_attachment(&png).await.unwrap();
    let mut pdf = make_attachment(&task_id, &owner, "b.pdf", "application/pdf");
    pdf.file_size = 200;
    db.create_attachment(&pdf).await.unwrap();
    let mut zip = make_attachment(&task_id, &owner, "c.zip", "application/zip");
    zip.file_size = 300;
    db.create_attachment(&zip).await.unwrap();
    let mut bin = make_attachment(&task_id, &owner, "d.bin", "application/octet-stream");
    bin.file_size = 400;
    db.create_attachment(&bin).await.unwrap();
    let mut deleted = make_attachment(&task_id, &owner, "e.png", "image/png");
    deleted.file_size = 999;
    let deleted = db.create_attachment(&deleted).await.unwrap();
    db.soft_delete_attachment(&deleted.id, Utc::now()).await.unwrap();

    let stats = db.task_attachment_stats(&task_id).await.unwrap();
    assert_eq!(stats.total_count, 4);
    assert_eq!(stats.total_size, 1000);
    assert_eq!(stats.image_count, 1);
    assert_eq!(stats.document_count, 1);
    assert_eq!(stats.archive_count, 1);
    assert_eq!(stats.other_count(), 1);

    let user_stats = db.user_attachment_stats(&owner).await.unwrap();
    assert_eq!(user_stats.total_count, 4);
    assert_eq!(user_stats.total_size, 1000);
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

pub async fn test_activity_log(db: &dyn Database) {
    let (owner, _, task_id) = seed_task(db, "owner").await;

    db.record_activity(&CreateActivity {
        task_id: task_id.clone(),
        user_id: owner.clone(),
        action: ActivityAction::FileUploaded,
        details: "report.pdf".into(),
    })
    .await
    .unwrap();
    db.record_activity(&CreateActivity {
        task_id: task_id.clone(),
        user_id: owner.clone(),
        action: ActivityAction::FileDeleted,
        details: "report.pdf".into(),
    })
    .await
    .unwrap();

    let entries = db.list_task_activity(&task_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, ActivityAction::FileUploaded);
    assert_eq!(entries[1].action, ActivityAction::FileDeleted);
    assert_eq!(entries[0].details, "report.pdf");
}

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

pub async fn test_api_keys(db: &dyn Database) {
    let user = make_user(db, "keyholder").await;
    let key = db.insert_api_key(&user, "laptop", "abc123").await.unwrap();
    assert_eq!(key.user_id, user);
    assert!(key.last_used_at.is_none());

    let found = db.find_api_key_by_hash("abc123").await.unwrap().unwrap();
    assert_eq!(found.id, key.id);
    assert!(db.find_api_key_by_hash("nope").await.unwrap().is_none());

    db.touch_api_key(&key.id).await.unwrap();
    let touched = db.find_api_key_by_hash("abc123").await.unwrap().unwrap();
    assert!(touched.last_used_at.is_some());

    assert_eq!(db.list_api_keys().await.unwrap().len(), 1);
    db.delete_api_key(&key.id).await.unwrap();
    assert!(db.list_api_keys().await.unwrap().is_empty());
    assert!(matches!(
        db.delete_api_key(&key.id).await,
        Err(DbError::NotFound(_))
    ));
}
