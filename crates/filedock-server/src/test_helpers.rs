use std::sync::Arc;

use axum::Router;
use filedock_core::project::CreateProject;
use filedock_core::task::{CreateTask, Status};
use filedock_core::user::CreateUser;
use filedock_db::Database;
use filedock_service::ServiceConfig;
use filedock_store::StoreConfig;

use crate::routes::AppState;

/// A router over in-memory SQLite and a temp local store, with one project,
/// one task and three users who each hold an API key.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub task_id: String,
    /// Owns the project.
    pub owner_key: String,
    /// Member of the project.
    pub member_key: String,
    /// No relation to the project.
    pub outsider_key: String,
    _dir: tempfile::TempDir,
}

pub async fn test_app() -> TestApp {
    test_app_with_config(ServiceConfig::default()).await
}

pub async fn test_app_with_config(service_config: ServiceConfig) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db: Arc<dyn Database> = Arc::new(filedock_db::SqliteDatabase::open_in_memory().unwrap());

    let mut store_config = StoreConfig::local(dir.path().to_string_lossy().to_string());
    store_config.signing_secret = Some("test-secret".into());
    let state = crate::build_state(db.clone(), &store_config, service_config).unwrap();

    let owner = add_user(&db, "owner").await;
    let member = add_user(&db, "member").await;
    let outsider = add_user(&db, "outsider").await;
    let project = db
        .create_project(&CreateProject {
            name: "Docs".into(),
            owner_id: owner.clone(),
        })
        .await
        .unwrap();
    db.add_project_member(&project.id, &member).await.unwrap();
    let task = db
        .create_task(&CreateTask {
            project_id: project.id,
            title: "Write handbook".into(),
            status: Status::InProgress,
            assignee_id: None,
            creator_id: owner.clone(),
        })
        .await
        .unwrap();

    TestApp {
        router: crate::routes::build_router(state.clone()),
        state,
        task_id: task.id,
        owner_key: add_key(&db, &owner).await,
        member_key: add_key(&db, &member).await,
        outsider_key: add_key(&db, &outsider).await,
        _dir: dir,
    }
}

async fn add_user(db: &Arc<dyn Database>, username: &str) -> String {
    db.create_user(&CreateUser {
        username: username.into(),
        display_name: username.into(),
        email: format!("{username}@example.com"),
    })
    .await
    .unwrap()
    .id
}

async fn add_key(db: &Arc<dyn Database>, user_id: &str) -> String {
    let raw = crate::auth::generate_api_key();
    db.insert_api_key(user_id, "test", &crate::auth::sha256_hex(&raw))
        .await
        .unwrap();
    raw
}
