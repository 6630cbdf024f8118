use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Extension, Json, Router,
};
use filedock_service::{ServiceError, UploadFile, UploadResult};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error_body, to_error, ApiError, AppState};
use crate::auth::AuthUser;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/tasks/{task_id}/attachments",
            get(list_task_attachments)
                .post(upload_attachment)
                .layer(DefaultBodyLimit::max(
                    max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
                )),
        )
        .route(
            "/api/tasks/{task_id}/attachments/search",
            get(search_task_attachments),
        )
        .route("/api/tasks/{task_id}/attachments/stats", get(task_stats))
        .route("/api/attachments/mine", get(list_my_attachments))
        .route("/api/attachments/stats", get(my_stats))
        .route(
            "/api/attachments/{id}",
            get(get_attachment).delete(delete_attachment),
        )
        .route("/api/attachments/{id}/preview", get(get_preview))
        .route("/api/attachments/{id}/stream", get(stream_attachment))
        .route("/api/attachments/{id}/download-url", get(get_download_url))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    per_page: Option<u32>,
}

async fn upload_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
    mut multipart: Multipart,
) -> (StatusCode, Json<UploadResult>) {
    let file = match read_file_field(&mut multipart).await {
        Ok(file) => file,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(UploadResult::failed(&e))),
    };

    let result = state
        .service
        .upload_attachment(&task_id, file, &user.user_id)
        .await;
    let status = if result.success {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(result))
}

/// Pull the `file` part out of the form. Other parts are ignored.
async fn read_file_field(multipart: &mut Multipart) -> Result<UploadFile, ServiceError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return Err(ServiceError::InvalidInput(
                    "multipart field 'file' is required".into(),
                ))
            }
            Err(e) => return Err(ServiceError::InvalidInput(e.body_text())),
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let declared = field.content_type().map(String::from);
        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::InvalidInput(e.body_text()))?;

        let content_type = declared
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
            .or_else(|| {
                mime_guess::from_path(&file_name)
                    .first()
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        return Ok(UploadFile {
            file_name,
            content_type,
            data,
        });
    }
}

async fn list_task_attachments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .list_task_attachments(&task_id, &user.user_id)
        .await
        .map(|a| Json(json!(a)))
        .map_err(to_error)
}

async fn search_task_attachments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .search_task_attachments(&task_id, &q.q, &user.user_id)
        .await
        .map(|a| Json(json!(a)))
        .map_err(to_error)
}

async fn task_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .task_stats(&task_id, &user.user_id)
        .await
        .map(|s| Json(json!(s)))
        .map_err(to_error)
}

async fn list_my_attachments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .list_user_attachments(&user.user_id, q.page, q.per_page)
        .await
        .map(|p| Json(json!(p)))
        .map_err(to_error)
}

async fn my_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .user_stats(&user.user_id)
        .await
        .map(|s| Json(json!(s)))
        .map_err(to_error)
}

async fn get_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .get_attachment(&id, &user.user_id)
        .await
        .map(|a| Json(json!(a)))
        .map_err(to_error)
}

async fn get_preview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .get_preview_data(&id, &user.user_id)
        .await
        .map(|p| Json(json!(p)))
        .map_err(to_error)
}

async fn stream_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .service
        .stream_attachment(&id, &user.user_id)
        .await
        .map_err(to_error)?;

    let disposition = format!("inline; filename=\"{}\"", header_safe_name(&file.file_name));
    Response::builder()
        .header(header::CONTENT_TYPE, file.content_type)
        .header(header::CONTENT_LENGTH, file.data.len())
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(file.data))
        .map_err(|e| error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn get_download_url(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .get_download_url(&id, &user.user_id)
        .await
        .map(|url| Json(json!({ "url": url })))
        .map_err(to_error)
}

async fn delete_attachment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_attachment(&id, &user.user_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

/// Quoted-string safe filename for Content-Disposition.
fn header_safe_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
