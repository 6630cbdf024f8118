use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use filedock_store::{ObjectStore, StoreError};
use serde::Deserialize;

use super::{error_body, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/files/{*key}", get(get_file))
}

#[derive(Debug, Deserialize)]
struct SignedQuery {
    expires: i64,
    signature: String,
}

/// Serve a local-store object behind a presigned link. The signature is the
/// only credential, so no bearer key is needed.
async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<SignedQuery>,
) -> Result<Response, ApiError> {
    let Some(store) = state.local_store.as_ref() else {
        return Err(error_body(
            StatusCode::NOT_FOUND,
            "local file serving is disabled",
        ));
    };

    if !store.verify_signature(&key, q.expires, &q.signature, Utc::now().timestamp()) {
        return Err(error_body(
            StatusCode::FORBIDDEN,
            "invalid or expired signature",
        ));
    }

    let data = store.get(&key).await.map_err(|e| match e {
        StoreError::NotFound(_) => error_body(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Internal(_) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    })?;

    let content_type = mime_guess::from_path(&key)
        .first_or_octet_stream()
        .to_string();
    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::from(data))
        .map_err(|e| error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
