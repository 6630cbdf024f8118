pub mod attachments;
pub mod files;
pub mod health;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware, Json, Router,
};
use filedock_db::Database;
use filedock_service::{AttachmentService, ServiceError};
use filedock_store::LocalStore;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;

pub struct InnerAppState {
    pub service: Arc<AttachmentService>,
    pub db: Arc<dyn Database>,
    /// Present when objects live on local disk and `/files` serves them.
    pub local_store: Option<Arc<LocalStore>>,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.service.config().max_upload_bytes;

    let public = Router::new()
        .merge(health::routes())
        .merge(files::routes());

    let protected = Router::new()
        .merge(attachments::routes(max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub(crate) type ApiError = (StatusCode, Json<Value>);

pub(crate) fn error_body(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": msg.into() })))
}

pub(crate) fn to_error(e: ServiceError) -> ApiError {
    let status = match &e {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::Storage(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_statuses() {
        let cases = [
            (ServiceError::NotFound("a".into()), StatusCode::NOT_FOUND),
            (ServiceError::Forbidden("a".into()), StatusCode::FORBIDDEN),
            (ServiceError::InvalidInput("a".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Storage("a".into()), StatusCode::BAD_GATEWAY),
            (
                ServiceError::Internal("a".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, Json(body)) = to_error(err);
            assert_eq!(status, expected);
            assert!(body["error"].as_str().unwrap().ends_with(": a"));
        }
    }
}
