use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::routes::AppState;

/// The user an API key resolved to. Inserted as a request extension by
/// [`auth_middleware`] for every protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub key_id: String,
}

/// SHA-256 hash a raw key, returning the hex-encoded digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generate a new API key: `fd_` + 43 chars of base62.
pub fn generate_api_key() -> String {
    use rand::Rng;
    const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let random_part: String = (0..43)
        .map(|_| {
            let idx = rng.gen_range(0..BASE62.len());
            BASE62[idx] as char
        })
        .collect();
    format!("fd_{random_part}")
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "missing or invalid API key" })),
    )
        .into_response()
}

/// Require `Authorization: Bearer <key>` and resolve it to a user.
///
/// Keys are stored hashed, so the lookup is by digest. The stored digest is
/// compared again in constant time before the request is let through.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized();
    };
    let token_hash = sha256_hex(token);

    let api_key = match state.db.find_api_key_by_hash(&token_hash).await {
        Ok(Some(key)) if constant_time_eq(&key.key_hash, &token_hash) => key,
        Ok(_) => return unauthorized(),
        Err(e) => {
            warn!("api key lookup failed: {e}");
            return unauthorized();
        }
    };

    let db = state.db.clone();
    let key_id = api_key.id.clone();
    tokio::spawn(async move {
        if let Err(e) = db.touch_api_key(&key_id).await {
            debug!(key_id = %key_id, "failed to touch api key: {e}");
        }
    });

    request.extensions_mut().insert(AuthUser {
        user_id: api_key.user_id,
        key_id: api_key.id,
    });
    next.run(request).await
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(sha256_hex("a"), sha256_hex("a"));
    }

    #[test]
    fn generate_api_key_format() {
        let key = generate_api_key();
        assert!(key.starts_with("fd_"), "key should start with 'fd_': {key}");
        assert_eq!(key.len(), 46);
        assert!(key[3..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(key, generate_api_key());
    }

    #[test]
    fn constant_time_eq_cases() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("short", "longer-string"));
        assert!(constant_time_eq("", ""));
    }
}
