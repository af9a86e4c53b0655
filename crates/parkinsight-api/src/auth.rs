//! Shared-secret authentication.
//!
//! When `auth.enabled` is `true`, every request except `/health` and
//! `/metrics` must carry the configured secret in the `auth.header` header
//! (`X-API-Key` by default). Missing or wrong keys are answered with 403.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::api_error;
use crate::state::AppState;

/// Paths reachable without a key.
const PUBLIC_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Compute the SHA-256 hex digest of a plaintext API key.
#[must_use]
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two digests without short-circuiting on the first difference.
fn digests_match(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Axum middleware that enforces the shared-secret header.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.auth.enabled || PUBLIC_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    let presented = req
        .headers()
        .get(state.config.auth.header.as_str())
        .and_then(|v| v.to_str().ok());

    let Some(key) = presented else {
        tracing::warn!(path = %req.uri().path(), "Request without API key");
        return api_error(
            StatusCode::FORBIDDEN,
            "auth_error",
            &format!("Missing {} header", state.config.auth.header),
        );
    };

    let authorized = state
        .api_key_hash
        .as_deref()
        .is_some_and(|expected| digests_match(&hash_api_key(key), expected));
    if !authorized {
        tracing::warn!(path = %req.uri().path(), "Request with invalid API key");
        return api_error(StatusCode::FORBIDDEN, "auth_error", "Invalid API key");
    }

    next.run(req).await
}
