//! ParkInsight HTTP API library interface.
//!
//! Exposes the router and state so that `main` and the integration tests
//! build exactly the same application.
//!
//! | route | handler |
//! |---|---|
//! | `GET /health` | [`api::health_handler`] (no key) |
//! | `GET /metrics` | [`metrics::metrics_handler`] (no key) |
//! | `GET /api/v1/` | [`api::root_handler`] |
//! | `POST /api/v1/predict` | [`api::predict_handler`] |
//! | `POST /api/v1/predict_all` | [`api::predict_all_handler`] |
//! | `GET /api/v1/models` | [`api::models_handler`] |
//! | `POST /api/v1/assess_clinical` | [`api::assess_clinical_handler`] |
//! | `POST /api/v1/analyze_voice` | [`voice::analyze_voice_handler`] |

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod request_log;
pub mod shutdown;
pub mod state;
pub mod voice;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub use state::{spawn_model_loading, AppState};

/// Build the axum [`Router`] with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/api/v1", get(api::root_handler))
        .route("/api/v1/", get(api::root_handler))
        .route("/api/v1/predict", post(api::predict_handler))
        .route("/api/v1/predict_all", post(api::predict_all_handler))
        .route("/api/v1/models", get(api::models_handler))
        .route("/api/v1/assess_clinical", post(api::assess_clinical_handler))
        .route("/api/v1/analyze_voice", post(voice::analyze_voice_handler))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::auth_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            request_log::request_log_middleware,
        ))
        .with_state(state)
}
