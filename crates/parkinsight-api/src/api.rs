//! REST handlers for prediction, model status, and clinical assessment.
//!
//! Model work is CPU-bound and runs on the blocking pool; handlers only
//! validate, dispatch, and shape the response.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use parkinsight_core::{
    ClinicalAssessmentRequest, PredictionRequest, RiskAssessment, ServiceError, SCHEMA_FEATURES,
};
use parkinsight_models::inference_stats::LatencyStats;
use parkinsight_models::mapper::FEATURE_ALIASES;
use parkinsight_models::{LoadSource, ModelStatus, MultiModelOutcome, PredictionOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ApiFailure;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Any response body plus the time it was produced.
#[derive(Debug, Serialize)]
pub struct Timestamped<T: Serialize> {
    #[serde(flatten)]
    pub body: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> Timestamped<T> {
    pub fn now(body: T) -> Self {
        Self {
            body,
            timestamp: Utc::now(),
        }
    }
}

/// Body of `GET /api/v1/`.
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub ready: bool,
}

/// Scaler availability for `GET /api/v1/models`.
#[derive(Debug, Serialize)]
pub struct ScalerStatus {
    pub available: bool,
    pub source: LoadSource,
}

/// Body of `GET /api/v1/models`.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    /// Names of the models that can be invoked.
    pub available_models: Vec<String>,
    /// Every configured model with its load outcome.
    pub models: Vec<ModelStatus>,
    pub scaler: ScalerStatus,
    /// Model input schema, in order.
    pub features: Vec<&'static str>,
    pub feature_count: usize,
    /// Client-facing name of each schema feature.
    pub feature_aliases: BTreeMap<&'static str, &'static str>,
    /// Per-model inference latency.
    pub inference_latency: BTreeMap<String, LatencyStats>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Unwrap a JSON body, turning extractor rejections into 400s.
fn json_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiFailure> {
    payload.map(|Json(body)| body).map_err(ApiFailure::from)
}

/// Run CPU-bound work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiFailure>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ServiceError::Unexpected(format!("blocking task failed: {e}")))?
        .map_err(ApiFailure::from)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: liveness plus readiness; never requires a key.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let ready = state.is_ready();
    let models_available = state
        .service()
        .map(|s| s.registry().available_models().len())
        .unwrap_or(0);
    let body = serde_json::json!({
        "status": "healthy",
        "ready": ready,
        "models_available": models_available,
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// `GET /api/v1/`: welcome message.
pub async fn root_handler(State(state): State<Arc<AppState>>) -> Json<Timestamped<WelcomeResponse>> {
    Json(Timestamped::now(WelcomeResponse {
        message: "ParkInsight voice and clinical risk prediction API",
        version: env!("CARGO_PKG_VERSION"),
        ready: state.is_ready(),
    }))
}

/// `POST /api/v1/predict`: classify with the preferred model.
pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<Timestamped<PredictionOutcome>>, ApiFailure> {
    let service = state.service()?;
    let request = json_payload(payload)?;
    let outcome = run_blocking(move || service.predict(&request.features)).await?;
    tracing::info!(
        model = %outcome.model_used,
        prediction = outcome.prediction,
        probability = outcome.probability,
        "Prediction served"
    );
    Ok(Json(Timestamped::now(outcome)))
}

/// `POST /api/v1/predict_all`: classify with every available model.
pub async fn predict_all_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<Timestamped<MultiModelOutcome>>, ApiFailure> {
    let service = state.service()?;
    let request = json_payload(payload)?;
    let outcome = run_blocking(move || service.predict_all(&request.features)).await?;
    tracing::info!(
        models = outcome.models.len(),
        failed = outcome.failed_models.len(),
        consensus = outcome.summary.consensus_prediction,
        "Multi-model prediction served"
    );
    Ok(Json(Timestamped::now(outcome)))
}

/// `GET /api/v1/models`: registry status and input schema.
pub async fn models_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Timestamped<ModelsResponse>>, ApiFailure> {
    let service = state.service()?;
    let registry = service.registry();
    let response = ModelsResponse {
        available_models: registry
            .available_models()
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect(),
        models: registry.status(),
        scaler: ScalerStatus {
            available: registry.scaler().is_some(),
            source: registry.scaler_source(),
        },
        features: SCHEMA_FEATURES.to_vec(),
        feature_count: SCHEMA_FEATURES.len(),
        feature_aliases: FEATURE_ALIASES
            .iter()
            .map(|(alias, schema)| (*schema, *alias))
            .collect(),
        inference_latency: service.stats().snapshot(),
    };
    Ok(Json(Timestamped::now(response)))
}

/// `POST /api/v1/assess_clinical`: clinical score fused with optional voice evidence.
pub async fn assess_clinical_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClinicalAssessmentRequest>, JsonRejection>,
) -> Result<Json<Timestamped<RiskAssessment>>, ApiFailure> {
    let service = state.service()?;
    let request = json_payload(payload)?;
    let assessment = run_blocking(move || Ok(service.assess_clinical(&request))).await?;
    tracing::info!(
        model = %assessment.model_used,
        risk_score = assessment.risk_score,
        has_voice_data = assessment.has_voice_data,
        "Clinical assessment served"
    );
    Ok(Json(Timestamped::now(assessment)))
}
