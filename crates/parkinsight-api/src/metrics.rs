//! Prometheus metrics.
//!
//! [`Metrics`] owns a private registry with the HTTP request counters and
//! the per-model inference histogram. `GET /metrics` renders it in the text
//! exposition format and, like `/health`, needs no API key.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use parkinsight_models::InferenceObserver;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

/// Label used for requests that matched no route.
pub const UNMATCHED_PATH: &str = "unmatched";

/// All collectors exported at `/metrics`.
#[derive(Clone)]
pub struct Metrics {
    /// Kept private so tests do not share the process-wide default registry.
    registry: Registry,

    /// Requests served, labelled by route and status code.
    pub requests_total: IntCounterVec,

    /// Request latency in seconds, labelled by route and status code.
    pub request_duration_seconds: HistogramVec,

    /// Single-model inference latency in seconds, labelled by model name.
    pub inference_duration_seconds: HistogramVec,
}

impl Metrics {
    /// Create and register every collector.
    ///
    /// # Errors
    ///
    /// Returns the registry error if a collector is rejected.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("parkinsight_requests_total", "Total HTTP requests served"),
            &["path", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "parkinsight_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["path", "status"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let inference_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "parkinsight_inference_duration_seconds",
                "Per-model inference latency in seconds",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5]),
            &["model"],
        )?;
        registry.register(Box::new(inference_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
            inference_duration_seconds,
        })
    }

    /// Render the registry in Prometheus text format.
    pub fn gather_text(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Count one finished request.
    ///
    /// `path` should be the matched route template, not the raw URI, so the
    /// label set stays bounded.
    pub fn record_request(&self, path: &str, status: u16, duration: Duration) {
        let status = status.to_string();
        self.requests_total
            .with_label_values(&[path, &status])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[path, &status])
            .observe(duration.as_secs_f64());
    }
}

impl InferenceObserver for Metrics {
    fn observe(&self, model: &str, duration: Duration) {
        self.inference_duration_seconds
            .with_label_values(&[model])
            .observe(duration.as_secs_f64());
    }
}

/// `GET /metrics`: Prometheus scrape endpoint.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.gather_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {e}"),
            )
                .into_response()
        }
    }
}
