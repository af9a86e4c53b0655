//! Shared application state and readiness.
//!
//! The prediction service is published exactly once, after the model
//! registry has finished loading on a blocking thread. Until then every
//! model-backed request fails fast with 503 instead of seeing a partial
//! registry.

use chrono::{DateTime, Utc};
use parkinsight_core::{ServiceConfig, ServiceError};
use parkinsight_models::{ModelRegistry, PredictionService};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::auth::hash_api_key;
use crate::metrics::Metrics;
use crate::shutdown::ShutdownCoordinator;

/// Shared application state passed to all handlers.
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,
    /// SHA-256 hex digest of the configured API key.
    pub api_key_hash: Option<String>,
    /// When the process started serving.
    pub started_at: DateTime<Utc>,
    /// Shutdown signal and in-flight request tracking.
    pub shutdown: ShutdownCoordinator,
    /// Prometheus collectors behind `/metrics`.
    pub metrics: Metrics,
    service: OnceCell<Arc<PredictionService>>,
}

impl AppState {
    /// State with no prediction service published yet.
    ///
    /// # Errors
    ///
    /// Fails if the metrics registry rejects a collector.
    pub fn new(config: ServiceConfig) -> prometheus::Result<Self> {
        let api_key_hash = config
            .auth
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(hash_api_key);
        let shutdown = ShutdownCoordinator::new(config.shutdown.timeout_seconds);
        Ok(Self {
            config,
            api_key_hash,
            started_at: Utc::now(),
            shutdown,
            metrics: Metrics::new()?,
            service: OnceCell::new(),
        })
    }

    /// Publish the prediction service with its inference latency wired into
    /// [`Metrics`]. Returns `false` if one was already set.
    pub fn publish(&self, service: PredictionService) -> bool {
        let service = service.with_inference_observer(Arc::new(self.metrics.clone()));
        self.service.set(Arc::new(service)).is_ok()
    }

    /// Whether the prediction service has been published.
    pub fn is_ready(&self) -> bool {
        self.service.initialized()
    }

    /// The published prediction service.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unavailable`] while models are still loading.
    pub fn service(&self) -> Result<Arc<PredictionService>, ServiceError> {
        self.service
            .get()
            .cloned()
            .ok_or_else(|| ServiceError::Unavailable("Models are still loading".to_string()))
    }
}

/// Load the registry on a blocking thread and publish the service when done.
pub fn spawn_model_loading(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = state.config.clone();
        let started = std::time::Instant::now();
        match tokio::task::spawn_blocking(move || ModelRegistry::load_all(&config)).await {
            Ok(registry) => {
                let service = PredictionService::new(Arc::new(registry), &state.config.fusion);
                if state.publish(service) {
                    tracing::info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Prediction service ready"
                    );
                } else {
                    tracing::warn!("Prediction service was already published");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Model loading task failed; service stays unavailable");
            }
        }
    })
}
