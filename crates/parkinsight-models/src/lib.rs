//! Feature mapping, classifiers, model registry, risk fusion, and prediction
//! orchestration for ParkInsight.
//!
//! # Pipeline
//!
//! ```text
//! client features ─▶ mapper ─▶ scaler ─▶ classifier(s) ─▶ importance ─▶ response
//!                                              │
//! clinical symptoms ─▶ clinical score ────────▶ fusion ─▶ risk assessment
//! ```
//!
//! The [`registry::ModelRegistry`] is built once at startup and injected into
//! [`service::PredictionService`]; nothing here holds global state.

pub mod classifier;
pub mod ensemble;
pub mod fusion;
pub mod inference_stats;
pub mod mapper;
pub mod mlp;
pub mod registry;
pub mod scaler;
pub mod service;
pub mod svm;
pub mod tree;

pub use classifier::{Capabilities, Classifier, ModelArtifact};
pub use fusion::{clinical_score, RiskFusion, VoiceSignal};
pub use inference_stats::{InferenceObserver, InferenceStatsTracker};
pub use mapper::{prepare_model_input, MappedFeatures};
pub use registry::{LoadSource, ModelRegistry, ModelStatus};
pub use scaler::StandardScaler;
pub use service::{MultiModelOutcome, PredictionOutcome, PredictionService};
