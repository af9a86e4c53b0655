//! Core types, configuration, and errors for ParkInsight
//!
//! This crate contains the foundational types shared across all ParkInsight
//! components: the fixed 22-feature model schema, the request/response shapes
//! exchanged with clients, service configuration, and the error taxonomy the
//! HTTP layer maps onto status codes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Model feature schema
// ---------------------------------------------------------------------------

/// Number of features every classifier was trained on.
pub const SCHEMA_LEN: usize = 22;

/// Schema feature names, in the column order the classifiers expect.
pub const SCHEMA_FEATURES: [&str; SCHEMA_LEN] = [
    "MDVP:Fo(Hz)",
    "MDVP:Fhi(Hz)",
    "MDVP:Flo(Hz)",
    "MDVP:Jitter(%)",
    "MDVP:Jitter(Abs)",
    "MDVP:RAP",
    "MDVP:PPQ",
    "Jitter:DDP",
    "MDVP:Shimmer",
    "MDVP:Shimmer(dB)",
    "Shimmer:APQ3",
    "Shimmer:APQ5",
    "MDVP:APQ",
    "Shimmer:DDA",
    "NHR",
    "HNR",
    "RPDE",
    "DFA",
    "spread1",
    "spread2",
    "D2",
    "PPE",
];

/// Position of a schema feature, or `None` for names outside the schema.
#[must_use]
pub fn schema_index(name: &str) -> Option<usize> {
    SCHEMA_FEATURES.iter().position(|f| *f == name)
}

/// A complete, ordered set of schema feature values.
///
/// Addressable both by position (for model input) and by schema name (for
/// responses and feature-importance maps). A `FeatureVector` always holds a
/// value for every schema feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; SCHEMA_LEN],
}

impl FeatureVector {
    /// Build a vector from values already in schema order.
    #[must_use]
    pub fn from_values(values: [f64; SCHEMA_LEN]) -> Self {
        Self { values }
    }

    /// All-zero vector.
    #[must_use]
    pub fn zeros() -> Self {
        Self {
            values: [0.0; SCHEMA_LEN],
        }
    }

    /// Look up a value by schema name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        schema_index(name).map(|i| self.values[i])
    }

    /// Set a value by schema name. Returns `false` if the name is not in the schema.
    pub fn set(&mut self, name: &str, value: f64) -> bool {
        match schema_index(name) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Values in schema order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Iterate `(schema_name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        SCHEMA_FEATURES.iter().copied().zip(self.values.iter().copied())
    }

    /// Name-keyed copy of the vector.
    #[must_use]
    pub fn to_named_map(&self) -> BTreeMap<String, f64> {
        self.iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

/// Pair a per-feature weight vector with schema names.
///
/// Extra trailing weights are ignored; missing ones are omitted.
#[must_use]
pub fn named_weights(weights: &[f64]) -> BTreeMap<String, f64> {
    SCHEMA_FEATURES
        .iter()
        .zip(weights.iter())
        .map(|(name, w)| (name.to_string(), *w))
        .collect()
}

// ---------------------------------------------------------------------------
// Client-facing request types
// ---------------------------------------------------------------------------

/// The 13 acoustic features clients submit (and the voice extractor returns),
/// under their short client-facing names.
///
/// Any further known aliases (e.g. `mdvpJitterAbs`) may be supplied through
/// `extra`; whether they are recognised is decided by the feature mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceFeatures {
    /// Average vocal fundamental frequency (Hz).
    pub mdvp_fo: f64,
    /// Maximum vocal fundamental frequency (Hz).
    pub mdvp_fhi: f64,
    /// Minimum vocal fundamental frequency (Hz).
    pub mdvp_flo: f64,
    /// Jitter (%).
    pub mdvp_jitter: f64,
    /// Shimmer.
    pub mdvp_shimmer: f64,
    /// Noise-to-harmonics ratio.
    pub nhr: f64,
    /// Harmonics-to-noise power ratio.
    pub hnr: f64,
    /// Recurrence period density entropy.
    pub rpde: f64,
    /// Detrended fluctuation analysis exponent.
    pub dfa: f64,
    /// Nonlinear F0 variation measure 1.
    pub spread1: f64,
    /// Nonlinear F0 variation measure 2.
    pub spread2: f64,
    /// Correlation dimension.
    pub d2: f64,
    /// Pitch period entropy.
    pub ppe: f64,
    /// Additional client-named features.
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, f64>,
}

impl VoiceFeatures {
    /// Flatten into a client-name keyed map (the mapper's input shape).
    #[must_use]
    pub fn to_alias_map(&self) -> BTreeMap<String, f64> {
        let mut map = self.extra.clone();
        for (name, value) in [
            ("mdvpFo", self.mdvp_fo),
            ("mdvpFhi", self.mdvp_fhi),
            ("mdvpFlo", self.mdvp_flo),
            ("mdvpJitter", self.mdvp_jitter),
            ("mdvpShimmer", self.mdvp_shimmer),
            ("nhr", self.nhr),
            ("hnr", self.hnr),
            ("rpde", self.rpde),
            ("dfa", self.dfa),
            ("spread1", self.spread1),
            ("spread2", self.spread2),
            ("d2", self.d2),
            ("ppe", self.ppe),
        ] {
            map.insert(name.to_string(), value);
        }
        map
    }
}

/// Body of `POST /predict` and `POST /predict_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Voice features to classify.
    pub features: VoiceFeatures,
}

/// Clinical symptom checklist plus age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalSymptoms {
    /// Resting tremor.
    pub tremor: bool,
    /// Muscle rigidity.
    pub rigidity: bool,
    /// Slowness of movement.
    pub bradykinesia: bool,
    /// Impaired balance.
    pub postural_instability: bool,
    /// Softer or monotone speech.
    pub voice_changes: bool,
    /// Smaller, cramped handwriting.
    pub handwriting: bool,
    /// Age in years.
    pub age: u32,
}

/// Body of `POST /assess_clinical`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalAssessmentRequest {
    /// Symptom checklist.
    pub clinical_symptoms: ClinicalSymptoms,
    /// Optional voice features to fuse with the clinical score.
    #[serde(default)]
    pub voice_features: Option<VoiceFeatures>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One classifier's output for a single feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    /// Binary label (1 = positive class).
    pub prediction: u8,
    /// Probability of the positive class.
    pub probability: f64,
    /// Probability of the predicted class.
    pub confidence: f64,
    /// `probability * 100`.
    pub risk_score: f64,
    /// Per-feature importance, when the model exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<BTreeMap<String, f64>>,
}

impl ModelPrediction {
    /// Build a prediction from a positive-class probability using a 0.5 cut.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        Self {
            prediction: u8::from(probability > 0.5),
            probability,
            confidence: probability.max(1.0 - probability),
            risk_score: probability * 100.0,
            feature_importance: None,
        }
    }

    /// Attach a feature-importance map.
    #[must_use]
    pub fn with_feature_importance(mut self, importance: Option<BTreeMap<String, f64>>) -> Self {
        self.feature_importance = importance;
        self
    }
}

/// Fused clinical + voice risk output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Binary label (1 = elevated risk).
    pub prediction: u8,
    /// Combined probability in `[0, 1]`.
    pub probability: f64,
    /// Combined risk in `[0, 100]`.
    pub risk_score: f64,
    /// `clinical_assessment` or `<model>_with_clinical`.
    pub model_used: String,
    /// Feature importance of the voice model, when one contributed.
    pub feature_importance: Option<BTreeMap<String, f64>>,
    /// Whether voice evidence was actually used.
    pub has_voice_data: bool,
}

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Top-level service configuration.
///
/// Every field has a default so a partial YAML file is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address and port to bind the HTTP server to.
    pub listen_addr: String,
    /// Directory holding model and scaler artifacts.
    pub model_dir: String,
    /// Scaler artifact file name inside `model_dir`.
    pub scaler_file: String,
    /// Classifier artifacts to load, in registry order.
    pub models: Vec<ModelFileConfig>,
    /// Maximum accepted upload size for `analyze_voice`.
    pub max_upload_bytes: usize,
    /// Longest stretch of decoded audio `analyze_voice` will analyse.
    pub max_audio_seconds: u32,
    /// Shared-secret authentication.
    pub auth: AuthConfig,
    /// Clinical/voice fusion settings.
    pub fusion: FusionConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Graceful shutdown configuration.
    pub shutdown: ShutdownConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            model_dir: "model".to_string(),
            scaler_file: "scaler.json".to_string(),
            models: default_model_files(),
            max_upload_bytes: 25 * 1024 * 1024, // 25MB
            max_audio_seconds: 60,
            auth: AuthConfig::default(),
            fusion: FusionConfig::default(),
            logging: LoggingConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.auth.enabled && self.auth.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ServiceError::Config(
                "auth.enabled is true but no auth.api_key is configured".to_string(),
            ));
        }
        if self.max_audio_seconds == 0 {
            return Err(ServiceError::Config(
                "max_audio_seconds must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fusion.voice_weight) {
            return Err(ServiceError::Config(format!(
                "fusion.voice_weight must be within [0, 1], got {}",
                self.fusion.voice_weight
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for entry in &self.models {
            if !seen.insert(entry.name.as_str()) {
                return Err(ServiceError::Config(format!(
                    "model '{}' is listed more than once",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}

/// A named classifier artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFileConfig {
    /// Registry name (`random_forest`, `ensemble`, ...).
    pub name: String,
    /// File name inside `model_dir`.
    pub file: String,
}

impl ModelFileConfig {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
        }
    }
}

fn default_model_files() -> Vec<ModelFileConfig> {
    [
        "ensemble",
        "random_forest",
        "svm",
        "neural_network",
        "extra_trees",
        "adaboost",
        "gradient_boosting",
    ]
    .iter()
    .map(|name| ModelFileConfig::new(*name, format!("{name}.json")))
    .collect()
}

/// Shared-secret header authentication.
///
/// # Example (YAML)
///
/// ```yaml
/// auth:
///   enabled: true
///   header: "x-api-key"
///   api_key: "change-me"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require the shared secret on every endpoint except `/health` and `/metrics`.
    pub enabled: bool,
    /// Header carrying the secret.
    pub header: String,
    /// The shared secret. Overridden by `PARKINSIGHT_API_KEY` when set.
    pub api_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header: "x-api-key".to_string(),
            api_key: None,
        }
    }
}

/// Clinical/voice fusion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Weight of the voice-model probability; the clinical score gets the rest.
    pub voice_weight: f64,
    /// Replace voice inference with the fixed 0.65 probability whenever voice
    /// features are present. Kept only for compatibility with old clients.
    pub legacy_voice_stub: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            voice_weight: 0.6,
            legacy_voice_stub: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` (human-readable) or `json` (structured).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Seconds to wait for in-flight requests after a shutdown signal.
    pub timeout_seconds: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Service error taxonomy.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    /// A required model or scaler is not loaded.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Malformed or out-of-schema client input.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Human-readable explanation.
        message: String,
        /// What the service expected.
        expected: String,
        /// What it received.
        received: String,
    },

    /// Model artifact could not be decoded or evaluated.
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else.
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl ServiceError {
    /// Shorthand for [`ServiceError::InvalidInput`].
    pub fn invalid_input(
        message: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            message: message.into(),
            expected: expected.into(),
            received: received.into(),
        }
    }
}

/// Convenience alias for `std::result::Result<T, ServiceError>`.
pub type Result<T> = std::result::Result<T, ServiceError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
