//! Prediction orchestration: map -> select -> scale -> infer -> explain -> shape.
//!
//! [`PredictionService`] owns nothing mutable besides latency statistics; the
//! registry it receives is fully loaded and shared read-only.

use crate::classifier::Classifier;
use crate::ensemble::{self, EnsembleSummary};
use crate::fusion::{clinical_score, RiskFusion, VoiceSignal};
use crate::inference_stats::{InferenceObserver, InferenceStatsTracker};
use crate::mapper::{prepare_model_input, unknown_aliases};
use crate::registry::{ModelRegistry, ENSEMBLE_MODEL, RANDOM_FOREST_MODEL};
use parkinsight_core::{
    named_weights, ClinicalAssessmentRequest, FusionConfig, ModelPrediction, Result,
    RiskAssessment, ServiceError, VoiceFeatures, SCHEMA_FEATURES,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// `model_used` label for the voting ensemble.
pub const ENSEMBLE_MODEL_LABEL: &str = "ensemble_voting_classifier";

/// Response of the single-model prediction.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutcome {
    /// Binary label.
    pub prediction: u8,
    /// Positive-class probability.
    pub probability: f64,
    /// Probability of the predicted class.
    pub confidence: f64,
    /// `probability * 100`.
    pub risk_score: f64,
    /// `ensemble_voting_classifier` or `random_forest`.
    pub model_used: String,
    /// Schema-keyed importances, when any model exposes them.
    pub feature_importance: Option<BTreeMap<String, f64>>,
    /// Schema features that were not supplied and took a default.
    pub defaulted_features: Vec<&'static str>,
}

/// Response of the every-model prediction.
#[derive(Debug, Clone, Serialize)]
pub struct MultiModelOutcome {
    /// Per-model predictions for the models that succeeded.
    pub models: BTreeMap<String, ModelPrediction>,
    /// Unweighted average over `models`.
    pub ensemble: ModelPrediction,
    /// Agreement statistics over `models`.
    pub summary: EnsembleSummary,
    /// Kind of each model in `models`.
    pub model_kinds: BTreeMap<String, &'static str>,
    /// Schema-keyed importances, when any model exposes them.
    pub feature_importance: Option<BTreeMap<String, f64>>,
    /// Models that were loaded but failed on this input.
    pub failed_models: Vec<String>,
    /// Configured models that are not loaded.
    pub unavailable_models: Vec<String>,
    /// Schema order of the model input.
    pub features_used: Vec<&'static str>,
    /// Model input values, in `features_used` order.
    pub feature_values: Vec<f64>,
}

/// Request orchestrator over a loaded [`ModelRegistry`].
#[derive(Debug)]
pub struct PredictionService {
    registry: Arc<ModelRegistry>,
    fusion: RiskFusion,
    legacy_voice_stub: bool,
    stats: InferenceStatsTracker,
}

impl PredictionService {
    /// Build the service from a registry and fusion settings.
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>, fusion: &FusionConfig) -> Self {
        if fusion.legacy_voice_stub {
            tracing::warn!(
                "fusion.legacy_voice_stub is enabled: voice features in clinical assessments \
                 are replaced by a fixed probability of 0.65"
            );
        }
        Self {
            registry,
            fusion: RiskFusion::from_config(fusion),
            legacy_voice_stub: fusion.legacy_voice_stub,
            stats: InferenceStatsTracker::default(),
        }
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Per-model inference latency.
    #[must_use]
    pub fn stats(&self) -> &InferenceStatsTracker {
        &self.stats
    }

    /// Forward every inference duration to `observer` too.
    #[must_use]
    pub fn with_inference_observer(mut self, observer: Arc<dyn InferenceObserver>) -> Self {
        self.stats.add_observer(observer);
        self
    }

    /// Classify with the preferred model: the voting ensemble, else the random forest.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::InvalidInput`] for unknown feature names or non-finite values.
    /// - [`ServiceError::Unavailable`] when the scaler or both preferred models are missing.
    /// - [`ServiceError::Model`] if inference fails.
    pub fn predict(&self, features: &VoiceFeatures) -> Result<PredictionOutcome> {
        let external = validate_features(features)?;
        let scaler = self.require_scaler()?;
        let (name, model, label) = self.primary_model()?;

        let mapped = prepare_model_input(&external);
        let x = scaler.transform(&mapped.vector);
        let probability = self.timed_inference(name, &model, &x)?;
        let prediction = ModelPrediction::from_probability(probability);

        tracing::info!(
            model = label,
            prediction = prediction.prediction,
            probability = prediction.probability,
            defaulted = mapped.defaulted.len(),
            "Prediction completed"
        );

        Ok(PredictionOutcome {
            prediction: prediction.prediction,
            probability: prediction.probability,
            confidence: prediction.confidence,
            risk_score: prediction.risk_score,
            model_used: label.to_string(),
            feature_importance: self.feature_importance(&model),
            defaulted_features: mapped.defaulted,
        })
    }

    /// Run every available model and summarise their agreement.
    ///
    /// Models that fail are logged and excluded.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::InvalidInput`] for unknown feature names or non-finite values.
    /// - [`ServiceError::Unavailable`] when the scaler is missing or no model succeeds.
    pub fn predict_all(&self, features: &VoiceFeatures) -> Result<MultiModelOutcome> {
        let external = validate_features(features)?;
        let scaler = self.require_scaler()?;

        let mapped = prepare_model_input(&external);
        let x = scaler.transform(&mapped.vector);

        let mut models = BTreeMap::new();
        let mut model_kinds = BTreeMap::new();
        let mut failed_models = Vec::new();
        for (name, model) in self.registry.available_models() {
            match self.timed_inference(name, &model, &x) {
                Ok(p) => {
                    models.insert(name.to_string(), ModelPrediction::from_probability(p));
                    model_kinds.insert(name.to_string(), model.kind());
                }
                Err(e) => {
                    tracing::warn!(model = name, error = %e, "Model excluded from multi-model prediction");
                    failed_models.push(name.to_string());
                }
            }
        }

        let predictions: Vec<ModelPrediction> = models.values().cloned().collect();
        let (Some(ensemble), Some(summary)) = (
            ensemble::average_prediction(&predictions),
            ensemble::summarize(&predictions),
        ) else {
            return Err(ServiceError::Unavailable(
                "no model produced a prediction".to_string(),
            ));
        };

        let feature_importance = self
            .registry
            .get(RANDOM_FOREST_MODEL)
            .and_then(|rf| rf.feature_importances())
            .or_else(|| {
                self.registry
                    .available_models()
                    .iter()
                    .find_map(|(_, m)| m.feature_importances())
            })
            .map(|w| named_weights(&w));

        tracing::info!(
            total_models = summary.total_models,
            consensus = summary.consensus_prediction,
            average_probability = summary.average_probability,
            failed = failed_models.len(),
            "Multi-model prediction completed"
        );

        Ok(MultiModelOutcome {
            models,
            ensemble,
            summary,
            model_kinds,
            feature_importance,
            failed_models,
            unavailable_models: self
                .registry
                .missing_models()
                .into_iter()
                .map(String::from)
                .collect(),
            features_used: SCHEMA_FEATURES.to_vec(),
            feature_values: mapped.vector.as_slice().to_vec(),
        })
    }

    /// Clinical score fused with voice evidence when it can be obtained.
    ///
    /// Voice inference failures never fail the assessment: they are logged
    /// and the result falls back to the clinical score alone.
    #[must_use]
    pub fn assess_clinical(&self, request: &ClinicalAssessmentRequest) -> RiskAssessment {
        let score = clinical_score(&request.clinical_symptoms);

        let voice = match &request.voice_features {
            None => None,
            Some(_) if self.legacy_voice_stub => Some(VoiceSignal::legacy_stub()),
            Some(features) => match self.voice_signal(features) {
                Ok(signal) => Some(signal),
                Err(e) => {
                    tracing::warn!(error = %e, "Voice evidence unavailable, using clinical score only");
                    None
                }
            },
        };

        let assessment = self.fusion.fuse(score, voice);
        tracing::info!(
            clinical_score = score,
            risk_score = assessment.risk_score,
            model_used = %assessment.model_used,
            has_voice_data = assessment.has_voice_data,
            "Clinical assessment completed"
        );
        assessment
    }

    fn voice_signal(&self, features: &VoiceFeatures) -> Result<VoiceSignal> {
        let external = validate_features(features)?;
        let scaler = self.require_scaler()?;
        let (name, model, label) = self.primary_model()?;
        let mapped = prepare_model_input(&external);
        let probability = self.timed_inference(name, &model, &scaler.transform(&mapped.vector))?;
        Ok(VoiceSignal {
            probability,
            model: label.to_string(),
            feature_importance: self.feature_importance(&model),
        })
    }

    fn require_scaler(&self) -> Result<Arc<crate::scaler::StandardScaler>> {
        self.registry
            .scaler()
            .ok_or_else(|| ServiceError::Unavailable("feature scaler is not loaded".to_string()))
    }

    fn primary_model(&self) -> Result<(&'static str, Arc<Classifier>, &'static str)> {
        if let Some(model) = self.registry.get(ENSEMBLE_MODEL) {
            return Ok((ENSEMBLE_MODEL, model, ENSEMBLE_MODEL_LABEL));
        }
        if let Some(model) = self.registry.get(RANDOM_FOREST_MODEL) {
            return Ok((RANDOM_FOREST_MODEL, model, RANDOM_FOREST_MODEL));
        }
        Err(ServiceError::Unavailable(
            "neither the ensemble nor the random forest model is loaded".to_string(),
        ))
    }

    fn timed_inference(&self, name: &str, model: &Classifier, x: &[f64]) -> Result<f64> {
        let start = Instant::now();
        let result = model.predict_proba(x);
        self.stats.record(name, start.elapsed());
        result
    }

    /// The model's own importances, else those of the standalone random forest.
    fn feature_importance(&self, model: &Classifier) -> Option<BTreeMap<String, f64>> {
        model
            .feature_importances()
            .or_else(|| {
                self.registry
                    .get(RANDOM_FOREST_MODEL)
                    .and_then(|rf| rf.feature_importances())
            })
            .map(|w| named_weights(&w))
    }
}

/// Reject unknown names and non-finite values; return the alias-keyed map.
fn validate_features(features: &VoiceFeatures) -> Result<BTreeMap<String, f64>> {
    let external = features.to_alias_map();

    let unknown = unknown_aliases(&external);
    if !unknown.is_empty() {
        return Err(ServiceError::invalid_input(
            "unknown voice feature names",
            "known feature aliases such as mdvpFo, mdvpJitterAbs, shimmerApq3",
            unknown.join(", "),
        ));
    }

    let non_finite: Vec<&str> = external
        .iter()
        .filter(|(_, v)| !v.is_finite())
        .map(|(k, _)| k.as_str())
        .collect();
    if !non_finite.is_empty() {
        return Err(ServiceError::invalid_input(
            "voice features must be finite numbers",
            "finite numbers",
            format!("non-finite values for {}", non_finite.join(", ")),
        ));
    }

    Ok(external)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
