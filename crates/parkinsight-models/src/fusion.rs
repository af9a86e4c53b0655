//! Rule-based clinical scoring and its fusion with voice-model evidence.

use parkinsight_core::{ClinicalSymptoms, FusionConfig, RiskAssessment};
use std::collections::BTreeMap;

/// `model_used` when no voice evidence contributed.
pub const CLINICAL_ONLY_MODEL: &str = "clinical_assessment";

/// Fixed voice probability returned by the legacy stub.
pub const LEGACY_VOICE_PROBABILITY: f64 = 0.65;

/// Model name reported by the legacy stub.
pub const LEGACY_VOICE_MODEL: &str = "ensemble";

/// Importance map reported by the legacy stub.
const LEGACY_IMPORTANCE: [(&str, f64); 13] = [
    ("MDVP:Fo(Hz)", 0.08),
    ("MDVP:Fhi(Hz)", 0.06),
    ("MDVP:Flo(Hz)", 0.07),
    ("MDVP:Jitter(%)", 0.12),
    ("MDVP:Shimmer", 0.14),
    ("NHR", 0.09),
    ("HNR", 0.11),
    ("RPDE", 0.08),
    ("DFA", 0.08),
    ("spread1", 0.06),
    ("spread2", 0.04),
    ("D2", 0.03),
    ("PPE", 0.04),
];

/// Clinical risk score in `[0, 100]`.
///
/// Motor symptoms dominate (tremor 25, bradykinesia 25, rigidity 20,
/// postural instability 15), non-motor ones add less (voice changes 10,
/// handwriting 5), and age contributes up to 15 points, linearly from
/// 40 to 80.
#[must_use]
pub fn clinical_score(symptoms: &ClinicalSymptoms) -> f64 {
    let mut score = 0.0;

    if symptoms.age > 40 {
        let age_factor = (f64::from(symptoms.age - 40) / 40.0).min(1.0);
        score += age_factor * 15.0;
    }

    for (present, points) in [
        (symptoms.tremor, 25.0),
        (symptoms.rigidity, 20.0),
        (symptoms.bradykinesia, 25.0),
        (symptoms.postural_instability, 15.0),
        (symptoms.voice_changes, 10.0),
        (symptoms.handwriting, 5.0),
    ] {
        if present {
            score += points;
        }
    }

    f64::min(score, 100.0)
}

/// Voice-model evidence for fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSignal {
    /// Positive-class probability from the voice model.
    pub probability: f64,
    /// Name reported in `model_used` (`<model>_with_clinical`).
    pub model: String,
    /// Importance map of the voice model, if any.
    pub feature_importance: Option<BTreeMap<String, f64>>,
}

impl VoiceSignal {
    /// The fixed 0.65 signal substituted for real inference when the legacy
    /// stub is enabled.
    #[must_use]
    pub fn legacy_stub() -> Self {
        Self {
            probability: LEGACY_VOICE_PROBABILITY,
            model: LEGACY_VOICE_MODEL.to_string(),
            feature_importance: Some(
                LEGACY_IMPORTANCE
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
            ),
        }
    }
}

/// Weighted clinical/voice fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskFusion {
    voice_weight: f64,
}

impl Default for RiskFusion {
    fn default() -> Self {
        Self { voice_weight: 0.6 }
    }
}

impl RiskFusion {
    /// Fusion with the given voice weight, clamped to `[0, 1]`.
    #[must_use]
    pub fn new(voice_weight: f64) -> Self {
        Self {
            voice_weight: voice_weight.clamp(0.0, 1.0),
        }
    }

    /// Fusion configured from [`FusionConfig`].
    #[must_use]
    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(config.voice_weight)
    }

    /// Voice weight; the clinical weight is its complement.
    #[must_use]
    pub fn voice_weight(&self) -> f64 {
        self.voice_weight
    }

    /// Combine a clinical score with optional voice evidence.
    ///
    /// Deterministic in its inputs.
    #[must_use]
    pub fn fuse(&self, clinical_score: f64, voice: Option<VoiceSignal>) -> RiskAssessment {
        let clinical_score = clinical_score.clamp(0.0, 100.0);
        match voice {
            Some(voice) => {
                let w = self.voice_weight;
                let p = voice.probability.clamp(0.0, 1.0);
                let probability = w * p + (1.0 - w) * (clinical_score / 100.0);
                let risk_score = w * (p * 100.0) + (1.0 - w) * clinical_score;
                RiskAssessment {
                    prediction: u8::from(probability > 0.5),
                    probability,
                    risk_score,
                    model_used: format!("{}_with_clinical", voice.model),
                    feature_importance: voice.feature_importance,
                    has_voice_data: true,
                }
            }
            None => RiskAssessment {
                prediction: u8::from(clinical_score > 50.0),
                probability: clinical_score / 100.0,
                risk_score: clinical_score,
                model_used: CLINICAL_ONLY_MODEL.to_string(),
                feature_importance: None,
                has_voice_data: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symptoms(age: u32) -> ClinicalSymptoms {
        ClinicalSymptoms {
            age,
            ..ClinicalSymptoms::default()
        }
    }

    #[test]
    fn test_tremor_bradykinesia_age_70() {
        let s = ClinicalSymptoms {
            tremor: true,
            bradykinesia: true,
            ..symptoms(70)
        };
        assert!((clinical_score(&s) - 61.25).abs() < 1e-9);

        let r = RiskFusion::default().fuse(clinical_score(&s), None);
        assert!((r.risk_score - 61.25).abs() < 1e-9);
        assert!((r.probability - 0.6125).abs() < 1e-9);
        assert_eq!(r.prediction, 1);
        assert_eq!(r.model_used, CLINICAL_ONLY_MODEL);
        assert!(!r.has_voice_data);
    }

    #[test]
    fn test_no_symptoms_age_30() {
        let r = RiskFusion::default().fuse(clinical_score(&symptoms(30)), None);
        assert_eq!(r.risk_score, 0.0);
        assert_eq!(r.probability, 0.0);
        assert_eq!(r.prediction, 0);
    }

    #[test]
    fn test_three_motor_symptoms_age_85() {
        let s = ClinicalSymptoms {
            tremor: true,
            rigidity: true,
            bradykinesia: true,
            ..symptoms(85)
        };
        let r = RiskFusion::default().fuse(clinical_score(&s), None);
        assert!((r.risk_score - 85.0).abs() < 1e-9);
        assert_eq!(r.prediction, 1);
    }

    #[test]
    fn test_score_capped_at_100() {
        let s = ClinicalSymptoms {
            tremor: true,
            rigidity: true,
            bradykinesia: true,
            postural_instability: true,
            voice_changes: true,
            handwriting: true,
            age: 90,
        };
        assert_eq!(clinical_score(&s), 100.0);
    }

    #[test]
    fn test_age_boundary() {
        assert_eq!(clinical_score(&symptoms(40)), 0.0);
        assert!((clinical_score(&symptoms(60)) - 7.5).abs() < 1e-12);
        assert_eq!(clinical_score(&symptoms(200)), 15.0);
    }

    #[test]
    fn test_fusion_with_voice() {
        let voice = VoiceSignal {
            probability: 0.8,
            model: "ensemble_voting_classifier".to_string(),
            feature_importance: None,
        };
        let r = RiskFusion::default().fuse(50.0, Some(voice));
        assert!((r.probability - (0.6 * 0.8 + 0.4 * 0.5)).abs() < 1e-12);
        assert!((r.risk_score - (0.6 * 80.0 + 0.4 * 50.0)).abs() < 1e-9);
        assert_eq!(r.prediction, 1);
        assert_eq!(r.model_used, "ensemble_voting_classifier_with_clinical");
        assert!(r.has_voice_data);
    }

    #[test]
    fn test_fuse_is_deterministic() {
        let fusion = RiskFusion::new(0.6);
        let a = fusion.fuse(42.0, Some(VoiceSignal::legacy_stub()));
        let b = fusion.fuse(42.0, Some(VoiceSignal::legacy_stub()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_legacy_stub_values() {
        let r = RiskFusion::default().fuse(0.0, Some(VoiceSignal::legacy_stub()));
        assert!((r.probability - 0.39).abs() < 1e-12);
        assert!((r.risk_score - 39.0).abs() < 1e-9);
        assert_eq!(r.prediction, 0);
        assert_eq!(r.model_used, "ensemble_with_clinical");
        assert_eq!(r.feature_importance.unwrap().len(), 13);
    }

    #[test]
    fn test_configured_voice_weight() {
        let fusion = RiskFusion::from_config(&FusionConfig {
            voice_weight: 1.0,
            legacy_voice_stub: false,
        });
        let voice = VoiceSignal {
            probability: 0.3,
            model: "random_forest".to_string(),
            feature_importance: None,
        };
        let r = fusion.fuse(100.0, Some(voice));
        assert!((r.probability - 0.3).abs() < 1e-12);
        assert_eq!(RiskFusion::new(3.0).voice_weight(), 1.0);
    }
}
