//! Acoustic feature extraction.
//!
//! [`extract`] starts from population-typical values for all 13 client-facing
//! features and overwrites the groups it can compute:
//!
//! | stage | features | source |
//! |---|---|---|
//! | F0 | `mdvpFo`, `mdvpFhi`, `mdvpFlo` | [`crate::pitch`] |
//! | harmonic/noise | `hnr`, `nhr` | [`crate::hpss`] |
//! | PPE | `ppe` | [`crate::ppe`] |
//!
//! Jitter, shimmer, RPDE, DFA, spread1/2 and D2 need perturbation or
//! nonlinear-dynamics analysis and always keep their population values.
//!
//! Every stage reports a [`Stage`] so callers can tell computed values from
//! defaults without reading logs.

use parkinsight_core::VoiceFeatures;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::hpss;
use crate::pitch;
use crate::ppe;

/// Voiced frames needed before F0 statistics are trusted.
pub const MIN_VOICED_FRAMES: usize = 5;

/// Voiced frames needed for pitch period entropy.
pub const MIN_PPE_FRAMES: usize = 2;

/// Clinically plausible HNR range (harmonic over noise power).
pub const HNR_RANGE: (f64, f64) = (12.0, 28.0);

/// Clinically plausible NHR range.
pub const NHR_RANGE: (f64, f64) = (0.01, 0.19);

/// Plausible PPE range (nats).
pub const PPE_RANGE: (f64, f64) = (0.15, 0.35);

/// Population-typical values for the 13 acoustic features.
#[must_use]
pub fn population_defaults() -> VoiceFeatures {
    VoiceFeatures {
        mdvp_fo: 154.23,
        mdvp_fhi: 197.35,
        mdvp_flo: 116.82,
        mdvp_jitter: 0.0062,
        mdvp_shimmer: 0.0376,
        nhr: 0.022,
        hnr: 21.6,
        rpde: 0.498,
        dfa: 0.718,
        spread1: -6.2,
        spread2: 0.226,
        d2: 2.381,
        ppe: 0.206,
        extra: BTreeMap::new(),
    }
}

/// Outcome of one extraction stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage<T> {
    /// The stage produced a value from the audio.
    Computed(T),
    /// The stage kept its defaults.
    Defaulted {
        /// Why the stage could not compute.
        reason: String,
    },
}

impl<T> Stage<T> {
    fn defaulted(reason: impl Into<String>) -> Self {
        Self::Defaulted {
            reason: reason.into(),
        }
    }

    /// Whether the stage computed a value.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }

    /// The computed value, if any.
    #[must_use]
    pub fn computed(&self) -> Option<&T> {
        match self {
            Self::Computed(v) => Some(v),
            Self::Defaulted { .. } => None,
        }
    }
}

/// F0 statistics over voiced frames (Hz).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct F0Stats {
    /// Average pitch, reported as `mdvpFo`.
    pub mean: f64,
    /// Highest voiced pitch, reported as `mdvpFhi`.
    pub max: f64,
    /// Lowest voiced pitch, reported as `mdvpFlo`.
    pub min: f64,
}

/// Harmonic/noise ratios after clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicStats {
    /// Harmonics-to-noise power ratio, the inverse of `nhr` before clamping.
    pub hnr: f64,
    /// Noise-to-harmonics ratio.
    pub nhr: f64,
}

/// Per-stage summary suitable for API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    /// `f0`, `harmonic_noise` or `ppe`.
    pub stage: &'static str,
    /// `false` when the stage's features fell back to defaults.
    pub computed: bool,
    /// Why the stage was defaulted; absent when it was computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StageReport {
    fn from_stage<T>(stage: &'static str, outcome: &Stage<T>) -> Self {
        match outcome {
            Stage::Computed(_) => Self {
                stage,
                computed: true,
                reason: None,
            },
            Stage::Defaulted { reason } => Self {
                stage,
                computed: false,
                reason: Some(reason.clone()),
            },
        }
    }
}

/// Result of [`extract`].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// All 13 features, computed where possible.
    pub features: VoiceFeatures,
    /// Pitch statistics behind the three `mdvpF*` features.
    pub f0: Stage<F0Stats>,
    /// Source of `hnr` and `nhr`.
    pub harmonic: Stage<HarmonicStats>,
    /// Pitch period entropy.
    pub ppe: Stage<f64>,
    /// Number of voiced pitch frames found.
    pub voiced_frames: usize,
}

impl Extraction {
    /// One entry per stage, in pipeline order.
    #[must_use]
    pub fn report(&self) -> Vec<StageReport> {
        vec![
            StageReport::from_stage("f0", &self.f0),
            StageReport::from_stage("harmonic_noise", &self.harmonic),
            StageReport::from_stage("ppe", &self.ppe),
        ]
    }
}

/// Extract the 13 acoustic features from mono `samples`.
///
/// Never fails: stages that cannot compute keep their population defaults
/// and say why.
#[must_use]
pub fn extract(samples: &[f32], sample_rate: u32) -> Extraction {
    let mut features = population_defaults();

    let unusable = if sample_rate == 0 {
        Some("sample rate is zero")
    } else if samples.is_empty() {
        Some("no samples")
    } else if samples.iter().any(|s| !s.is_finite()) {
        Some("non-finite samples")
    } else {
        None
    };
    if let Some(reason) = unusable {
        tracing::warn!(reason, "Audio unusable, keeping all default voice features");
        return Extraction {
            features,
            f0: Stage::defaulted(reason),
            harmonic: Stage::defaulted(reason),
            ppe: Stage::defaulted(reason),
            voiced_frames: 0,
        };
    }

    let track = pitch::track_pitch(samples, sample_rate);
    let voiced = track.voiced();

    let f0 = f0_stage(&voiced);
    if let Stage::Computed(stats) = &f0 {
        features.mdvp_fo = stats.mean;
        features.mdvp_fhi = stats.max;
        features.mdvp_flo = stats.min;
    }

    let harmonic = harmonic_stage(samples);
    if let Stage::Computed(stats) = &harmonic {
        features.hnr = stats.hnr;
        features.nhr = stats.nhr;
    }

    let ppe = ppe_stage(&voiced);
    if let Stage::Computed(value) = &ppe {
        features.ppe = *value;
    }

    tracing::debug!(
        voiced_frames = voiced.len(),
        frames = track.frames.len(),
        f0 = f0.is_computed(),
        harmonic = harmonic.is_computed(),
        ppe = ppe.is_computed(),
        "Voice features extracted"
    );

    Extraction {
        features,
        f0,
        harmonic,
        ppe,
        voiced_frames: voiced.len(),
    }
}

fn f0_stage(voiced: &[f64]) -> Stage<F0Stats> {
    if voiced.len() < MIN_VOICED_FRAMES {
        return Stage::defaulted(format!(
            "{} voiced frames, need {MIN_VOICED_FRAMES}",
            voiced.len()
        ));
    }
    let mean = voiced.iter().sum::<f64>() / voiced.len() as f64;
    let max = voiced.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = voiced.iter().copied().fold(f64::INFINITY, f64::min);
    Stage::Computed(F0Stats { mean, max, min })
}

fn harmonic_stage(samples: &[f32]) -> Stage<HarmonicStats> {
    match hpss::component_power(samples) {
        Some(power) => harmonic_ratios(power),
        None => Stage::defaulted("no samples"),
    }
}

/// `H / P` and `P / H`, each clamped to its plausible range.
fn harmonic_ratios(power: hpss::ComponentPower) -> Stage<HarmonicStats> {
    if !(power.harmonic > 0.0 && power.percussive > 0.0) {
        return Stage::defaulted("harmonic or percussive power is zero");
    }
    let hnr = power.harmonic / power.percussive;
    let nhr = power.percussive / power.harmonic;
    if !hnr.is_finite() || !nhr.is_finite() {
        return Stage::defaulted("harmonic ratio is not finite");
    }
    Stage::Computed(HarmonicStats {
        hnr: hnr.clamp(HNR_RANGE.0, HNR_RANGE.1),
        nhr: nhr.clamp(NHR_RANGE.0, NHR_RANGE.1),
    })
}

fn ppe_stage(voiced: &[f64]) -> Stage<f64> {
    if voiced.len() < MIN_PPE_FRAMES {
        return Stage::defaulted(format!(
            "{} voiced frames, need {MIN_PPE_FRAMES}",
            voiced.len()
        ));
    }
    match ppe::pitch_period_entropy(voiced) {
        Some(h) => Stage::Computed(h.clamp(PPE_RANGE.0, PPE_RANGE.1)),
        None => Stage::defaulted("no usable pitch periods"),
    }
}
