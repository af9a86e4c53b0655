//! Classifier artifacts and their loaded, capability-tagged form.
//!
//! An artifact is what sits on disk (`kind`-tagged JSON or YAML). A
//! [`Classifier`] is what the registry hands out: validated, immutable, and
//! tagged with the [`Capabilities`] callers branch on instead of probing
//! for methods at runtime.

use crate::mlp::{MlpClassifier, MlpSpec};
use crate::svm::SvmModel;
use crate::tree::TreeEnsemble;
use candle_core::Device;
use parkinsight_core::{Result, ServiceError, SCHEMA_LEN};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// On-disk model description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Random forest, extra trees, gradient boosting, AdaBoost.
    TreeEnsemble(TreeEnsemble),
    /// Support vector classifier.
    Svm(SvmModel),
    /// Multi-layer perceptron.
    Mlp(MlpSpec),
    /// Voting ensemble over named member artifacts.
    Voting(VotingSpec),
}

/// Soft voting averages probabilities; hard voting counts labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingKind {
    /// Weighted mean of member probabilities.
    #[default]
    Soft,
    /// Weighted share of members predicting the positive class.
    Hard,
}

/// Serialized voting ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingSpec {
    /// Voting rule.
    #[serde(default)]
    pub voting: VotingKind,
    /// Members, in export order.
    pub estimators: Vec<VotingMember>,
    /// Optional per-member weights (uniform when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}

/// A named member of a voting ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingMember {
    /// Member name (`rf`, `svm`, ...).
    pub name: String,
    /// Member model.
    pub model: ModelArtifact,
}

// ---------------------------------------------------------------------------
// Loaded classifiers
// ---------------------------------------------------------------------------

/// What a loaded classifier can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Produces a calibrated class probability natively.
    pub supports_probability: bool,
    /// Exposes per-feature importances (directly or through a member).
    pub supports_feature_importance: bool,
}

/// Loaded voting ensemble.
#[derive(Debug)]
pub struct VotingClassifier {
    voting: VotingKind,
    members: Vec<(String, Classifier)>,
    weights: Vec<f64>,
}

impl VotingClassifier {
    /// Member names and classifiers, in export order.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Classifier)> {
        self.members.iter().map(|(n, c)| (n.as_str(), c))
    }
}

/// A validated classifier tagged with its kind.
#[derive(Debug)]
pub enum Classifier {
    /// Tree ensemble.
    Forest(TreeEnsemble),
    /// Support vector classifier.
    Svm(SvmModel),
    /// Multi-layer perceptron.
    NeuralNetwork(MlpClassifier),
    /// Voting ensemble.
    Voting(VotingClassifier),
}

impl Classifier {
    /// Validate an artifact and build the runtime classifier.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Model`] if the artifact is structurally
    /// invalid or does not match the schema width.
    pub fn from_artifact(artifact: ModelArtifact, device: &Device) -> Result<Self> {
        match artifact {
            ModelArtifact::TreeEnsemble(model) => {
                model.validate()?;
                Ok(Self::Forest(model))
            }
            ModelArtifact::Svm(model) => {
                model.validate()?;
                Ok(Self::Svm(model))
            }
            ModelArtifact::Mlp(spec) => Ok(Self::NeuralNetwork(MlpClassifier::from_spec(
                &spec, device,
            )?)),
            ModelArtifact::Voting(spec) => {
                if spec.estimators.is_empty() {
                    return Err(ServiceError::Model("voting ensemble has no members".to_string()));
                }
                let weights = match spec.weights {
                    Some(w) if w.len() != spec.estimators.len() => {
                        return Err(ServiceError::Model(format!(
                            "{} voting weights for {} members",
                            w.len(),
                            spec.estimators.len()
                        )));
                    }
                    Some(w)
                        if w.iter().any(|x| !x.is_finite() || *x < 0.0)
                            || w.iter().sum::<f64>() <= 0.0 =>
                    {
                        return Err(ServiceError::Model(
                            "voting weights must be non-negative with a positive sum".to_string(),
                        ));
                    }
                    Some(w) => w,
                    None => vec![1.0; spec.estimators.len()],
                };
                let members = spec
                    .estimators
                    .into_iter()
                    .map(|m| {
                        let name = m.name;
                        Classifier::from_artifact(m.model, device)
                            .map(|c| (name.clone(), c))
                            .map_err(|e| {
                                ServiceError::Model(format!("voting member '{name}': {e}"))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Voting(VotingClassifier {
                    voting: spec.voting,
                    members,
                    weights,
                }))
            }
        }
    }

    /// Short kind name reported by the API.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forest(_) => "tree_ensemble",
            Self::Svm(_) => "svm",
            Self::NeuralNetwork(_) => "neural_network",
            Self::Voting(_) => "voting",
        }
    }

    /// Capability flags, fixed at load time.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::Forest(_) => Capabilities {
                supports_probability: true,
                supports_feature_importance: true,
            },
            Self::Svm(svm) => Capabilities {
                supports_probability: svm.is_calibrated(),
                supports_feature_importance: false,
            },
            Self::NeuralNetwork(_) => Capabilities {
                supports_probability: true,
                supports_feature_importance: false,
            },
            Self::Voting(v) => Capabilities {
                supports_probability: v.voting == VotingKind::Soft,
                supports_feature_importance: v
                    .members
                    .iter()
                    .any(|(_, m)| m.capabilities().supports_feature_importance),
            },
        }
    }

    /// Positive-class probability for one scaled sample.
    ///
    /// Classifiers without native probabilities fall back to a monotone
    /// score in `[0, 1]`: the logistic of the SVM decision value, or the
    /// weighted positive-vote share for hard voting.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidInput`] on a width mismatch and
    /// [`ServiceError::Model`] if evaluation fails.
    pub fn predict_proba(&self, x: &[f64]) -> Result<f64> {
        if x.len() != SCHEMA_LEN {
            return Err(ServiceError::invalid_input(
                "feature vector has the wrong width",
                format!("{SCHEMA_LEN} features"),
                format!("{} features", x.len()),
            ));
        }
        match self {
            Self::Forest(model) => Ok(model.predict_proba(x)),
            Self::Svm(model) => Ok(model.predict_proba(x)),
            Self::NeuralNetwork(model) => model.predict_proba(x),
            Self::Voting(v) => {
                let total: f64 = v.weights.iter().sum();
                let mut acc = 0.0;
                for ((_, member), w) in v.members.iter().zip(&v.weights) {
                    let p = member.predict_proba(x)?;
                    acc += w * match v.voting {
                        VotingKind::Soft => p,
                        VotingKind::Hard => f64::from(u8::from(p > 0.5)),
                    };
                }
                Ok((acc / total).clamp(0.0, 1.0))
            }
        }
    }

    /// Per-feature importances, in schema order.
    ///
    /// Tree ensembles answer directly; voting ensembles return the first
    /// member that can.
    #[must_use]
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            Self::Forest(model) => Some(model.feature_importances()),
            Self::Voting(v) => v.members.iter().find_map(|(_, m)| m.feature_importances()),
            Self::Svm(_) | Self::NeuralNetwork(_) => None,
        }
    }
}
