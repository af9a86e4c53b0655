//! Support vector classifier evaluated from exported support vectors.

use crate::tree::sigmoid;
use parkinsight_core::{Result, ServiceError, SCHEMA_LEN};
use serde::{Deserialize, Serialize};

/// Kernel function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    /// `<u, v>`
    Linear,
    /// `exp(-gamma * |u - v|^2)`
    Rbf {
        /// Kernel width.
        gamma: f64,
    },
}

impl Kernel {
    fn apply(&self, u: &[f64], v: &[f64]) -> f64 {
        match self {
            Self::Linear => u.iter().zip(v).map(|(a, b)| a * b).sum(),
            Self::Rbf { gamma } => {
                let dist: f64 = u.iter().zip(v).map(|(a, b)| (a - b).powi(2)).sum();
                (-gamma * dist).exp()
            }
        }
    }
}

/// Platt scaling parameters: `P(y=1 | f) = 1 / (1 + exp(a * f + b))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    /// Slope.
    pub a: f64,
    /// Offset.
    pub b: f64,
}

/// Binary SVM in dual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmModel {
    /// Input width.
    pub n_features: usize,
    /// Kernel.
    pub kernel: Kernel,
    /// Support vectors, one row per vector.
    pub support_vectors: Vec<Vec<f64>>,
    /// `alpha_i * y_i` per support vector.
    pub dual_coef: Vec<f64>,
    /// Bias term.
    pub intercept: f64,
    /// Probability calibration, when exported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platt: Option<PlattScaling>,
}

impl SvmModel {
    /// Check shapes against the schema width.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Model`] for any inconsistency.
    pub fn validate(&self) -> Result<()> {
        if self.n_features != SCHEMA_LEN {
            return Err(ServiceError::Model(format!(
                "svm expects {} features, schema has {SCHEMA_LEN}",
                self.n_features
            )));
        }
        if self.support_vectors.is_empty() {
            return Err(ServiceError::Model("svm has no support vectors".to_string()));
        }
        if self.support_vectors.len() != self.dual_coef.len() {
            return Err(ServiceError::Model(format!(
                "{} support vectors but {} dual coefficients",
                self.support_vectors.len(),
                self.dual_coef.len()
            )));
        }
        if let Some(bad) = self
            .support_vectors
            .iter()
            .position(|sv| sv.len() != self.n_features)
        {
            return Err(ServiceError::Model(format!(
                "support vector {bad} has the wrong width"
            )));
        }
        if let Kernel::Rbf { gamma } = self.kernel {
            if !(gamma.is_finite() && gamma > 0.0) {
                return Err(ServiceError::Model(format!("invalid rbf gamma {gamma}")));
            }
        }
        Ok(())
    }

    /// Signed distance to the separating surface.
    #[must_use]
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, coef)| coef * self.kernel.apply(sv, x))
            .sum::<f64>()
            + self.intercept
    }

    /// Whether a calibrated probability is available.
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.platt.is_some()
    }

    /// Positive-class probability: Platt-calibrated when available, else the
    /// logistic of the decision value.
    #[must_use]
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let f = self.decision_function(x);
        match self.platt {
            Some(PlattScaling { a, b }) => 1.0 / (1.0 + (a * f + b).exp()),
            None => sigmoid(f),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn linear_svm(weight_on_first: f64, intercept: f64) -> SvmModel {
        let mut sv = vec![0.0; SCHEMA_LEN];
        sv[0] = 1.0;
        SvmModel {
            n_features: SCHEMA_LEN,
            kernel: Kernel::Linear,
            support_vectors: vec![sv],
            dual_coef: vec![weight_on_first],
            intercept,
            platt: None,
        }
    }

    #[test]
    fn test_linear_decision_function() {
        let svm = linear_svm(2.0, -1.0);
        assert!(svm.validate().is_ok());
        let mut x = [0.0; SCHEMA_LEN];
        x[0] = 1.5;
        assert!((svm.decision_function(&x) - 2.0).abs() < 1e-12);
        assert!((svm.predict_proba(&x) - sigmoid(2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_rbf_kernel_at_support_vector() {
        let mut svm = linear_svm(1.0, 0.0);
        svm.kernel = Kernel::Rbf { gamma: 0.5 };
        let x = svm.support_vectors[0].clone();
        assert!((svm.decision_function(&x) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_platt_calibration() {
        let mut svm = linear_svm(1.0, 0.0);
        svm.platt = Some(PlattScaling { a: -2.0, b: 0.0 });
        assert!(svm.is_calibrated());
        let mut x = [0.0; SCHEMA_LEN];
        x[0] = 1.0;
        let expected = 1.0 / (1.0 + (-2.0f64).exp());
        assert!((svm.predict_proba(&x) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_validate_shape_mismatch() {
        let mut svm = linear_svm(1.0, 0.0);
        svm.dual_coef.push(1.0);
        assert!(svm.validate().is_err());

        let mut svm = linear_svm(1.0, 0.0);
        svm.kernel = Kernel::Rbf { gamma: 0.0 };
        assert!(svm.validate().is_err());

        let mut svm = linear_svm(1.0, 0.0);
        svm.support_vectors[0].pop();
        assert!(svm.validate().is_err());
    }
}
