//! Per-feature standardisation applied before classifier inference.

use parkinsight_core::{FeatureVector, Result, ServiceError, SCHEMA_LEN};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Standard scaler: `(x - mean) / scale` per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-feature mean.
    pub mean: Vec<f64>,
    /// Per-feature standard deviation.
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit mean and population standard deviation over `rows`.
    ///
    /// Zero-variance columns get a scale of `1.0`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Model`] if `rows` is empty or ragged.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| ServiceError::Model("cannot fit scaler on zero rows".to_string()))?;
        if rows.iter().any(|r| r.len() != width) {
            return Err(ServiceError::Model("scaler rows have unequal width".to_string()));
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x / n;
            }
        }
        let mut scale = vec![0.0; width];
        for row in rows {
            for ((s, x), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (x - m).powi(2) / n;
            }
        }
        for s in &mut scale {
            *s = s.sqrt();
            if *s == 0.0 {
                *s = 1.0;
            }
        }
        Ok(Self { mean, scale })
    }

    /// Stand-in scaler fitted on 10 uniformly random schema-width rows.
    pub fn stand_in<R: Rng>(rng: &mut R) -> Self {
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|_| (0..SCHEMA_LEN).map(|_| rng.gen::<f64>()).collect())
            .collect();
        // Ten equal-width rows always fit.
        Self::fit(&rows).unwrap_or(Self {
            mean: vec![0.0; SCHEMA_LEN],
            scale: vec![1.0; SCHEMA_LEN],
        })
    }

    /// Reject artifacts that do not match the schema width or carry bad scales.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Model`] describing the mismatch.
    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != SCHEMA_LEN || self.scale.len() != SCHEMA_LEN {
            return Err(ServiceError::Model(format!(
                "scaler expects {} features, artifact has mean={} scale={}",
                SCHEMA_LEN,
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self
            .mean
            .iter()
            .chain(&self.scale)
            .any(|v| !v.is_finite())
        {
            return Err(ServiceError::Model(
                "scaler contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    /// Standardise one schema vector.
    #[must_use]
    pub fn transform(&self, features: &FeatureVector) -> Vec<f64> {
        features
            .as_slice()
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s })
            .collect()
    }
}
