//! Multi-layer perceptron classifier evaluated with candle.
//!
//! # Architecture
//!
//! ```text
//! Input (22) → [Linear → activation]* → Linear(1 | 2) → Sigmoid | Softmax
//! ```
//!
//! Weights are exported as plain nested arrays (`out x in`, scikit-learn's
//! `coefs_` transposed) and turned into candle tensors once at load time.

use candle_core::{Device, Tensor};
use parkinsight_core::{Result, ServiceError, SCHEMA_LEN};
use serde::{Deserialize, Serialize};

/// Hidden-layer activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// `max(0, x)`
    #[default]
    Relu,
    /// `tanh(x)`
    Tanh,
    /// `1 / (1 + e^-x)`
    Logistic,
    /// `x`
    Identity,
}

/// One dense layer as exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weight matrix, `out x in`.
    pub weights: Vec<Vec<f64>>,
    /// Bias, length `out`.
    pub bias: Vec<f64>,
}

impl DenseLayer {
    fn in_dim(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn out_dim(&self) -> usize {
        self.weights.len()
    }
}

/// Serialized MLP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpSpec {
    /// Input width.
    pub n_features: usize,
    /// Activation between hidden layers.
    #[serde(default)]
    pub activation: Activation,
    /// Layers from input to output.
    pub layers: Vec<DenseLayer>,
}

impl MlpSpec {
    /// Check layer shapes chain from the schema width to a 1- or 2-unit output.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Model`] for any inconsistency.
    pub fn validate(&self) -> Result<()> {
        if self.n_features != SCHEMA_LEN {
            return Err(ServiceError::Model(format!(
                "mlp expects {} features, schema has {SCHEMA_LEN}",
                self.n_features
            )));
        }
        let Some(last) = self.layers.last() else {
            return Err(ServiceError::Model("mlp has no layers".to_string()));
        };
        let mut width = self.n_features;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.out_dim() == 0 || layer.in_dim() != width {
                return Err(ServiceError::Model(format!(
                    "mlp layer {i} expects input width {width}, has {}",
                    layer.in_dim()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != width) {
                return Err(ServiceError::Model(format!("mlp layer {i} is ragged")));
            }
            if layer.bias.len() != layer.out_dim() {
                return Err(ServiceError::Model(format!(
                    "mlp layer {i} has {} biases for {} units",
                    layer.bias.len(),
                    layer.out_dim()
                )));
            }
            if layer
                .weights
                .iter()
                .flatten()
                .chain(&layer.bias)
                .any(|v| !v.is_finite())
            {
                return Err(ServiceError::Model(format!(
                    "mlp layer {i} has non-finite parameters"
                )));
            }
            width = layer.out_dim();
        }
        if !matches!(last.out_dim(), 1 | 2) {
            return Err(ServiceError::Model(format!(
                "mlp output must have 1 or 2 units, has {}",
                last.out_dim()
            )));
        }
        Ok(())
    }
}

/// Loaded MLP ready for inference.
pub struct MlpClassifier {
    layers: Vec<candle_nn::Linear>,
    activation: Activation,
    output_dim: usize,
    device: Device,
}

impl std::fmt::Debug for MlpClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlpClassifier")
            .field("layers", &self.layers.len())
            .field("activation", &self.activation)
            .field("output_dim", &self.output_dim)
            .finish()
    }
}

impl MlpClassifier {
    /// Build candle layers from a validated spec.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Model`] if the layer description is invalid or a tensor
    /// cannot be created.
    pub fn from_spec(spec: &MlpSpec, device: &Device) -> Result<Self> {
        spec.validate()?;
        let mut layers = Vec::with_capacity(spec.layers.len());
        for (i, layer) in spec.layers.iter().enumerate() {
            let flat: Vec<f32> = layer.weights.iter().flatten().map(|v| *v as f32).collect();
            let weight = Tensor::from_vec(flat, (layer.out_dim(), layer.in_dim()), device)
                .map_err(|e| ServiceError::Model(format!("Failed to create mlp weight {i}: {e}")))?;
            let bias: Vec<f32> = layer.bias.iter().map(|v| *v as f32).collect();
            let bias = Tensor::from_vec(bias, layer.out_dim(), device)
                .map_err(|e| ServiceError::Model(format!("Failed to create mlp bias {i}: {e}")))?;
            layers.push(candle_nn::Linear::new(weight, Some(bias)));
        }
        Ok(Self {
            layers,
            activation: spec.activation,
            output_dim: spec.layers.last().map_or(1, DenseLayer::out_dim),
            device: device.clone(),
        })
    }

    /// Positive-class probability for one (scaled) sample.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Model`] if any tensor operation fails.
    pub fn predict_proba(&self, x: &[f64]) -> Result<f64> {
        let input: Vec<f32> = x.iter().map(|v| *v as f32).collect();
        let mut h = Tensor::from_vec(input, (1, x.len()), &self.device)
            .map_err(|e| ServiceError::Model(format!("Failed to create mlp input: {e}")))?;

        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            h = candle_nn::Module::forward(layer, &h)
                .map_err(|e| ServiceError::Model(format!("Mlp layer {i} forward failed: {e}")))?;
            if i < last {
                h = self
                    .activate(&h)
                    .map_err(|e| ServiceError::Model(format!("Mlp activation failed: {e}")))?;
            }
        }

        let probs = if self.output_dim == 1 {
            candle_nn::ops::sigmoid(&h)
        } else {
            candle_nn::ops::softmax(&h, candle_core::D::Minus1)
        }
        .map_err(|e| ServiceError::Model(format!("Mlp output activation failed: {e}")))?;

        let probs: Vec<f32> = probs
            .squeeze(0)
            .and_then(|t| t.to_vec1())
            .map_err(|e| ServiceError::Model(format!("Failed to extract mlp output: {e}")))?;

        let positive = if self.output_dim == 1 {
            probs.first()
        } else {
            probs.get(1)
        };
        positive
            .map(|p| f64::from(*p).clamp(0.0, 1.0))
            .ok_or_else(|| ServiceError::Model("mlp produced no output".to_string()))
    }

    fn activate(&self, t: &Tensor) -> candle_core::Result<Tensor> {
        match self.activation {
            Activation::Relu => t.relu(),
            Activation::Tanh => t.tanh(),
            Activation::Logistic => candle_nn::ops::sigmoid(t),
            Activation::Identity => Ok(t.clone()),
        }
    }
}
