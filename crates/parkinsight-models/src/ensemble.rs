//! Ad-hoc ensemble over whichever models answered a `predict_all` request.

use parkinsight_core::ModelPrediction;
use serde::Serialize;

/// Agreement statistics across individual model predictions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleSummary {
    /// Number of models that produced a prediction.
    pub total_models: usize,
    /// Rounded mean of the binary labels (ties resolve to 0).
    pub consensus_prediction: u8,
    /// Mean positive-class probability.
    pub average_probability: f64,
    /// Population standard deviation of the probabilities.
    pub probability_std: f64,
    /// Fraction of models predicting the positive class.
    pub agreement_ratio: f64,
}

/// Unweighted average of the member probabilities.
///
/// Confidence is the mean member confidence rather than the confidence of
/// the averaged probability. Returns `None` for an empty slice.
#[must_use]
pub fn average_prediction(predictions: &[ModelPrediction]) -> Option<ModelPrediction> {
    if predictions.is_empty() {
        return None;
    }
    let n = predictions.len() as f64;
    let probability = predictions.iter().map(|p| p.probability).sum::<f64>() / n;
    let confidence = predictions.iter().map(|p| p.confidence).sum::<f64>() / n;
    Some(ModelPrediction {
        confidence,
        ..ModelPrediction::from_probability(probability)
    })
}

/// Summary statistics; `None` for an empty slice.
#[must_use]
pub fn summarize(predictions: &[ModelPrediction]) -> Option<EnsembleSummary> {
    if predictions.is_empty() {
        return None;
    }
    let n = predictions.len() as f64;
    let positive = predictions.iter().filter(|p| p.prediction == 1).count() as f64;
    let label_mean = positive / n;
    let mean = predictions.iter().map(|p| p.probability).sum::<f64>() / n;
    let variance = predictions
        .iter()
        .map(|p| (p.probability - mean).powi(2))
        .sum::<f64>()
        / n;

    Some(EnsembleSummary {
        total_models: predictions.len(),
        // Half-to-even rounding on [0, 1]: only strictly above 0.5 rounds up.
        consensus_prediction: u8::from(label_mean > 0.5),
        average_probability: mean,
        probability_std: variance.sqrt(),
        agreement_ratio: label_mean,
    })
}
