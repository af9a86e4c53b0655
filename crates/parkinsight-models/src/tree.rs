//! Decision-tree ensembles (random forest, extra trees, boosting).
//!
//! Trees are stored as flat node arrays with the root at index 0. A split
//! sends a sample left when `x[feature] <= threshold`. Leaves hold the
//! per-tree output; how those outputs are combined depends on the
//! ensemble's [`Aggregation`].

use parkinsight_core::{Result, ServiceError, SCHEMA_LEN};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// A single node of a decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Internal node.
    Split {
        /// Feature column tested.
        feature: usize,
        /// Go left when `x[feature] <= threshold`.
        threshold: f64,
        /// Index of the left child.
        left: usize,
        /// Index of the right child.
        right: usize,
    },
    /// Terminal node.
    Leaf {
        /// Tree output for samples reaching this leaf.
        value: f64,
    },
}

/// A decision tree as a flat node array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Nodes, root first.
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(ServiceError::Model("tree has no nodes".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(ServiceError::Model(format!(
                            "node {idx} tests feature {feature}, model has {n_features}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ServiceError::Model(format!(
                            "node {idx} has a non-finite threshold"
                        )));
                    }
                    // Children must come after their parent, which rules out cycles.
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(ServiceError::Model(format!(
                                "node {idx} points to invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(ServiceError::Model(format!(
                            "leaf {idx} has a non-finite value"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk the tree for one sample. Assumes a validated tree.
    #[must_use]
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    fn split_features(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter_map(|n| match n {
            TreeNode::Split { feature, .. } => Some(*feature),
            TreeNode::Leaf { .. } => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Ensembles
// ---------------------------------------------------------------------------

/// How per-tree outputs become a positive-class probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Aggregation {
    /// Leaves hold class-1 probabilities; the ensemble averages them.
    Average,
    /// Leaves hold log-odds increments: `sigmoid(init + learning_rate * sum)`.
    GradientBoosting {
        /// Initial log-odds.
        init: f64,
        /// Shrinkage applied to every tree.
        learning_rate: f64,
    },
    /// Leaves hold class-1 probabilities; the ensemble takes a weighted mean.
    Weighted {
        /// One non-negative weight per tree.
        weights: Vec<f64>,
    },
}

/// An ensemble of decision trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    /// Input width the trees were trained on.
    pub n_features: usize,
    /// Member trees.
    pub trees: Vec<DecisionTree>,
    /// Output combination rule.
    pub aggregation: Aggregation,
    /// Impurity-based importances exported with the model, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<f64>>,
}

impl TreeEnsemble {
    /// Check structure against the schema width.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Model`] for any inconsistency.
    pub fn validate(&self) -> Result<()> {
        if self.n_features != SCHEMA_LEN {
            return Err(ServiceError::Model(format!(
                "tree ensemble expects {} features, schema has {SCHEMA_LEN}",
                self.n_features
            )));
        }
        if self.trees.is_empty() {
            return Err(ServiceError::Model("tree ensemble has no trees".to_string()));
        }
        for tree in &self.trees {
            tree.validate(self.n_features)?;
        }
        match &self.aggregation {
            Aggregation::Average => {}
            Aggregation::GradientBoosting {
                init,
                learning_rate,
            } => {
                if !init.is_finite() || !learning_rate.is_finite() {
                    return Err(ServiceError::Model(
                        "gradient boosting parameters must be finite".to_string(),
                    ));
                }
            }
            Aggregation::Weighted { weights } => {
                if weights.len() != self.trees.len() {
                    return Err(ServiceError::Model(format!(
                        "{} tree weights for {} trees",
                        weights.len(),
                        self.trees.len()
                    )));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0)
                    || weights.iter().sum::<f64>() <= 0.0
                {
                    return Err(ServiceError::Model(
                        "tree weights must be non-negative with a positive sum".to_string(),
                    ));
                }
            }
        }
        if let Some(importances) = &self.feature_importances {
            if importances.len() != self.n_features {
                return Err(ServiceError::Model(format!(
                    "{} feature importances for {} features",
                    importances.len(),
                    self.n_features
                )));
            }
        }
        Ok(())
    }

    /// Positive-class probability for one (scaled) sample.
    #[must_use]
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let outputs = self.trees.iter().map(|t| t.evaluate(x));
        let p = match &self.aggregation {
            Aggregation::Average => outputs.sum::<f64>() / self.trees.len() as f64,
            Aggregation::GradientBoosting {
                init,
                learning_rate,
            } => sigmoid(init + learning_rate * outputs.sum::<f64>()),
            Aggregation::Weighted { weights } => {
                let total: f64 = weights.iter().sum();
                outputs.zip(weights).map(|(o, w)| o * w).sum::<f64>() / total
            }
        };
        p.clamp(0.0, 1.0)
    }

    /// Per-feature importances: the exported ones, else normalised split counts.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        if let Some(importances) = &self.feature_importances {
            return importances.clone();
        }
        let mut counts = vec![0.0; self.n_features];
        for tree in &self.trees {
            for feature in tree.split_features() {
                counts[feature] += 1.0;
            }
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in &mut counts {
                *c /= total;
            }
        }
        counts
    }

    /// Stand-in forest of 10 decision stumps fitted on 10 random rows.
    ///
    /// Each stump splits a random feature at its median over the random rows;
    /// leaves hold the fraction of positive random labels on each side.
    pub fn stand_in<R: Rng>(rng: &mut R) -> Self {
        const ROWS: usize = 10;
        let rows: Vec<[f64; SCHEMA_LEN]> = (0..ROWS)
            .map(|_| std::array::from_fn(|_| rng.gen::<f64>()))
            .collect();
        let labels: Vec<f64> = (0..ROWS).map(|_| f64::from(rng.gen_range(0..2u8))).collect();

        let trees = (0..10)
            .map(|_| {
                let feature = rng.gen_range(0..SCHEMA_LEN);
                let mut column: Vec<f64> = rows.iter().map(|r| r[feature]).collect();
                column.sort_by(f64::total_cmp);
                let threshold = (column[ROWS / 2 - 1] + column[ROWS / 2]) / 2.0;

                let side_rate = |goes_left: bool| {
                    let side: Vec<f64> = rows
                        .iter()
                        .zip(&labels)
                        .filter(|(r, _)| (r[feature] <= threshold) == goes_left)
                        .map(|(_, y)| *y)
                        .collect();
                    if side.is_empty() {
                        0.5
                    } else {
                        side.iter().sum::<f64>() / side.len() as f64
                    }
                };

                DecisionTree {
                    nodes: vec![
                        TreeNode::Split {
                            feature,
                            threshold,
                            left: 1,
                            right: 2,
                        },
                        TreeNode::Leaf {
                            value: side_rate(true),
                        },
                        TreeNode::Leaf {
                            value: side_rate(false),
                        },
                    ],
                }
            })
            .collect();

        Self {
            n_features: SCHEMA_LEN,
            trees,
            aggregation: Aggregation::Average,
            feature_importances: None,
        }
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
