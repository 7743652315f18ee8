//! Least-squares baseline forecaster over a fixed feature layout

use serde::{Deserialize, Serialize};

use crate::domain::model_store::ModelArtifact;
use crate::domain::DomainError;

use super::features::{FeatureSet, TrainingExample};

const MODEL_KIND: &str = "linear_lag_forecaster";

/// `label ≈ intercept + Σ coefficients[i] * features[i]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearForecaster {
    kind: String,
    #[serde(default)]
    pub feature_set: FeatureSet,
    pub intercept: f64,
    /// One coefficient per feature, in `feature_set` order
    pub coefficients: Vec<f64>,
    pub trained_rows: usize,
}

impl LinearForecaster {
    /// Fits ordinary least squares through the normal equations
    pub fn fit(feature_set: FeatureSet, examples: &[TrainingExample]) -> Result<Self, DomainError> {
        let width = feature_set.width();
        let params = width + 1;

        if examples.len() < params {
            return Err(DomainError::validation(format!(
                "need at least {} rows to fit {} features, got {}",
                params,
                width,
                examples.len()
            )));
        }

        let mut xtx = vec![vec![0.0f64; params]; params];
        let mut xty = vec![0.0f64; params];

        for example in examples {
            if example.features.len() != width {
                return Err(DomainError::validation(format!(
                    "row for '{}' at {} has {} features, expected {}",
                    example.entity_id,
                    example.week_start,
                    example.features.len(),
                    width
                )));
            }

            let x: Vec<f64> = std::iter::once(1.0)
                .chain(example.features.iter().copied())
                .collect();
            for i in 0..params {
                xty[i] += x[i] * example.label;
                for j in 0..params {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }

        let solution = solve(xtx, xty).ok_or_else(|| {
            DomainError::validation("features are collinear; cannot fit a unique model")
        })?;

        Ok(Self {
            kind: MODEL_KIND.to_string(),
            feature_set,
            intercept: solution[0],
            coefficients: solution[1..].to_vec(),
            trained_rows: examples.len(),
        })
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64, DomainError> {
        if features.len() != self.coefficients.len() {
            return Err(DomainError::validation(format!(
                "model expects {} features, got {}",
                self.coefficients.len(),
                features.len()
            )));
        }

        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>())
    }

    /// Predicts the label of every example, in order
    pub fn predict_examples(&self, examples: &[TrainingExample]) -> Result<Vec<f64>, DomainError> {
        examples.iter().map(|e| self.predict(&e.features)).collect()
    }

    pub fn to_artifact(&self) -> Result<ModelArtifact, DomainError> {
        let bytes = serde_json::to_vec(self).map_err(|e| {
            DomainError::serialization(format!("Failed to serialize model: {}", e))
        })?;
        Ok(ModelArtifact::from(bytes))
    }

    pub fn from_artifact(artifact: &ModelArtifact) -> Result<Self, DomainError> {
        let model: Self = serde_json::from_slice(artifact.as_bytes()).map_err(|e| {
            DomainError::serialization(format!("Failed to deserialize model: {}", e))
        })?;

        if model.kind != MODEL_KIND {
            return Err(DomainError::serialization(format!(
                "Unexpected model kind '{}'",
                model.kind
            )));
        }
        if model.coefficients.len() != model.feature_set.width() {
            return Err(DomainError::serialization(format!(
                "model has {} coefficients for {} features",
                model.coefficients.len(),
                model.feature_set.width()
            )));
        }

        Ok(model)
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = a
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0f64, |m, v| m.max(v.abs()));
    let eps = scale.max(1.0) * 1e-12;

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < eps {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0f64; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    Some(x)
}
