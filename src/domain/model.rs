//! Model artifact metadata, predictions and reporting types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::severity::Severity;

/// Errors raised while loading a model artifact or running a prediction.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model artifact: {0}")]
    Io(String),

    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("Model signature verification failed: {0}")]
    Signature(String),

    #[error("Unknown feature '{0}' in model artifact")]
    UnknownFeature(String),

    #[error("Feature vector rejected: {0}")]
    InvalidFeatures(String),
}

/// Training metadata stored alongside the model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Held-out accuracy as a fraction (0-1)
    pub accuracy: f64,
    pub training_samples: u64,
    /// Feature name to relative importance
    #[serde(default)]
    pub feature_importance: BTreeMap<String, f64>,
}

/// Raw model output for one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub severity: Severity,
    /// Class probabilities as fractions summing to 1
    pub probabilities: BTreeMap<Severity, f64>,
}

impl Prediction {
    /// Probability of the predicted class.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .get(&self.severity)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Description of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub classes: Vec<Severity>,
    pub features: Vec<String>,
    /// Held-out accuracy (percent)
    pub accuracy: f64,
    pub training_samples: u64,
    pub feature_importance: BTreeMap<String, f64>,
}

/// Summary statistics for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatistics {
    /// Percent
    pub model_accuracy: f64,
    pub total_features: usize,
    pub training_samples: u64,
    pub severity_classes: usize,
    pub feature_importance: BTreeMap<String, f64>,
}

impl From<&ModelInfo> for ModelStatistics {
    fn from(info: &ModelInfo) -> Self {
        Self {
            model_accuracy: info.accuracy,
            total_features: info.features.len(),
            training_samples: info.training_samples,
            severity_classes: info.classes.len(),
            feature_importance: info.feature_importance.clone(),
        }
    }
}

/// Liveness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub service: String,
    pub version: String,
    pub status: String,
    pub model_loaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_from_info() {
        let info = ModelInfo {
            model_type: "multinomial_logistic_regression".into(),
            classes: Severity::ALL.to_vec(),
            features: vec!["hemoglobin".into(), "ferritin".into()],
            accuracy: 94.72,
            training_samples: 5000,
            feature_importance: BTreeMap::from([("hemoglobin".to_string(), 0.7)]),
        };
        let stats = ModelStatistics::from(&info);
        assert_eq!(stats.total_features, 2);
        assert_eq!(stats.severity_classes, 4);
        assert_eq!(stats.model_accuracy, 94.72);
        assert_eq!(stats.training_samples, 5000);
    }

    #[test]
    fn test_confidence_is_probability_of_prediction() {
        let prediction = Prediction {
            severity: Severity::Mild,
            probabilities: BTreeMap::from([
                (Severity::Normal, 0.3),
                (Severity::Mild, 0.6),
                (Severity::Moderate, 0.1),
                (Severity::Severe, 0.0),
            ]),
        };
        assert!((prediction.confidence() - 0.6).abs() < f64::EPSILON);
    }
}
