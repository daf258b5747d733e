//! Severity model port: the opaque statistical predictor.

use crate::domain::{ModelError, ModelInfo, Prediction};

/// A trained classifier mapping a feature vector to a severity label.
///
/// Implementations are immutable once constructed and shared read-only
/// between concurrent requests.
pub trait SeverityModel: Send + Sync {
    /// Feature names in the order `predict` expects them.
    fn feature_names(&self) -> &[String];

    /// Predict the severity class and per-class probabilities.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidFeatures` if the vector has the wrong
    /// length or contains a non-finite value.
    fn predict(&self, features: &[f64]) -> Result<Prediction, ModelError>;

    /// Metadata describing the loaded artifact.
    fn info(&self) -> ModelInfo;
}
