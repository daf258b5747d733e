//! Logistic adapter: Implementation of SeverityModel over an exported
//! multinomial logistic-regression artifact.
//!
//! # Security
//!
//! - Model directories are verified via Ed25519-signed manifests
//! - Only artifact files bound by the verified manifest are read
//! - In release builds, ALL models MUST have valid signatures
//!
//! # Inference
//!
//! Features are standardized with the exported scaler, one logit is computed
//! per severity class, and a numerically stable softmax turns logits into
//! probabilities. The artifact is validated once at load and immutable after.

pub mod manifest;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{ModelError, ModelInfo, ModelMetadata, Prediction, Severity, FEATURE_NAMES};
use crate::ports::SeverityModel;

pub use manifest::{ModelLoadOptions, SignedModelManifest, MODEL_FILE};

pub const MODEL_TYPE: &str = "multinomial_logistic_regression";
const FORMAT_VERSION: u32 = 1;

/// Model parameters exported by the training pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedModel {
    pub format_version: u32,
    pub model_type: String,
    /// Class labels in severity-scale order
    pub classes: Vec<String>,
    pub feature_names: Vec<String>,
    pub scaler_mean: Vec<f64>,
    pub scaler_std: Vec<f64>,
    /// One row per class, one column per feature
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    pub metadata: ModelMetadata,
}

fn invalid(msg: impl Into<String>) -> ModelError {
    ModelError::InvalidArtifact(msg.into())
}

impl ExportedModel {
    /// Check shapes, labels, feature names and numeric sanity.
    fn validate(&self) -> Result<(), ModelError> {
        if self.format_version != FORMAT_VERSION {
            return Err(invalid(format!(
                "unsupported format_version {}",
                self.format_version
            )));
        }
        if self.model_type != MODEL_TYPE {
            return Err(invalid(format!("unsupported model_type '{}'", self.model_type)));
        }

        let expected: Vec<&str> = Severity::ALL.iter().map(|s| s.label()).collect();
        if self.classes.iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(invalid(format!(
                "classes must be exactly {expected:?} in order, got {:?}",
                self.classes
            )));
        }

        let n = self.feature_names.len();
        if n == 0 {
            return Err(invalid("feature_names is empty"));
        }
        let mut seen = BTreeSet::new();
        for name in &self.feature_names {
            if !FEATURE_NAMES.contains(&name.as_str()) {
                return Err(ModelError::UnknownFeature(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("duplicate feature '{name}'")));
            }
        }

        if self.scaler_mean.len() != n || self.scaler_std.len() != n {
            return Err(invalid("scaler lengths do not match feature_names length"));
        }
        if self.coefficients.len() != self.classes.len()
            || self.intercepts.len() != self.classes.len()
        {
            return Err(invalid("coefficients and intercepts need one entry per class"));
        }
        if self.coefficients.iter().any(|row| row.len() != n) {
            return Err(invalid("coefficient rows do not match feature_names length"));
        }

        let all_finite = self
            .scaler_mean
            .iter()
            .chain(&self.scaler_std)
            .chain(self.coefficients.iter().flatten())
            .chain(&self.intercepts)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(invalid("non-finite model parameter"));
        }
        if let Some(i) = self.scaler_std.iter().position(|s| *s <= 0.0) {
            return Err(invalid(format!(
                "scaler_std for '{}' must be > 0",
                self.feature_names[i]
            )));
        }
        if !(0.0..=1.0).contains(&self.metadata.accuracy) {
            return Err(invalid("metadata.accuracy must be a fraction in [0, 1]"));
        }
        Ok(())
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Validated, read-only logistic-regression classifier.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    model: ExportedModel,
}

impl LogisticModel {
    /// Load `severity_model.json` from a verified model directory.
    ///
    /// # Errors
    /// Returns an error if verification fails or the artifact is malformed.
    pub fn load(model_dir: &Path, options: &ModelLoadOptions) -> Result<Self, ModelError> {
        manifest::verify_model_dir(model_dir, options)?;

        let model_path = model_dir.join(MODEL_FILE);
        let content = fs::read_to_string(&model_path).map_err(|e| {
            ModelError::Io(format!("{}: {e}", model_path.display()))
        })?;
        let model = Self::from_json(&content)?;

        tracing::info!(
            "Loaded model from {:?} (classes={}, n_features={})",
            model_path,
            model.model.classes.len(),
            model.model.feature_names.len()
        );
        Ok(model)
    }

    /// Parse and validate an artifact held in memory.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidArtifact` for malformed JSON or parameters.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let model: ExportedModel =
            serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
        Self::from_exported(model)
    }

    /// # Errors
    /// Returns an error if the parameters fail validation.
    pub fn from_exported(model: ExportedModel) -> Result<Self, ModelError> {
        model.validate()?;
        Ok(Self { model })
    }

    fn logits(&self, features: &[f64]) -> Vec<f64> {
        let m = &self.model;
        let standardized: Vec<f64> = features
            .iter()
            .zip(m.scaler_mean.iter().zip(&m.scaler_std))
            .map(|(x, (mean, std))| (x - mean) / std)
            .collect();

        m.coefficients
            .iter()
            .zip(&m.intercepts)
            .map(|(row, intercept)| {
                intercept + row.iter().zip(&standardized).map(|(c, x)| c * x).sum::<f64>()
            })
            .collect()
    }
}

impl SeverityModel for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.model.feature_names
    }

    fn predict(&self, features: &[f64]) -> Result<Prediction, ModelError> {
        let n = self.model.feature_names.len();
        if features.len() != n {
            return Err(ModelError::InvalidFeatures(format!(
                "feature count mismatch: got {}, expected {n}",
                features.len()
            )));
        }
        if let Some(i) = features.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::InvalidFeatures(format!(
                "'{}' is not a finite number",
                self.model.feature_names[i]
            )));
        }

        let probabilities = softmax(&self.logits(features));
        // Ties resolve to the less severe class.
        let mut best = 0;
        for (i, p) in probabilities.iter().enumerate() {
            if *p > probabilities[best] {
                best = i;
            }
        }
        let severity = Severity::from_code(best)
            .ok_or_else(|| invalid(format!("class index {best} out of range")))?;

        Ok(Prediction {
            severity,
            probabilities: Severity::ALL.into_iter().zip(probabilities).collect(),
        })
    }

    fn info(&self) -> ModelInfo {
        let m = &self.model;
        ModelInfo {
            model_type: m.model_type.clone(),
            classes: Severity::ALL.to_vec(),
            features: m.feature_names.clone(),
            accuracy: (m.metadata.accuracy * 10_000.0).round() / 100.0,
            training_samples: m.metadata.training_samples,
            feature_importance: m.metadata.feature_importance.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::manifest::tests::{fresh_signing_key, trusting};
    use super::manifest::{make_nonce_b64, sign_model_dir};
    use super::*;
    use crate::domain::patient::tests::sample_record;
    use crate::domain::{Gender, PatientRecord};
    use tempfile::tempdir;

    pub(crate) const BUNDLED_MODEL: &str = include_str!("../../../models/severity_model.json");

    pub(crate) fn bundled_model() -> LogisticModel {
        LogisticModel::from_json(BUNDLED_MODEL).expect("Should parse bundled model")
    }

    fn features(model: &LogisticModel, record: &PatientRecord) -> Vec<f64> {
        model
            .feature_names()
            .iter()
            .map(|name| record.feature_value(name).expect("Should be known"))
            .collect()
    }

    fn predict(record: &PatientRecord) -> Prediction {
        let model = bundled_model();
        model
            .predict(&features(&model, record))
            .expect("Should predict")
    }

    fn exported() -> ExportedModel {
        serde_json::from_str(BUNDLED_MODEL).expect("Should parse")
    }

    #[test]
    fn test_bundled_model_severity_bands() {
        let at = |hemoglobin: f64| {
            predict(&PatientRecord {
                hemoglobin,
                ..sample_record()
            })
            .severity
        };
        assert_eq!(at(14.0), Severity::Normal);
        assert_eq!(at(12.0), Severity::Normal);
        assert_eq!(at(10.5), Severity::Mild);
        assert_eq!(at(9.0), Severity::Moderate);
        assert_eq!(at(6.0), Severity::Severe);
    }

    #[test]
    fn test_male_threshold_is_higher() {
        let male = PatientRecord {
            gender: Gender::Male,
            ..sample_record()
        };
        assert_eq!(predict(&male).severity, Severity::Mild);

        let healthy_male = PatientRecord {
            gender: Gender::Male,
            hemoglobin: 15.2,
            hematocrit: 45.0,
            rbc_count: 5.2,
            ..sample_record()
        };
        let prediction = predict(&healthy_male);
        assert_eq!(prediction.severity, Severity::Normal);
        assert!(prediction.confidence() > 0.95);
    }

    #[test]
    fn test_probabilities_form_distribution() {
        let prediction = predict(&sample_record());
        assert_eq!(prediction.probabilities.len(), 4);
        let total: f64 = prediction.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(prediction.probabilities.values().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_non_finite_features_rejected() {
        let model = bundled_model();
        let mut vector = features(&model, &sample_record());
        vector[2] = f64::NAN;
        let err = model.predict(&vector).expect_err("must fail");
        assert!(matches!(err, ModelError::InvalidFeatures(_)));
        assert!(err.to_string().contains("hemoglobin"));

        let err = model.predict(&vector[..5]).expect_err("must fail");
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_invalid_artifacts_rejected() {
        let mut zero_std = exported();
        zero_std.scaler_std[3] = 0.0;
        assert!(LogisticModel::from_exported(zero_std).is_err());

        let mut unknown = exported();
        unknown.feature_names[0] = "cholesterol".into();
        assert!(matches!(
            LogisticModel::from_exported(unknown),
            Err(ModelError::UnknownFeature(_))
        ));

        let mut reordered = exported();
        reordered.classes.swap(0, 1);
        assert!(LogisticModel::from_exported(reordered).is_err());

        let mut short_row = exported();
        short_row.coefficients[1].pop();
        assert!(LogisticModel::from_exported(short_row).is_err());

        let mut percent_accuracy = exported();
        percent_accuracy.metadata.accuracy = 94.72;
        assert!(LogisticModel::from_exported(percent_accuracy).is_err());

        assert!(LogisticModel::from_json("{not json").is_err());
    }

    #[test]
    fn test_info_reports_percent_accuracy() {
        let info = bundled_model().info();
        assert_eq!(info.accuracy, 94.72);
        assert_eq!(info.features.len(), 20);
        assert_eq!(info.training_samples, 5000);
        assert_eq!(info.classes, Severity::ALL.to_vec());
        let importance: f64 = info.feature_importance.values().sum();
        assert!((importance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bundled_directory_verifies_with_embedded_key() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
        let model =
            LogisticModel::load(&dir, &ModelLoadOptions::default()).expect("Should load");
        assert_eq!(model.feature_names().len(), 20);
    }

    #[test]
    fn test_load_signed_directory() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join(MODEL_FILE), BUNDLED_MODEL).expect("write model");
        let key = fresh_signing_key();
        sign_model_dir(temp.path(), &[MODEL_FILE], &key, 3, make_nonce_b64())
            .expect("Should sign");

        let model = LogisticModel::load(temp.path(), &trusting(&key)).expect("Should load");
        assert_eq!(model.info().training_samples, 5000);
    }

    #[test]
    fn test_load_fails_if_manifest_references_missing_model_file() {
        let temp = tempdir().expect("tempdir");
        let model_path = temp.path().join(MODEL_FILE);
        std::fs::write(&model_path, BUNDLED_MODEL).expect("write model");
        let key = fresh_signing_key();
        sign_model_dir(temp.path(), &[MODEL_FILE], &key, 1, make_nonce_b64())
            .expect("Should sign");
        std::fs::remove_file(&model_path).expect("remove model");

        let err = LogisticModel::load(temp.path(), &trusting(&key)).expect_err("must fail");
        let msg = err.to_string();
        assert!(msg.contains("missing") || msg.contains("unreadable"));
    }

    #[test]
    fn test_softmax_is_shift_invariant() {
        let a = softmax(&[1.0, 2.0, 3.0]);
        let b = softmax(&[1001.0, 1002.0, 1003.0]);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12);
        }
    }
}
