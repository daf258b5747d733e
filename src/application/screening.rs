//! Screening service: Orchestrates severity classification.
//!
//! This service coordinates:
//! - Input validation (full panel or quick screen)
//! - Feature mapping onto the model's declared order
//! - Model prediction
//! - Explainable risk scoring, alerts and follow-up advice

use std::sync::Arc;

use crate::adapters::logistic::LogisticModel;
use crate::config::EngineConfig;
use crate::domain::risk::{assess_risk, lab_findings, project_future_risk, recommendations, safety_alerts};
use crate::domain::{
    HealthStatus, ModelError, ModelInfo, ModelStatistics, PatientRecord, QuickScreenRecord,
    ScreeningMode, SeverityResult,
};
use crate::ports::SeverityModel;
use crate::{HemoscanError, Result};

/// Quick screens estimate most inputs, so their confidence is discounted.
pub const QUICK_SCREEN_CONFIDENCE_FACTOR: f64 = 0.85;

const SERVICE_NAME: &str = "HemoScan";

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

enum ModelState<M> {
    Ready { model: Arc<M>, info: ModelInfo },
    /// Load failed at startup; recorded once and never retried.
    Unavailable { reason: String },
}

/// Service for classifying patient records.
///
/// The model is fixed at construction. Every method takes `&self`, so one
/// service can be shared across threads behind an `Arc`.
pub struct ScreeningService<M: SeverityModel> {
    state: ModelState<M>,
}

impl ScreeningService<LogisticModel> {
    /// Load the configured model directory.
    ///
    /// A load failure does not fail construction: the service starts in the
    /// unavailable state and every classification reports it.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        match LogisticModel::load(&config.model_dir, &config.model_options) {
            Ok(model) => Self::new(Arc::new(model)),
            Err(e) => {
                tracing::error!(
                    "Failed to load model from {:?}: {e}",
                    config.model_dir
                );
                Self::unavailable(e.to_string())
            }
        }
    }
}

impl<M: SeverityModel> ScreeningService<M> {
    /// Create a service around a loaded model.
    pub fn new(model: Arc<M>) -> Self {
        let info = model.info();
        tracing::info!(
            "Screening service ready ({} features, accuracy {:.2}%)",
            info.features.len(),
            info.accuracy
        );
        Self {
            state: ModelState::Ready { model, info },
        }
    }

    /// Create a service whose model failed to load.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable {
                reason: reason.into(),
            },
        }
    }

    #[must_use]
    pub fn is_model_loaded(&self) -> bool {
        matches!(self.state, ModelState::Ready { .. })
    }

    fn ready(&self) -> Result<(&M, &ModelInfo)> {
        match &self.state {
            ModelState::Ready { model, info } => Ok((model.as_ref(), info)),
            ModelState::Unavailable { reason } => {
                Err(HemoscanError::ModelUnavailable(reason.clone()))
            }
        }
    }

    /// Classify a full blood panel.
    ///
    /// # Errors
    /// Returns `Validation` for out-of-range input and `ModelUnavailable` if
    /// the model did not load.
    pub fn classify(&self, record: &PatientRecord) -> Result<SeverityResult> {
        record.validate().map_err(HemoscanError::validation)?;
        self.evaluate(record, ScreeningMode::Full)
    }

    /// Classify an abbreviated screening record.
    ///
    /// Missing lab values take population averages and hematocrit is
    /// estimated from hemoglobin; the result is marked as a quick screen.
    ///
    /// # Errors
    /// Same as [`Self::classify`].
    pub fn quick_screen(&self, record: QuickScreenRecord) -> Result<SeverityResult> {
        record.validate().map_err(HemoscanError::validation)?;
        let full = record.into_full_record();
        full.validate().map_err(HemoscanError::validation)?;
        self.evaluate(&full, ScreeningMode::Quick)
    }

    fn feature_vector(model: &M, record: &PatientRecord) -> Result<Vec<f64>> {
        model
            .feature_names()
            .iter()
            .map(|name| -> Result<f64> {
                let value = record
                    .feature_value(name)
                    .ok_or_else(|| ModelError::UnknownFeature(name.clone()))?;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(HemoscanError::Validation(format!(
                        "{name} is not a finite number"
                    )))
                }
            })
            .collect()
    }

    fn evaluate(&self, record: &PatientRecord, mode: ScreeningMode) -> Result<SeverityResult> {
        let (model, info) = self.ready()?;

        let features = Self::feature_vector(model, record)?;
        let prediction = model.predict(&features)?;
        let severity = prediction.severity;
        tracing::debug!("Model predicted '{}' ({:?} mode)", severity, mode);

        let discount = match mode {
            ScreeningMode::Full => 1.0,
            ScreeningMode::Quick => QUICK_SCREEN_CONFIDENCE_FACTOR,
        };
        let risk = assess_risk(record);

        let result = SeverityResult {
            severity,
            severity_code: severity.code(),
            confidence: round2(prediction.confidence() * 100.0 * discount),
            probabilities: prediction
                .probabilities
                .iter()
                .map(|(s, p)| (*s, round2(p * 100.0)))
                .collect(),
            model_accuracy: info.accuracy,
            risk_score: risk.score,
            risk_level: risk.level,
            future_risk: project_future_risk(risk.score, record, severity),
            contributing_factors: risk.factors,
            risk_factors: lab_findings(record, mode),
            recommendations: recommendations(severity, record),
            alerts: safety_alerts(record, severity),
            screening_mode: mode,
        };

        tracing::info!(
            "Classified severity '{}' (risk score {:.1}, {} alerts, mode {:?})",
            result.severity,
            result.risk_score,
            result.alerts.len(),
            mode
        );
        Ok(result)
    }

    /// Metadata of the loaded model.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the model did not load.
    pub fn model_info(&self) -> Result<ModelInfo> {
        self.ready().map(|(_, info)| info.clone())
    }

    /// Dashboard statistics for the loaded model.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the model did not load.
    pub fn statistics(&self) -> Result<ModelStatistics> {
        self.ready().map(|(_, info)| ModelStatistics::from(info))
    }

    #[must_use]
    pub fn health(&self) -> HealthStatus {
        let model_loaded = self.is_model_loaded();
        HealthStatus {
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: if model_loaded { "healthy" } else { "degraded" }.to_string(),
            model_loaded,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::logistic::tests::bundled_model;
    use crate::domain::patient::tests::sample_record;
    use crate::domain::{AlertLevel, DietQuality, Gender, RiskLevel, Severity};
    use std::path::PathBuf;

    pub(crate) fn service() -> ScreeningService<LogisticModel> {
        ScreeningService::new(Arc::new(bundled_model()))
    }

    fn quick(hemoglobin: f64) -> QuickScreenRecord {
        QuickScreenRecord {
            age: 24,
            gender: Gender::Female,
            hemoglobin,
            fatigue: true,
            pale_skin: false,
            dizziness: true,
            diet_quality: DietQuality::Poor,
            pregnancy: false,
        }
    }

    #[test]
    fn test_classify_full_panel() {
        let record = PatientRecord {
            hemoglobin: 10.5,
            ..sample_record()
        };
        let result = service().classify(&record).expect("Should classify");
        assert_eq!(result.severity, Severity::Mild);
        assert_eq!(result.severity_code, 1);
        assert_eq!(result.screening_mode, ScreeningMode::Full);
        assert!(result.confidence > 50.0 && result.confidence <= 100.0);
        let total: f64 = result.probabilities.values().sum();
        assert!((total - 100.0).abs() < 0.05);
        assert_eq!(result.model_accuracy, 94.72);
        assert_eq!(result.risk_factors.len(), 9);
        assert!(result.contributing_factors.contains_key("low_hemoglobin"));
        assert!((0.0..=100.0).contains(&result.risk_score));
    }

    #[test]
    fn test_quick_screen_is_marked_and_discounted() {
        let svc = service();
        let quick_result = svc.quick_screen(quick(9.0)).expect("Should classify");
        assert_eq!(quick_result.severity, Severity::Moderate);
        assert_eq!(quick_result.screening_mode, ScreeningMode::Quick);
        assert_eq!(quick_result.risk_factors.len(), 1);

        let full_result = svc
            .classify(&quick(9.0).into_full_record())
            .expect("Should classify");
        let expected = full_result.confidence * QUICK_SCREEN_CONFIDENCE_FACTOR;
        assert!((quick_result.confidence - expected).abs() < 0.02);
        assert_eq!(quick_result.probabilities, full_result.probabilities);
    }

    #[test]
    fn test_critical_values_alert() {
        let record = PatientRecord {
            hemoglobin: 6.5,
            hematocrit: 20.0,
            iron_level: 25.0,
            ferritin: 6.0,
            mcv: 68.0,
            rbc_count: 2.8,
            fatigue: true,
            pale_skin: true,
            shortness_of_breath: true,
            dizziness: true,
            ..sample_record()
        };
        let result = service().classify(&record).expect("Should classify");
        assert_eq!(result.severity, Severity::Severe);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert!(result
            .alerts
            .iter()
            .filter(|a| a.level == AlertLevel::Critical)
            .count()
            >= 2);
        assert!(!result.future_risk.preventable);
    }

    #[test]
    fn test_every_label_reachable_and_score_bounded() {
        let svc = service();
        let mut seen = std::collections::BTreeSet::new();
        for tenths in 30..=200 {
            let record = PatientRecord {
                hemoglobin: f64::from(tenths) / 10.0,
                ..sample_record()
            };
            let result = svc.classify(&record).expect("Should classify");
            assert!((0.0..=100.0).contains(&result.risk_score));
            seen.insert(result.severity);
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_invalid_input_rejected_before_model() {
        let record = PatientRecord {
            hemoglobin: f64::NAN,
            ..sample_record()
        };
        let err = service().classify(&record).expect_err("must fail");
        assert!(matches!(err, HemoscanError::Validation(_)));

        let err = service().quick_screen(quick(30.0)).expect_err("must fail");
        assert!(matches!(err, HemoscanError::Validation(_)));
    }

    #[test]
    fn test_unavailable_model_fails_fast() {
        let svc: ScreeningService<LogisticModel> = ScreeningService::unavailable("no artifact");
        let err = svc.classify(&sample_record()).expect_err("must fail");
        assert!(matches!(err, HemoscanError::ModelUnavailable(_)));
        assert!(matches!(
            svc.quick_screen(quick(11.0)),
            Err(HemoscanError::ModelUnavailable(_))
        ));
        assert!(svc.model_info().is_err());
        assert!(svc.statistics().is_err());

        let health = svc.health();
        assert!(!health.model_loaded);
        assert_eq!(health.status, "degraded");
    }

    #[test]
    fn test_reporting() {
        let svc = service();
        let stats = svc.statistics().expect("Should report");
        assert_eq!(stats.severity_classes, 4);
        assert_eq!(stats.total_features, 20);
        assert_eq!(stats.training_samples, 5000);
        assert_eq!(svc.model_info().expect("Should report").accuracy, 94.72);
        assert!(svc.health().model_loaded);
    }

    #[test]
    fn test_from_config_records_load_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = EngineConfig {
            model_dir: temp.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let svc = ScreeningService::from_config(&config);
        assert!(!svc.is_model_loaded());

        let config = EngineConfig {
            model_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models"),
            ..EngineConfig::default()
        };
        assert!(ScreeningService::from_config(&config).is_model_loaded());
    }

    #[test]
    fn test_concurrent_classification_is_consistent() {
        let svc = service();
        let record = PatientRecord {
            hemoglobin: 9.8,
            ferritin: 15.0,
            ..sample_record()
        };
        let expected = svc.classify(&record).expect("Should classify");
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| svc.classify(&record).expect("Should classify")))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().expect("thread"), expected);
            }
        });
    }
}
