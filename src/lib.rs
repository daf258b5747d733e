//! # HemoScan
//!
//! Anemia screening engine.
//!
//! This crate provides:
//! - Rule-based deficiency detection from lab values
//! - Severity classification over a signed, pre-trained model artifact, with
//!   an explainable risk score, safety alerts and follow-up advice
//! - Quick screening from hemoglobin and a few symptoms
//! - Localized, deficiency-driven diet plans
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core screening types and rules (records, severity, risk, diet)
//! - `ports`: Trait definitions for the model and the knowledge base
//! - `adapters`: Concrete implementations (logistic model, JSON knowledge base, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Engine configuration from the environment

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{DeficiencySet, DietPlan, PatientRecord, Severity, SeverityResult};

/// Result type for HemoScan operations
pub type Result<T> = std::result::Result<T, HemoscanError>;

/// Main error type for HemoScan
#[derive(Debug, thiserror::Error)]
pub enum HemoscanError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model error: {0}")]
    Model(#[from] domain::ModelError),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HemoscanError {
    /// Fold a validator's messages into a single error.
    #[must_use]
    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation(errors.join("; "))
    }
}
