//! Domain layer: Core screening types and rules.
//!
//! Pure Rust types with no I/O. Every input type validates itself and every
//! rule here is deterministic.

pub mod deficiency;
pub mod diet;
pub mod model;
pub mod patient;
pub mod quick_screen;
pub mod risk;
pub mod severity;

pub use deficiency::{Deficiency, DeficiencySet, LabValues};
pub use diet::{
    AbsorptionTips, DietPlan, DietRequest, FoodCategory, FoodSuggestion, IronTarget, Language,
    MealPlan, MealSlot,
};
pub use model::{HealthStatus, ModelError, ModelInfo, ModelMetadata, ModelStatistics, Prediction};
pub use patient::{DietQuality, Gender, PatientRecord, FEATURE_NAMES};
pub use quick_screen::QuickScreenRecord;
pub use risk::{Alert, AlertLevel, FindingStatus, FutureRisk, LabFinding, Recommendation, Trend};
pub use severity::{RiskLevel, ScreeningMode, Severity, SeverityResult};
