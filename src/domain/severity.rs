//! Severity classification and the full screening result.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::risk::{Alert, FutureRisk, LabFinding, Recommendation};

/// Ordinal anemia severity: Normal < Mild < Moderate < Severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Mild Anemia")]
    Mild,
    #[serde(rename = "Moderate Anemia")]
    Moderate,
    #[serde(rename = "Severe Anemia")]
    Severe,
}

impl Severity {
    /// All labels in scale order. Model artifacts list classes in this order.
    pub const ALL: [Self; 4] = [Self::Normal, Self::Mild, Self::Moderate, Self::Severe];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Mild => "Mild Anemia",
            Self::Moderate => "Moderate Anemia",
            Self::Severe => "Severe Anemia",
        }
    }

    /// Position on the scale (0-3).
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Mild => 1,
            Self::Moderate => 2,
            Self::Severe => 3,
        }
    }

    #[must_use]
    pub fn from_code(code: usize) -> Option<Self> {
        Self::ALL.get(code).copied()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sev| sev.label() == s.trim())
            .ok_or_else(|| {
                format!(
                    "unknown severity '{s}' (expected one of: Normal, Mild Anemia, Moderate Anemia, Severe Anemia)"
                )
            })
    }
}

/// Risk band derived from the explainable risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// Band for a 0-100 risk score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            Self::Low
        } else if score < 60.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Moderate => write!(f, "Moderate"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Which input path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningMode {
    /// Complete blood panel supplied by the caller.
    Full,
    /// Abbreviated input expanded with defaults; lower confidence.
    Quick,
}

/// Output of the severity/risk classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityResult {
    /// Predicted severity label
    #[serde(rename = "severity_label")]
    pub severity: Severity,

    /// Position of the label on the severity scale (0-3)
    #[serde(rename = "severity")]
    pub severity_code: u8,

    /// Model confidence in the predicted label (percent)
    pub confidence: f64,

    /// Per-label probabilities (percent)
    pub probabilities: BTreeMap<Severity, f64>,

    /// Held-out accuracy of the model artifact (percent)
    pub model_accuracy: f64,

    /// Explainable risk score (0-100)
    pub risk_score: f64,

    pub risk_level: RiskLevel,

    /// Contributing factor name to points added to the risk score
    pub contributing_factors: BTreeMap<String, f64>,

    /// Lab values compared with their normal ranges
    pub risk_factors: Vec<LabFinding>,

    pub future_risk: FutureRisk,

    pub recommendations: Vec<Recommendation>,

    /// Values outside clinically safe bounds
    pub alerts: Vec<Alert>,

    pub screening_mode: ScreeningMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_roundtrip_through_from_str() {
        for severity in Severity::ALL {
            assert_eq!(severity.label().parse::<Severity>(), Ok(severity));
        }
        assert!("Mild".parse::<Severity>().is_err());
        assert!("severe anemia".parse::<Severity>().is_err());
    }

    #[test]
    fn test_scale_is_ordered() {
        assert!(Severity::Normal < Severity::Mild);
        assert!(Severity::Mild < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Severe);
        assert_eq!(Severity::from_code(2), Some(Severity::Moderate));
        assert_eq!(Severity::from_code(4), None);
    }

    #[test]
    fn test_risk_level_from_score() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(29.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::High);
    }

    #[test]
    fn test_probability_map_serializes_with_labels() {
        let mut probabilities = BTreeMap::new();
        probabilities.insert(Severity::Severe, 10.0);
        probabilities.insert(Severity::Normal, 90.0);
        let json = serde_json::to_string(&probabilities).expect("Should serialize");
        assert_eq!(json, r#"{"Normal":90.0,"Severe Anemia":10.0}"#);
    }
}
