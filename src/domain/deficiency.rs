//! Rule-based deficiency detection from lab values.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::patient::Gender;
use super::severity::Severity;

/// Serum iron (µg/dL) below which iron is considered low.
pub const LOW_IRON_THRESHOLD: f64 = 60.0;

/// Serum ferritin (ng/mL) below which iron stores are considered depleted.
pub const LOW_FERRITIN_THRESHOLD: f64 = 20.0;

/// A nutritional or clinical shortfall inferred from lab values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deficiency {
    LowHemoglobin,
    LowIron,
    LowFerritin,
}

impl Deficiency {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LowHemoglobin => "low_hemoglobin",
            Self::LowIron => "low_iron",
            Self::LowFerritin => "low_ferritin",
        }
    }
}

impl fmt::Display for Deficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lab values the detector reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabValues {
    pub hemoglobin: f64,
    pub iron_level: f64,
    pub ferritin: f64,
    pub gender: Gender,
}

/// Set of detected deficiencies. Empty means none was identified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeficiencySet(BTreeSet<Deficiency>);

impl DeficiencySet {
    /// Evaluate every threshold rule against the lab values.
    #[must_use]
    pub fn detect(labs: &LabValues) -> Self {
        let mut set = BTreeSet::new();
        if labs.hemoglobin < labs.gender.hemoglobin_threshold() {
            set.insert(Deficiency::LowHemoglobin);
        }
        if labs.iron_level < LOW_IRON_THRESHOLD {
            set.insert(Deficiency::LowIron);
        }
        if labs.ferritin < LOW_FERRITIN_THRESHOLD {
            set.insert(Deficiency::LowFerritin);
        }
        Self(set)
    }

    /// Detect deficiencies, assuming low hemoglobin and low iron when an
    /// anemic severity comes with labs that show nothing.
    ///
    /// The assumption only fills an empty set; detected deficiencies are
    /// never replaced.
    #[must_use]
    pub fn detect_with_fallback(labs: &LabValues, severity: Severity) -> Self {
        let detected = Self::detect(labs);
        if severity != Severity::Normal && detected.is_empty() {
            tracing::debug!(
                "No deficiency detected for severity '{}', assuming low_hemoglobin and low_iron",
                severity
            );
            return Self::from_iter([Deficiency::LowHemoglobin, Deficiency::LowIron]);
        }
        detected
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn contains(&self, deficiency: Deficiency) -> bool {
        self.0.contains(&deficiency)
    }

    pub fn iter(&self) -> impl Iterator<Item = Deficiency> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Deficiency> for DeficiencySet {
    fn from_iter<I: IntoIterator<Item = Deficiency>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labs(hemoglobin: f64, iron_level: f64, ferritin: f64, gender: Gender) -> LabValues {
        LabValues {
            hemoglobin,
            iron_level,
            ferritin,
            gender,
        }
    }

    #[test]
    fn test_sex_specific_hemoglobin_threshold() {
        let female = DeficiencySet::detect(&labs(12.5, 80.0, 100.0, Gender::Female));
        assert!(female.is_empty());

        let male = DeficiencySet::detect(&labs(12.5, 80.0, 100.0, Gender::Male));
        assert!(male.contains(Deficiency::LowHemoglobin));
        assert_eq!(male.len(), 1);
    }

    #[test]
    fn test_all_rules_evaluated() {
        let set = DeficiencySet::detect(&labs(8.0, 40.0, 10.0, Gender::Female));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![
                Deficiency::LowHemoglobin,
                Deficiency::LowIron,
                Deficiency::LowFerritin
            ]
        );
    }

    #[test]
    fn test_thresholds_are_strict() {
        let set = DeficiencySet::detect(&labs(12.0, 60.0, 20.0, Gender::Female));
        assert!(set.is_empty());
    }

    #[test]
    fn test_mild_anemia_with_detected_hemoglobin_keeps_set() {
        let set = DeficiencySet::detect_with_fallback(
            &labs(10.5, 80.0, 100.0, Gender::Female),
            Severity::Mild,
        );
        assert_eq!(set, DeficiencySet::from_iter([Deficiency::LowHemoglobin]));
    }

    #[test]
    fn test_fallback_fills_empty_set_exactly() {
        let set = DeficiencySet::detect_with_fallback(
            &labs(13.0, 80.0, 100.0, Gender::Female),
            Severity::Moderate,
        );
        assert_eq!(
            set,
            DeficiencySet::from_iter([Deficiency::LowHemoglobin, Deficiency::LowIron])
        );
    }

    #[test]
    fn test_fallback_never_fires_for_normal() {
        let set = DeficiencySet::detect_with_fallback(
            &labs(13.0, 80.0, 100.0, Gender::Female),
            Severity::Normal,
        );
        assert!(set.is_empty());
    }

    #[test]
    fn test_fallback_does_not_override_detected_ferritin() {
        let set = DeficiencySet::detect_with_fallback(
            &labs(14.0, 80.0, 12.0, Gender::Female),
            Severity::Severe,
        );
        assert_eq!(set, DeficiencySet::from_iter([Deficiency::LowFerritin]));
    }

    #[test]
    fn test_detection_is_monotonic() {
        let start = labs(14.0, 100.0, 60.0, Gender::Male);
        let mut previous = DeficiencySet::detect(&start);
        for step in 1..=40 {
            let d = f64::from(step) * 0.5;
            let current = DeficiencySet::detect(&labs(
                start.hemoglobin - d * 0.3,
                start.iron_level - d * 2.5,
                start.ferritin - d * 2.5,
                start.gender,
            ));
            for deficiency in previous.iter() {
                assert!(current.contains(deficiency), "{deficiency} disappeared");
            }
            previous = current;
        }
        assert_eq!(previous.len(), 3);
    }

    #[test]
    fn test_serializes_as_label_list() {
        let set = DeficiencySet::from_iter([Deficiency::LowIron, Deficiency::LowHemoglobin]);
        let json = serde_json::to_string(&set).expect("Should serialize");
        assert_eq!(json, r#"["low_hemoglobin","low_iron"]"#);
    }
}
