//! Patient blood-panel and symptom record used for anemia screening.
//!
//! Field names and bounds follow the screening form: every numeric field has a
//! clinically plausible range and records outside it never reach the model.

use serde::{Deserialize, Serialize};

/// Population-average values used when a lab value is not supplied.
pub mod defaults {
    /// Red blood cell count (million cells/µL).
    pub const RBC_COUNT: f64 = 4.5;
    /// Mean corpuscular volume (fL).
    pub const MCV: f64 = 85.0;
    /// Mean corpuscular hemoglobin (pg).
    pub const MCH: f64 = 29.0;
    /// Mean corpuscular hemoglobin concentration (g/dL).
    pub const MCHC: f64 = 33.0;
    /// Hematocrit (%), full-panel default only. Quick screens derive it.
    pub const HEMATOCRIT: f64 = 40.0;
    /// Serum iron (µg/dL).
    pub const IRON_LEVEL: f64 = 80.0;
    /// Serum ferritin (ng/mL).
    pub const FERRITIN: f64 = 100.0;
    /// Body mass index.
    pub const BMI: f64 = 24.0;

    pub(crate) fn rbc_count() -> f64 {
        RBC_COUNT
    }
    pub(crate) fn mcv() -> f64 {
        MCV
    }
    pub(crate) fn mch() -> f64 {
        MCH
    }
    pub(crate) fn mchc() -> f64 {
        MCHC
    }
    pub(crate) fn hematocrit() -> f64 {
        HEMATOCRIT
    }
    pub(crate) fn iron_level() -> f64 {
        IRON_LEVEL
    }
    pub(crate) fn ferritin() -> f64 {
        FERRITIN
    }
    pub(crate) fn bmi() -> f64 {
        BMI
    }
}

/// Inclusive bounds accepted for each numeric field.
pub mod ranges {
    pub const AGE: (u8, u8) = (1, 120);
    pub const HEMOGLOBIN: (f64, f64) = (1.0, 25.0);
    pub const RBC_COUNT: (f64, f64) = (1.0, 8.0);
    pub const MCV: (f64, f64) = (40.0, 130.0);
    pub const MCH: (f64, f64) = (10.0, 50.0);
    pub const MCHC: (f64, f64) = (20.0, 45.0);
    pub const HEMATOCRIT: (f64, f64) = (10.0, 60.0);
    pub const IRON_LEVEL: (f64, f64) = (5.0, 200.0);
    pub const FERRITIN: (f64, f64) = (1.0, 500.0);
    pub const BMI: (f64, f64) = (10.0, 50.0);
}

/// Biological sex as coded on the screening form (0 = female, 1 = male).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Gender {
    #[default]
    Female,
    Male,
}

impl Gender {
    /// Hemoglobin level (g/dL) below which this sex is considered low.
    #[must_use]
    pub fn hemoglobin_threshold(self) -> f64 {
        match self {
            Self::Female => 12.0,
            Self::Male => 13.5,
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Female => 0,
            Self::Male => 1,
        }
    }
}

impl TryFrom<u8> for Gender {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Female),
            1 => Ok(Self::Male),
            other => Err(format!("gender {other} must be 0 (female) or 1 (male)")),
        }
    }
}

impl From<Gender> for u8 {
    fn from(g: Gender) -> Self {
        g.code()
    }
}

/// Self-reported diet quality (0 = poor, 1 = average, 2 = good).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum DietQuality {
    Poor,
    #[default]
    Average,
    Good,
}

impl DietQuality {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Poor => 0,
            Self::Average => 1,
            Self::Good => 2,
        }
    }
}

impl TryFrom<u8> for DietQuality {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Poor),
            1 => Ok(Self::Average),
            2 => Ok(Self::Good),
            other => Err(format!("diet_quality {other} must be 0, 1 or 2")),
        }
    }
}

impl From<DietQuality> for u8 {
    fn from(q: DietQuality) -> Self {
        q.code()
    }
}

/// (De)serializes a `bool` as the form's 0/1 integer code.
///
/// JSON booleans are accepted on input as well.
pub(crate) mod binary_flag {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Bool(bool),
    }

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Bool(b) => Ok(b),
            Raw::Int(0) => Ok(false),
            Raw::Int(1) => Ok(true),
            Raw::Int(other) => Err(de::Error::custom(format!(
                "binary flag {other} must be 0 or 1"
            ))),
        }
    }
}

/// Complete patient record as consumed by the severity classifier.
///
/// Only `age`, `gender` and `hemoglobin` are mandatory on input; the other
/// lab values take population averages when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Age in years (1-120)
    pub age: u8,
    pub gender: Gender,
    /// Hemoglobin (g/dL)
    pub hemoglobin: f64,
    /// Red blood cell count (million cells/µL)
    #[serde(default = "defaults::rbc_count")]
    pub rbc_count: f64,
    /// Mean corpuscular volume (fL)
    #[serde(default = "defaults::mcv")]
    pub mcv: f64,
    /// Mean corpuscular hemoglobin (pg)
    #[serde(default = "defaults::mch")]
    pub mch: f64,
    /// Mean corpuscular hemoglobin concentration (g/dL)
    #[serde(default = "defaults::mchc")]
    pub mchc: f64,
    /// Hematocrit (%)
    #[serde(default = "defaults::hematocrit")]
    pub hematocrit: f64,
    /// Serum iron (µg/dL)
    #[serde(default = "defaults::iron_level")]
    pub iron_level: f64,
    /// Serum ferritin (ng/mL)
    #[serde(default = "defaults::ferritin")]
    pub ferritin: f64,
    #[serde(default)]
    pub diet_quality: DietQuality,
    #[serde(default, with = "binary_flag")]
    pub chronic_disease: bool,
    #[serde(default, with = "binary_flag")]
    pub pregnancy: bool,
    #[serde(default, with = "binary_flag")]
    pub family_history_anemia: bool,
    #[serde(default, with = "binary_flag")]
    pub fatigue: bool,
    #[serde(default, with = "binary_flag")]
    pub pale_skin: bool,
    #[serde(default, with = "binary_flag")]
    pub shortness_of_breath: bool,
    #[serde(default, with = "binary_flag")]
    pub dizziness: bool,
    #[serde(default, with = "binary_flag")]
    pub cold_hands_feet: bool,
    #[serde(default = "defaults::bmi")]
    pub bmi: f64,
}

/// Every feature a model artifact may reference, in form order.
pub const FEATURE_NAMES: [&str; 20] = [
    "age",
    "gender",
    "hemoglobin",
    "rbc_count",
    "mcv",
    "mch",
    "mchc",
    "hematocrit",
    "iron_level",
    "ferritin",
    "diet_quality",
    "chronic_disease",
    "pregnancy",
    "family_history_anemia",
    "fatigue",
    "pale_skin",
    "shortness_of_breath",
    "dizziness",
    "cold_hands_feet",
    "bmi",
];

fn check_range(errors: &mut Vec<String>, name: &str, value: f64, (min, max): (f64, f64)) {
    // NaN fails `contains`, so it is reported here too.
    if !(min..=max).contains(&value) {
        errors.push(format!("{name} {value} out of range [{min}, {max}]"));
    }
}

impl PatientRecord {
    /// Numeric value of a named model feature.
    ///
    /// Categorical fields use their form codes and flags map to 0.0/1.0.
    /// Returns `None` for a name the record does not carry.
    #[must_use]
    pub fn feature_value(&self, name: &str) -> Option<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let v = match name {
            "age" => f64::from(self.age),
            "gender" => f64::from(self.gender.code()),
            "hemoglobin" => self.hemoglobin,
            "rbc_count" => self.rbc_count,
            "mcv" => self.mcv,
            "mch" => self.mch,
            "mchc" => self.mchc,
            "hematocrit" => self.hematocrit,
            "iron_level" => self.iron_level,
            "ferritin" => self.ferritin,
            "diet_quality" => f64::from(self.diet_quality.code()),
            "chronic_disease" => flag(self.chronic_disease),
            "pregnancy" => flag(self.pregnancy),
            "family_history_anemia" => flag(self.family_history_anemia),
            "fatigue" => flag(self.fatigue),
            "pale_skin" => flag(self.pale_skin),
            "shortness_of_breath" => flag(self.shortness_of_breath),
            "dizziness" => flag(self.dizziness),
            "cold_hands_feet" => flag(self.cold_hands_feet),
            "bmi" => self.bmi,
            _ => return None,
        };
        Some(v)
    }

    /// Number of reported symptoms.
    #[must_use]
    pub fn symptom_count(&self) -> usize {
        [
            self.fatigue,
            self.pale_skin,
            self.shortness_of_breath,
            self.dizziness,
            self.cold_hands_feet,
        ]
        .iter()
        .filter(|s| **s)
        .count()
    }

    /// Validate that all fields are within their clinical ranges.
    ///
    /// # Errors
    /// Returns every violated bound as a separate message.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let (age_min, age_max) = ranges::AGE;
        if !(age_min..=age_max).contains(&self.age) {
            errors.push(format!(
                "age {} out of range [{age_min}, {age_max}]",
                self.age
            ));
        }
        check_range(&mut errors, "hemoglobin", self.hemoglobin, ranges::HEMOGLOBIN);
        check_range(&mut errors, "rbc_count", self.rbc_count, ranges::RBC_COUNT);
        check_range(&mut errors, "mcv", self.mcv, ranges::MCV);
        check_range(&mut errors, "mch", self.mch, ranges::MCH);
        check_range(&mut errors, "mchc", self.mchc, ranges::MCHC);
        check_range(&mut errors, "hematocrit", self.hematocrit, ranges::HEMATOCRIT);
        check_range(&mut errors, "iron_level", self.iron_level, ranges::IRON_LEVEL);
        check_range(&mut errors, "ferritin", self.ferritin, ranges::FERRITIN);
        check_range(&mut errors, "bmi", self.bmi, ranges::BMI);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_record() -> PatientRecord {
        PatientRecord {
            age: 30,
            gender: Gender::Female,
            hemoglobin: 12.0,
            rbc_count: 4.5,
            mcv: 85.0,
            mch: 29.0,
            mchc: 33.0,
            hematocrit: 40.0,
            iron_level: 80.0,
            ferritin: 100.0,
            diet_quality: DietQuality::Average,
            chronic_disease: false,
            pregnancy: false,
            family_history_anemia: false,
            fatigue: false,
            pale_skin: false,
            shortness_of_breath: false,
            dizziness: false,
            cold_hands_feet: false,
            bmi: 24.0,
        }
    }

    #[test]
    fn test_minimal_json_takes_population_defaults() {
        let record: PatientRecord =
            serde_json::from_str(r#"{"age": 30, "gender": 0, "hemoglobin": 12.0}"#)
                .expect("Should parse");
        assert_eq!(record, sample_record());
    }

    #[test]
    fn test_flags_accept_codes_and_booleans() {
        let record: PatientRecord = serde_json::from_str(
            r#"{"age": 41, "gender": 1, "hemoglobin": 11.0, "fatigue": 1, "dizziness": true, "pale_skin": 0}"#,
        )
        .expect("Should parse");
        assert!(record.fatigue);
        assert!(record.dizziness);
        assert!(!record.pale_skin);
        assert_eq!(record.symptom_count(), 2);

        let json = serde_json::to_value(&record).expect("Should serialize");
        assert_eq!(json["fatigue"], 1);
        assert_eq!(json["gender"], 1);
    }

    #[test]
    fn test_bad_codes_rejected_on_parse() {
        assert!(serde_json::from_str::<PatientRecord>(
            r#"{"age": 30, "gender": 2, "hemoglobin": 12.0}"#
        )
        .is_err());
        assert!(serde_json::from_str::<PatientRecord>(
            r#"{"age": 30, "gender": 0, "hemoglobin": 12.0, "pregnancy": 3}"#
        )
        .is_err());
        assert!(serde_json::from_str::<PatientRecord>(
            r#"{"age": 30, "gender": 0, "hemoglobin": 12.0, "diet_quality": 5}"#
        )
        .is_err());
    }

    #[test]
    fn test_validation() {
        assert!(sample_record().validate().is_ok());

        let invalid = PatientRecord {
            age: 0,
            hemoglobin: 30.0,
            ferritin: f64::NAN,
            ..sample_record()
        };
        let errors = invalid.validate().expect_err("Should reject");
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.starts_with("hemoglobin")));
    }

    #[test]
    fn test_feature_value_covers_every_feature() {
        let record = sample_record();
        for name in FEATURE_NAMES {
            assert!(record.feature_value(name).is_some(), "missing {name}");
        }
        assert!(record.feature_value("cholesterol").is_none());
        assert!((record.feature_value("gender").unwrap_or(-1.0)).abs() < f64::EPSILON);
    }
}
