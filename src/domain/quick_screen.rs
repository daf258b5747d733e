//! Quick-screen records: the abbreviated screening form.
//!
//! A quick screen supplies only hemoglobin, three symptoms and a few
//! demographics. [`QuickScreenRecord::into_full_record`] fills everything else
//! with population averages so the classifier always sees a complete record.

use serde::{Deserialize, Serialize};

use super::patient::{binary_flag, defaults, ranges, DietQuality, Gender, PatientRecord};

/// Hematocrit (%) is estimated as this multiple of hemoglobin (g/dL).
pub const HEMATOCRIT_PER_HEMOGLOBIN: f64 = 3.0;

/// Minimal screening input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickScreenRecord {
    pub age: u8,
    pub gender: Gender,
    /// Hemoglobin (g/dL)
    pub hemoglobin: f64,
    #[serde(default, with = "binary_flag")]
    pub fatigue: bool,
    #[serde(default, with = "binary_flag")]
    pub pale_skin: bool,
    #[serde(default, with = "binary_flag")]
    pub dizziness: bool,
    #[serde(default)]
    pub diet_quality: DietQuality,
    #[serde(default, with = "binary_flag")]
    pub pregnancy: bool,
}

impl QuickScreenRecord {
    /// Hematocrit derived from hemoglobin by the 3x rule of thumb.
    #[must_use]
    pub fn estimated_hematocrit(&self) -> f64 {
        self.hemoglobin * HEMATOCRIT_PER_HEMOGLOBIN
    }

    /// Validate the abbreviated input.
    ///
    /// Hemoglobin must also keep the derived hematocrit inside the range a
    /// full record accepts, so the expanded record is always valid.
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

        let (hb_min, hb_max) = ranges::HEMOGLOBIN;
        if !(hb_min..=hb_max).contains(&self.hemoglobin) {
            errors.push(format!(
                "hemoglobin {} out of range [{hb_min}, {hb_max}]",
                self.hemoglobin
            ));
        } else {
            let (hct_min, hct_max) = ranges::HEMATOCRIT;
            let hct = self.estimated_hematocrit();
            if !(hct_min..=hct_max).contains(&hct) {
                errors.push(format!(
                    "hemoglobin {} gives estimated hematocrit {hct} outside [{hct_min}, {hct_max}]; a full panel is required",
                    self.hemoglobin
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Expand into a complete record using population-average defaults.
    #[must_use]
    pub fn into_full_record(self) -> PatientRecord {
        PatientRecord {
            age: self.age,
            gender: self.gender,
            hemoglobin: self.hemoglobin,
            rbc_count: defaults::RBC_COUNT,
            mcv: defaults::MCV,
            mch: defaults::MCH,
            mchc: defaults::MCHC,
            hematocrit: self.estimated_hematocrit(),
            iron_level: defaults::IRON_LEVEL,
            ferritin: defaults::FERRITIN,
            diet_quality: self.diet_quality,
            chronic_disease: false,
            pregnancy: self.pregnancy,
            family_history_anemia: false,
            fatigue: self.fatigue,
            pale_skin: self.pale_skin,
            shortness_of_breath: false,
            dizziness: self.dizziness,
            cold_hands_feet: false,
            bmi: defaults::BMI,
        }
    }
}
