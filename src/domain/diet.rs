//! Diet plan types and the pure rules behind plan assembly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::deficiency::{Deficiency, DeficiencySet, LabValues};
use super::patient::{binary_flag, defaults, ranges, Gender};
use super::severity::Severity;

/// Languages the knowledge base can carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Te,
    Ta,
}

impl Language {
    pub const ALL: [Self; 4] = [Self::En, Self::Hi, Self::Te, Self::Ta];

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Hi => "hi",
            Self::Te => "te",
            Self::Ta => "ta",
        }
    }

    /// Match an ISO 639-1 code, ignoring case and any region suffix (`hi-IN`).
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let primary = code.trim().split(['-', '_']).next().unwrap_or_default();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(primary))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Food groupings the deficiency rules select from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodCategory {
    IronRich,
    FolateRich,
    VitaminC,
    VitaminB12,
}

impl FoodCategory {
    /// Categories that address a deficiency, most important first.
    #[must_use]
    pub fn for_deficiency(deficiency: Deficiency) -> &'static [Self] {
        match deficiency {
            Deficiency::LowHemoglobin => &[Self::IronRich, Self::FolateRich, Self::VitaminC],
            Deficiency::LowIron => &[Self::IronRich, Self::VitaminC],
            Deficiency::LowFerritin => &[Self::IronRich, Self::VitaminB12],
        }
    }
}

/// Ordered, de-duplicated categories for a deficiency set.
///
/// Returns an empty list for an empty set; callers use the maintenance list
/// in that case. Pregnancy appends folate and B12 sources.
#[must_use]
pub fn categories_for(deficiencies: &DeficiencySet, pregnancy: bool) -> Vec<FoodCategory> {
    let mut out: Vec<FoodCategory> = Vec::new();
    let pregnancy_extra: &[FoodCategory] = if pregnancy {
        &[FoodCategory::FolateRich, FoodCategory::VitaminB12]
    } else {
        &[]
    };
    let candidates = deficiencies
        .iter()
        .flat_map(|d| FoodCategory::for_deficiency(d).iter().copied());
    for category in candidates.chain(pregnancy_extra.iter().copied()) {
        if !out.contains(&category) {
            out.push(category);
        }
    }
    out
}

/// How many foods to take from each category; `None` means all.
#[must_use]
pub fn foods_per_category(severity: Severity) -> Option<usize> {
    match severity {
        Severity::Normal => Some(3),
        Severity::Mild => Some(4),
        Severity::Moderate => Some(5),
        Severity::Severe => None,
    }
}

/// Recommended daily iron intake group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IronTarget {
    AdultMale,
    AdultFemale,
    Pregnant,
}

impl IronTarget {
    #[must_use]
    pub fn for_demographic(gender: Gender, pregnancy: bool) -> Self {
        match (gender, pregnancy) {
            (_, true) => Self::Pregnant,
            (Gender::Male, false) => Self::AdultMale,
            (Gender::Female, false) => Self::AdultFemale,
        }
    }

    /// Milligrams of iron per day.
    #[must_use]
    pub fn milligrams(self) -> f64 {
        match self {
            Self::AdultMale => 8.0,
            Self::AdultFemale => 18.0,
            Self::Pregnant => 27.0,
        }
    }
}

/// One recommended food, resolved into the plan's language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodSuggestion {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub category: FoodCategory,
    pub category_label: String,
    pub food_group: String,
    /// Iron content (mg per 100 g)
    pub iron_per_100g: f64,
    pub preparation: String,
    pub nutrients: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Snack,
    Dinner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealPlan {
    pub title: String,
    pub meals: BTreeMap<MealSlot, String>,
}

/// What helps and what hinders iron absorption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsorptionTips {
    pub enhancers: Vec<String>,
    pub inhibitors: Vec<String>,
}

impl AbsorptionTips {
    /// Append tips not already present, preserving first-seen order.
    pub fn merge(&mut self, other: AbsorptionTips) {
        for tip in other.enhancers {
            if !self.enhancers.contains(&tip) {
                self.enhancers.push(tip);
            }
        }
        for tip in other.inhibitors {
            if !self.inhibitors.contains(&tip) {
                self.inhibitors.push(tip);
            }
        }
    }
}

/// A personalized diet plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietPlan {
    pub severity: Severity,
    pub deficiencies: DeficiencySet,
    pub language: Language,
    pub gender: Gender,
    #[serde(with = "binary_flag")]
    pub pregnancy: bool,
    pub foods: Vec<FoodSuggestion>,
    pub meal_plan: Option<MealPlan>,
    pub absorption_tips: AbsorptionTips,
    pub daily_iron_target: IronTarget,
    pub daily_iron_mg: f64,
    pub daily_iron_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pregnancy_note: Option<String>,
}

/// Hemoglobin (g/dL) assumed when a diet request omits it.
pub const DEFAULT_REQUEST_HEMOGLOBIN: f64 = 12.0;

fn default_request_hemoglobin() -> f64 {
    DEFAULT_REQUEST_HEMOGLOBIN
}

/// Standalone diet request.
///
/// Only `severity` is mandatory. Omitted labs take values that trigger no
/// deficiency rule, so an anemic label without labs gets the fallback set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietRequest {
    /// Severity label, e.g. "Mild Anemia"
    pub severity: String,
    #[serde(default = "default_request_hemoglobin")]
    pub hemoglobin: f64,
    #[serde(default = "defaults::iron_level")]
    pub iron_level: f64,
    #[serde(default = "defaults::ferritin")]
    pub ferritin: f64,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default, with = "binary_flag")]
    pub pregnancy: bool,
    #[serde(default)]
    pub language: Option<String>,
}

impl DietRequest {
    /// Check the severity label and lab ranges.
    ///
    /// # Errors
    /// Returns every problem found as a separate message.
    pub fn validate(&self) -> Result<Severity, Vec<String>> {
        let mut errors = Vec::new();
        let severity = self.severity.parse::<Severity>().map_err(|e| errors.push(e)).ok();

        for (name, value, (min, max)) in [
            ("hemoglobin", self.hemoglobin, ranges::HEMOGLOBIN),
            ("iron_level", self.iron_level, ranges::IRON_LEVEL),
            ("ferritin", self.ferritin, ranges::FERRITIN),
        ] {
            if !(min..=max).contains(&value) {
                errors.push(format!("{name} {value} out of range [{min}, {max}]"));
            }
        }

        match severity {
            Some(severity) if errors.is_empty() => Ok(severity),
            _ => Err(errors),
        }
    }

    #[must_use]
    pub fn lab_values(&self) -> LabValues {
        LabValues {
            hemoglobin: self.hemoglobin,
            iron_level: self.iron_level,
            ferritin: self.ferritin,
            gender: self.gender,
        }
    }
}
