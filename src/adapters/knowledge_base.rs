//! JSON-backed diet knowledge base.
//!
//! A copy of `data/diet_knowledge_base.json` is compiled into the binary; a
//! deployment may replace it with its own file. Every localized string is a
//! map of language code to text and must carry the default language, which is
//! what any missing translation resolves to.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

use crate::domain::{
    AbsorptionTips, Deficiency, FoodCategory, FoodSuggestion, IronTarget, Language, MealPlan,
    MealSlot, Severity,
};
use crate::ports::DietKnowledge;
use crate::{HemoscanError, Result};

const BUILTIN_JSON: &str = include_str!("../../data/diet_knowledge_base.json");

/// Language code to text. Codes outside [`Language::ALL`] are dropped on load.
#[derive(Debug, Clone, Default)]
struct LocalizedText(BTreeMap<Language, String>);

impl LocalizedText {
    fn get(&self, language: &Language) -> Option<&String> {
        self.0.get(language)
    }

    fn contains_key(&self, language: &Language) -> bool {
        self.0.contains_key(language)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for LocalizedText {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut text = BTreeMap::new();
        for (code, value) in raw {
            match Language::ALL.into_iter().find(|lang| lang.code() == code) {
                Some(lang) => {
                    text.insert(lang, value);
                }
                None => tracing::debug!("Ignoring unsupported language key '{code}'"),
            }
        }
        Ok(Self(text))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FoodEntry {
    id: String,
    name: LocalizedText,
    emoji: String,
    category: FoodCategory,
    food_group: String,
    iron_per_100g: f64,
    #[serde(default)]
    preparation: LocalizedText,
    #[serde(default)]
    nutrients: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MealPlanEntry {
    title: LocalizedText,
    meals: BTreeMap<MealSlot, LocalizedText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TipSet {
    #[serde(default)]
    enhancers: Vec<LocalizedText>,
    #[serde(default)]
    inhibitors: Vec<LocalizedText>,
}

#[derive(Debug, Clone, Deserialize)]
struct TipsSection {
    general: TipSet,
    #[serde(default)]
    deficiency: BTreeMap<Deficiency, TipSet>,
    #[serde(default)]
    pregnancy: TipSet,
}

#[derive(Debug, Clone, Deserialize)]
struct KnowledgeBaseDocument {
    version: u32,
    default_language: Language,
    category_labels: BTreeMap<FoodCategory, LocalizedText>,
    foods: Vec<FoodEntry>,
    maintenance: Vec<String>,
    #[serde(default)]
    meal_plans: BTreeMap<Severity, MealPlanEntry>,
    tips: TipsSection,
    daily_targets: BTreeMap<IronTarget, LocalizedText>,
    pregnancy_note: LocalizedText,
}

fn kb_error(msg: impl Into<String>) -> HemoscanError {
    HemoscanError::KnowledgeBase(msg.into())
}

impl KnowledgeBaseDocument {
    /// Collect every localized field with a path for error messages.
    fn localized_fields(&self) -> Vec<(String, &LocalizedText)> {
        let mut fields: Vec<(String, &LocalizedText)> = Vec::new();
        for (category, label) in &self.category_labels {
            fields.push((format!("category_labels.{category:?}"), label));
        }
        for food in &self.foods {
            fields.push((format!("foods.{}.name", food.id), &food.name));
            if !food.preparation.is_empty() {
                fields.push((format!("foods.{}.preparation", food.id), &food.preparation));
            }
        }
        for (severity, plan) in &self.meal_plans {
            fields.push((format!("meal_plans.{severity}.title"), &plan.title));
            for (slot, text) in &plan.meals {
                fields.push((format!("meal_plans.{severity}.{slot:?}"), text));
            }
        }
        let tip_sets = std::iter::once(("general".to_string(), &self.tips.general))
            .chain(
                self.tips
                    .deficiency
                    .iter()
                    .map(|(d, t)| (d.to_string(), t)),
            )
            .chain(std::iter::once(("pregnancy".to_string(), &self.tips.pregnancy)));
        for (name, set) in tip_sets {
            for tip in set.enhancers.iter().chain(&set.inhibitors) {
                fields.push((format!("tips.{name}"), tip));
            }
        }
        for (target, label) in &self.daily_targets {
            fields.push((format!("daily_targets.{target:?}"), label));
        }
        fields.push(("pregnancy_note".to_string(), &self.pregnancy_note));
        fields
    }

    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.version != 1 {
            errors.push(format!("unsupported version {}", self.version));
        }
        for (path, text) in self.localized_fields() {
            if !text.contains_key(&self.default_language) {
                errors.push(format!("{path} has no '{}' text", self.default_language));
            }
        }

        let mut ids = BTreeSet::new();
        for food in &self.foods {
            if !ids.insert(food.id.as_str()) {
                errors.push(format!("duplicate food id '{}'", food.id));
            }
            if !food.iron_per_100g.is_finite() || food.iron_per_100g < 0.0 {
                errors.push(format!("foods.{}.iron_per_100g must be >= 0", food.id));
            }
        }
        for id in &self.maintenance {
            if !ids.contains(id.as_str()) {
                errors.push(format!("maintenance references unknown food '{id}'"));
            }
        }
        if self.maintenance.is_empty() {
            errors.push("maintenance list is empty".to_string());
        }

        for category in [
            FoodCategory::IronRich,
            FoodCategory::FolateRich,
            FoodCategory::VitaminC,
            FoodCategory::VitaminB12,
        ] {
            if !self.category_labels.contains_key(&category) {
                errors.push(format!("missing label for category {category:?}"));
            }
            if !self.foods.iter().any(|f| f.category == category) {
                errors.push(format!("no foods in category {category:?}"));
            }
        }
        for target in [IronTarget::AdultMale, IronTarget::AdultFemale, IronTarget::Pregnant] {
            if !self.daily_targets.contains_key(&target) {
                errors.push(format!("missing daily target label for {target:?}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Read-only knowledge base parsed from JSON.
#[derive(Debug, Clone)]
pub struct JsonKnowledgeBase {
    doc: KnowledgeBaseDocument,
    languages: BTreeSet<Language>,
}

impl JsonKnowledgeBase {
    /// The knowledge base compiled into the binary.
    ///
    /// # Errors
    /// Only fails if the embedded document is malformed.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_JSON)
    }

    /// Load a replacement knowledge base from disk.
    ///
    /// # Errors
    /// Returns `HemoscanError::Io` if the file cannot be read, otherwise the
    /// errors of [`Self::from_json`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))
        })?;
        let kb = Self::from_json(&json)?;
        tracing::info!(
            "Loaded knowledge base from {:?} ({} foods)",
            path,
            kb.doc.foods.len()
        );
        Ok(kb)
    }

    /// # Errors
    /// Returns `HemoscanError::Serialization` for JSON that does not fit the
    /// document shape and `HemoscanError::KnowledgeBase` for incomplete content.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: KnowledgeBaseDocument = serde_json::from_str(json)?;
        doc.validate().map_err(|errors| kb_error(errors.join("; ")))?;

        // A language counts as supported once every category label has it.
        let languages = Language::ALL
            .into_iter()
            .filter(|lang| doc.category_labels.values().all(|l| l.contains_key(lang)))
            .collect();
        Ok(Self { doc, languages })
    }

    fn text(&self, text: &LocalizedText, language: Language) -> String {
        text.get(&language)
            .or_else(|| text.get(&self.doc.default_language))
            .cloned()
            .unwrap_or_default()
    }

    fn tips(&self, set: &TipSet, language: Language) -> AbsorptionTips {
        AbsorptionTips {
            enhancers: set.enhancers.iter().map(|t| self.text(t, language)).collect(),
            inhibitors: set.inhibitors.iter().map(|t| self.text(t, language)).collect(),
        }
    }

    fn suggestion(&self, food: &FoodEntry, language: Language) -> FoodSuggestion {
        FoodSuggestion {
            id: food.id.clone(),
            name: self.text(&food.name, language),
            emoji: food.emoji.clone(),
            category: food.category,
            category_label: self
                .doc
                .category_labels
                .get(&food.category)
                .map(|l| self.text(l, language))
                .unwrap_or_default(),
            food_group: food.food_group.clone(),
            iron_per_100g: food.iron_per_100g,
            preparation: self.text(&food.preparation, language),
            nutrients: food.nutrients.clone(),
        }
    }
}

impl DietKnowledge for JsonKnowledgeBase {
    fn default_language(&self) -> Language {
        self.doc.default_language
    }

    fn supports(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }

    fn foods(&self, category: FoodCategory, language: Language) -> Vec<FoodSuggestion> {
        self.doc
            .foods
            .iter()
            .filter(|f| f.category == category)
            .map(|f| self.suggestion(f, language))
            .collect()
    }

    fn maintenance_foods(&self, language: Language) -> Vec<FoodSuggestion> {
        self.doc
            .maintenance
            .iter()
            .filter_map(|id| self.doc.foods.iter().find(|f| &f.id == id))
            .map(|f| self.suggestion(f, language))
            .collect()
    }

    fn meal_plan(&self, severity: Severity, language: Language) -> Option<MealPlan> {
        let entry = self.doc.meal_plans.get(&severity)?;
        Some(MealPlan {
            title: self.text(&entry.title, language),
            meals: entry
                .meals
                .iter()
                .map(|(slot, text)| (*slot, self.text(text, language)))
                .collect(),
        })
    }

    fn general_tips(&self, language: Language) -> AbsorptionTips {
        self.tips(&self.doc.tips.general, language)
    }

    fn deficiency_tips(&self, deficiency: Deficiency, language: Language) -> AbsorptionTips {
        self.doc
            .tips
            .deficiency
            .get(&deficiency)
            .map(|set| self.tips(set, language))
            .unwrap_or_default()
    }

    fn pregnancy_tips(&self, language: Language) -> AbsorptionTips {
        self.tips(&self.doc.tips.pregnancy, language)
    }

    fn daily_target_label(&self, target: IronTarget, language: Language) -> String {
        self.doc
            .daily_targets
            .get(&target)
            .map(|l| self.text(l, language))
            .unwrap_or_default()
    }

    fn pregnancy_note(&self, language: Language) -> Option<String> {
        Some(self.text(&self.doc.pregnancy_note, language))
    }
}
