//! Diet knowledge port: read-only lookups into the food knowledge base.
//!
//! Every lookup takes the requested language and resolves missing
//! translations to the base's default language, so callers always get text.

use crate::domain::{
    AbsorptionTips, Deficiency, FoodCategory, FoodSuggestion, IronTarget, Language, MealPlan,
    Severity,
};

pub trait DietKnowledge: Send + Sync {
    /// Language used when a translation is missing.
    fn default_language(&self) -> Language;

    /// Whether the base carries content for `language` at all.
    fn supports(&self, language: Language) -> bool;

    /// Foods in a category, in knowledge-base order.
    fn foods(&self, category: FoodCategory, language: Language) -> Vec<FoodSuggestion>;

    /// Foods recommended when no deficiency was found.
    fn maintenance_foods(&self, language: Language) -> Vec<FoodSuggestion>;

    /// Meal plan for a severity, if the base defines one.
    fn meal_plan(&self, severity: Severity, language: Language) -> Option<MealPlan>;

    fn general_tips(&self, language: Language) -> AbsorptionTips;

    fn deficiency_tips(&self, deficiency: Deficiency, language: Language) -> AbsorptionTips;

    fn pregnancy_tips(&self, language: Language) -> AbsorptionTips;

    fn daily_target_label(&self, target: IronTarget, language: Language) -> String;

    fn pregnancy_note(&self, language: Language) -> Option<String>;
}
