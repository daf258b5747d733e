//! Diet service: Builds localized diet plans.
//!
//! A plan is a pure function of severity, lab values, gender, pregnancy and
//! language over a read-only knowledge base, so identical requests always
//! produce identical plans.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::adapters::knowledge_base::JsonKnowledgeBase;
use crate::config::EngineConfig;
use crate::domain::diet::{categories_for, foods_per_category};
use crate::domain::{
    DeficiencySet, DietPlan, DietRequest, IronTarget, LabValues, Language, PatientRecord,
    Severity, SeverityResult,
};
use crate::ports::DietKnowledge;
use crate::{HemoscanError, Result};

/// Service for diet recommendations.
#[derive(Debug)]
pub struct DietService<K: DietKnowledge> {
    knowledge: Arc<K>,
    default_language: Language,
}

impl DietService<JsonKnowledgeBase> {
    /// Build the service over the configured knowledge base.
    ///
    /// # Errors
    /// Returns an error if a replacement knowledge base cannot be loaded.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let knowledge = match &config.knowledge_base {
            Some(path) => JsonKnowledgeBase::load(path)?,
            None => JsonKnowledgeBase::builtin()?,
        };
        Ok(Self::new(Arc::new(knowledge), config.default_language))
    }
}

impl<K: DietKnowledge> DietService<K> {
    pub fn new(knowledge: Arc<K>, default_language: Language) -> Self {
        Self {
            knowledge,
            default_language,
        }
    }

    /// Build a plan from a standalone request.
    ///
    /// # Errors
    /// Returns `Validation` for an unknown severity label or out-of-range lab
    /// values. An unknown language is not an error.
    pub fn recommend(&self, request: &DietRequest) -> Result<DietPlan> {
        let severity = request.validate().map_err(HemoscanError::validation)?;
        let language = self.resolve_language(request.language.as_deref());
        Ok(self.build_plan(severity, &request.lab_values(), request.pregnancy, language))
    }

    /// Build a plan for a record that has just been classified.
    ///
    /// # Errors
    /// Returns `Validation` if the record is out of range.
    pub fn recommend_for(
        &self,
        result: &SeverityResult,
        record: &PatientRecord,
        language: Option<&str>,
    ) -> Result<DietPlan> {
        record.validate().map_err(HemoscanError::validation)?;
        let labs = LabValues {
            hemoglobin: record.hemoglobin,
            iron_level: record.iron_level,
            ferritin: record.ferritin,
            gender: record.gender,
        };
        let language = self.resolve_language(language);
        Ok(self.build_plan(result.severity, &labs, record.pregnancy, language))
    }

    /// Requested language if the knowledge base carries it, otherwise the
    /// configured default, otherwise the knowledge base's own default.
    fn resolve_language(&self, requested: Option<&str>) -> Language {
        if let Some(code) = requested {
            match Language::from_code(code) {
                Some(lang) if self.knowledge.supports(lang) => return lang,
                _ => tracing::debug!(
                    "Language '{}' not available, using {}",
                    code,
                    self.default_language
                ),
            }
        }
        if self.knowledge.supports(self.default_language) {
            self.default_language
        } else {
            self.knowledge.default_language()
        }
    }

    fn build_plan(
        &self,
        severity: Severity,
        labs: &LabValues,
        pregnancy: bool,
        language: Language,
    ) -> DietPlan {
        let kb = self.knowledge.as_ref();
        let deficiencies = DeficiencySet::detect_with_fallback(labs, severity);

        let mut foods = Vec::new();
        let mut seen = BTreeSet::new();
        if deficiencies.is_empty() {
            for food in kb.maintenance_foods(language) {
                if seen.insert(food.id.clone()) {
                    foods.push(food);
                }
            }
        }
        let cap = foods_per_category(severity).unwrap_or(usize::MAX);
        for category in categories_for(&deficiencies, pregnancy) {
            let fresh: Vec<_> = kb
                .foods(category, language)
                .into_iter()
                .filter(|f| !seen.contains(&f.id))
                .take(cap)
                .collect();
            for food in fresh {
                seen.insert(food.id.clone());
                foods.push(food);
            }
        }

        let meal_plan = match severity {
            Severity::Normal => None,
            _ => kb.meal_plan(severity, language),
        };

        let mut absorption_tips = kb.general_tips(language);
        for deficiency in deficiencies.iter() {
            absorption_tips.merge(kb.deficiency_tips(deficiency, language));
        }
        if pregnancy {
            absorption_tips.merge(kb.pregnancy_tips(language));
        }

        let target = IronTarget::for_demographic(labs.gender, pregnancy);
        tracing::info!(
            "Built diet plan for '{}' ({} foods, {} deficiencies, language {})",
            severity,
            foods.len(),
            deficiencies.len(),
            language
        );

        DietPlan {
            severity,
            deficiencies,
            language,
            gender: labs.gender,
            pregnancy,
            foods,
            meal_plan,
            absorption_tips,
            daily_iron_target: target,
            daily_iron_mg: target.milligrams(),
            daily_iron_label: kb.daily_target_label(target, language),
            pregnancy_note: if pregnancy {
                kb.pregnancy_note(language)
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::screening::tests::service as screening_service;
    use crate::domain::patient::tests::sample_record;
    use crate::domain::{Deficiency, FoodCategory, Gender};

    fn service() -> DietService<JsonKnowledgeBase> {
        let kb = JsonKnowledgeBase::builtin().expect("Should load built-in knowledge base");
        DietService::new(Arc::new(kb), Language::En)
    }

    fn request(severity: &str, hemoglobin: f64, iron_level: f64, ferritin: f64) -> DietRequest {
        DietRequest {
            severity: severity.into(),
            hemoglobin,
            iron_level,
            ferritin,
            gender: Gender::Female,
            pregnancy: false,
            language: None,
        }
    }

    fn ids(plan: &DietPlan) -> Vec<&str> {
        plan.foods.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_mild_plan_for_low_hemoglobin() {
        let plan = service()
            .recommend(&request("Mild Anemia", 10.5, 80.0, 100.0))
            .expect("Should build plan");
        assert_eq!(
            plan.deficiencies,
            DeficiencySet::from_iter([Deficiency::LowHemoglobin])
        );
        // Three categories, four foods each.
        assert_eq!(plan.foods.len(), 12);
        assert_eq!(
            plan.foods
                .iter()
                .filter(|f| f.category == FoodCategory::IronRich)
                .count(),
            4
        );
        assert!(plan.meal_plan.is_some());
        assert_eq!(plan.daily_iron_target, IronTarget::AdultFemale);
        assert_eq!(plan.daily_iron_mg, 18.0);
        assert!(plan.pregnancy_note.is_none());
    }

    #[test]
    fn test_anemic_label_with_normal_labs_assumes_iron_deficiency() {
        let plan = service()
            .recommend(&request("Moderate Anemia", 13.0, 80.0, 100.0))
            .expect("Should build plan");
        assert_eq!(
            plan.deficiencies,
            DeficiencySet::from_iter([Deficiency::LowHemoglobin, Deficiency::LowIron])
        );
        assert_eq!(plan.foods.len(), 15);
    }

    #[test]
    fn test_severity_only_request() {
        let req: DietRequest =
            serde_json::from_str(r#"{"severity": "Moderate Anemia"}"#).expect("Should parse");
        let plan = service().recommend(&req).expect("Should build plan");
        assert_eq!(
            plan.deficiencies,
            DeficiencySet::from_iter([Deficiency::LowHemoglobin, Deficiency::LowIron])
        );
        assert_eq!(plan.language, Language::En);
        assert_eq!(plan.gender, Gender::Female);
        assert_eq!(plan.foods.len(), 15);
    }

    #[test]
    fn test_normal_plan_uses_maintenance_list() {
        let plan = service()
            .recommend(&request("Normal", 13.5, 90.0, 80.0))
            .expect("Should build plan");
        assert!(plan.deficiencies.is_empty());
        assert_eq!(ids(&plan), vec!["spinach", "ragi", "masoor_dal", "amla", "curd"]);
        assert!(plan.meal_plan.is_none());
    }

    #[test]
    fn test_severe_plan_is_uncapped() {
        let plan = service()
            .recommend(&request("Severe Anemia", 6.0, 25.0, 6.0))
            .expect("Should build plan");
        assert_eq!(plan.deficiencies.len(), 3);
        assert_eq!(
            plan.foods
                .iter()
                .filter(|f| f.category == FoodCategory::IronRich)
                .count(),
            8
        );
        assert_eq!(plan.foods.len(), 25);
        let unique: BTreeSet<_> = ids(&plan).into_iter().collect();
        assert_eq!(unique.len(), plan.foods.len());
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let svc = service();
        for severity in Severity::ALL {
            let mut req = request(severity.label(), 10.0, 50.0, 15.0);
            req.language = Some("fr".into());
            let plan = svc.recommend(&req).expect("Should build plan");
            assert_eq!(plan.language, Language::En);
            assert!(!plan.foods.is_empty());
        }
    }

    #[test]
    fn test_localized_plan() {
        let mut req = request("Mild Anemia", 10.5, 80.0, 100.0);
        req.language = Some("hi".into());
        let plan = service().recommend(&req).expect("Should build plan");
        assert_eq!(plan.language, Language::Hi);
        assert_eq!(plan.foods[0].name, "पालक");
    }

    #[test]
    fn test_unknown_severity_rejected() {
        let err = service()
            .recommend(&request("Critical", 10.5, 80.0, 100.0))
            .expect_err("must fail");
        assert!(matches!(err, HemoscanError::Validation(_)));
        assert!(err.to_string().contains("unknown severity"));
    }

    #[test]
    fn test_plans_are_deterministic() {
        let svc = service();
        let req = request("Moderate Anemia", 9.0, 45.0, 12.0);
        let first = svc.recommend(&req).expect("Should build plan");
        let second = svc.recommend(&req).expect("Should build plan");
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("Should serialize"),
            serde_json::to_string(&second).expect("Should serialize")
        );
    }

    #[test]
    fn test_pregnancy_layers_on_base_plan() {
        let svc = service();
        let base_req = request("Mild Anemia", 10.5, 80.0, 100.0);
        let pregnant_req = DietRequest {
            pregnancy: true,
            ..base_req.clone()
        };
        let base = svc.recommend(&base_req).expect("Should build plan");
        let pregnant = svc.recommend(&pregnant_req).expect("Should build plan");

        let base_enhancers = &base.absorption_tips.enhancers;
        assert_eq!(
            &pregnant.absorption_tips.enhancers[..base_enhancers.len()],
            &base_enhancers[..]
        );
        assert!(pregnant.absorption_tips.enhancers.len() > base_enhancers.len());
        assert!(pregnant
            .foods
            .iter()
            .any(|f| f.category == FoodCategory::VitaminB12));
        assert_eq!(pregnant.daily_iron_target, IronTarget::Pregnant);
        assert_eq!(pregnant.daily_iron_mg, 27.0);
        assert!(pregnant.pregnancy_note.is_some());
    }

    #[test]
    fn test_tips_are_not_repeated() {
        let plan = service()
            .recommend(&request("Severe Anemia", 6.0, 25.0, 6.0))
            .expect("Should build plan");
        let inhibitors = &plan.absorption_tips.inhibitors;
        let unique: BTreeSet<_> = inhibitors.iter().collect();
        assert_eq!(unique.len(), inhibitors.len());
    }

    #[test]
    fn test_plan_for_classified_record() {
        let record = PatientRecord {
            hemoglobin: 10.5,
            ..sample_record()
        };
        let result = screening_service()
            .classify(&record)
            .expect("Should classify");
        let plan = service()
            .recommend_for(&result, &record, Some("ta"))
            .expect("Should build plan");
        assert_eq!(plan.severity, result.severity);
        assert_eq!(plan.language, Language::Ta);
        assert!(plan.deficiencies.contains(Deficiency::LowHemoglobin));
    }

    #[test]
    fn test_from_config_rejects_missing_knowledge_base() {
        let config = EngineConfig {
            knowledge_base: Some("/nonexistent/kb.json".into()),
            ..EngineConfig::default()
        };
        let err = DietService::from_config(&config).expect_err("must fail");
        assert!(matches!(err, HemoscanError::Io(_)));
        assert!(DietService::from_config(&EngineConfig::default()).is_ok());
    }
}
