//! Explainable risk rules.
//!
//! Everything here is independent of the statistical model: the score, its
//! contributing factors, lab findings, safety alerts, the projection and the
//! recommendations are all derived from transparent thresholds so a result
//! can be explained even though its label comes from an opaque predictor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::deficiency::{LOW_FERRITIN_THRESHOLD, LOW_IRON_THRESHOLD};
use super::patient::{DietQuality, Gender, PatientRecord};
use super::severity::{RiskLevel, ScreeningMode, Severity};

/// Hemoglobin (g/dL) below which an alert is critical regardless of severity.
pub const CRITICAL_HEMOGLOBIN: f64 = 7.0;

/// Hemoglobin (g/dL) above which an alert is raised.
pub const HIGH_HEMOGLOBIN: f64 = 20.0;

/// Hemoglobin (g/dL) below which anemia in pregnancy is critical.
pub const PREGNANCY_CRITICAL_HEMOGLOBIN: f64 = 10.0;

const MAX_HEMOGLOBIN_POINTS: f64 = 40.0;
const POINTS_PER_HEMOGLOBIN_GRAM: f64 = 8.0;
const POINTS_PER_SYMPTOM: f64 = 4.0;

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Score with the rule contributions that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// 0-100
    pub score: f64,
    pub level: RiskLevel,
    /// Rule name to points added
    pub factors: BTreeMap<String, f64>,
}

/// Apply the additive risk rules to a record.
#[must_use]
pub fn assess_risk(record: &PatientRecord) -> RiskAssessment {
    let mut factors = BTreeMap::new();
    let mut add = |name: &str, points: f64| {
        if points > 0.0 {
            factors.insert(name.to_string(), round1(points));
        }
    };

    let deficit = record.gender.hemoglobin_threshold() - record.hemoglobin;
    add(
        "low_hemoglobin",
        (deficit * POINTS_PER_HEMOGLOBIN_GRAM).clamp(0.0, MAX_HEMOGLOBIN_POINTS),
    );
    if record.iron_level < LOW_IRON_THRESHOLD {
        add("low_iron", 10.0);
    }
    if record.ferritin < LOW_FERRITIN_THRESHOLD {
        add("low_ferritin", 10.0);
    }
    if record.mcv < 80.0 {
        add("microcytosis", 5.0);
    }
    add("symptoms", record.symptom_count() as f64 * POINTS_PER_SYMPTOM);
    if record.pregnancy {
        add("pregnancy", 8.0);
    }
    if record.chronic_disease {
        add("chronic_disease", 7.0);
    }
    if record.family_history_anemia {
        add("family_history", 5.0);
    }
    match record.diet_quality {
        DietQuality::Poor => add("diet_quality", 6.0),
        DietQuality::Average => add("diet_quality", 2.0),
        DietQuality::Good => {}
    }
    if record.age > 65 {
        add("age", 4.0);
    } else if record.age < 12 {
        add("age", 3.0);
    }

    let score = round1(factors.values().sum::<f64>().clamp(0.0, 100.0));
    RiskAssessment {
        score,
        level: RiskLevel::from_score(score),
        factors,
    }
}

/// Where a lab value sits relative to its normal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Low,
    Normal,
    High,
}

/// One row of the lab-value table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabFinding {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub normal_range: String,
    pub status: FindingStatus,
}

fn finding(name: &str, value: f64, unit: &str, (low, high): (f64, f64)) -> LabFinding {
    let status = if value < low {
        FindingStatus::Low
    } else if value > high {
        FindingStatus::High
    } else {
        FindingStatus::Normal
    };
    LabFinding {
        name: name.to_string(),
        value,
        unit: unit.to_string(),
        normal_range: format!("{low}-{high}"),
        status,
    }
}

/// Compare lab values with their normal ranges.
///
/// Quick screens only measured hemoglobin, so only that row is reported.
#[must_use]
pub fn lab_findings(record: &PatientRecord, mode: ScreeningMode) -> Vec<LabFinding> {
    let male = record.gender == Gender::Male;
    let hemoglobin_range = if male { (13.5, 17.5) } else { (12.0, 15.5) };
    let mut findings = vec![finding("Hemoglobin", record.hemoglobin, "g/dL", hemoglobin_range)];
    if mode == ScreeningMode::Quick {
        return findings;
    }

    let rbc_range = if male { (4.7, 6.1) } else { (4.2, 5.4) };
    let hematocrit_range = if male { (41.0, 53.0) } else { (36.0, 46.0) };
    findings.extend([
        finding("RBC Count", record.rbc_count, "M/µL", rbc_range),
        finding("MCV", record.mcv, "fL", (80.0, 100.0)),
        finding("MCH", record.mch, "pg", (27.0, 33.0)),
        finding("MCHC", record.mchc, "g/dL", (32.0, 36.0)),
        finding("Hematocrit", record.hematocrit, "%", hematocrit_range),
        finding("Iron", record.iron_level, "µg/dL", (LOW_IRON_THRESHOLD, 170.0)),
        finding("Ferritin", record.ferritin, "ng/mL", (LOW_FERRITIN_THRESHOLD, 250.0)),
        finding("BMI", record.bmi, "kg/m²", (18.5, 24.9)),
    ]);
    findings
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// A value outside clinically safe bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Alert {
    fn new(level: AlertLevel, message: String, action: &str) -> Self {
        Self {
            level,
            message,
            action: Some(action.to_string()),
        }
    }
}

/// Alerts for unsafe lab values, independent of the predicted label.
///
/// A predicted `Severe` label always adds a critical alert as well.
#[must_use]
pub fn safety_alerts(record: &PatientRecord, severity: Severity) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if record.hemoglobin < CRITICAL_HEMOGLOBIN {
        alerts.push(Alert::new(
            AlertLevel::Critical,
            format!(
                "Critically low hemoglobin ({} g/dL)",
                record.hemoglobin
            ),
            "Seek emergency medical care; a transfusion may be required",
        ));
    } else if record.hemoglobin > HIGH_HEMOGLOBIN {
        alerts.push(Alert::new(
            AlertLevel::Warning,
            format!("Hemoglobin above safe range ({} g/dL)", record.hemoglobin),
            "Consult a physician to rule out polycythemia or dehydration",
        ));
    }
    if record.pregnancy && record.hemoglobin < PREGNANCY_CRITICAL_HEMOGLOBIN {
        alerts.push(Alert::new(
            AlertLevel::Critical,
            format!(
                "Anemia during pregnancy with hemoglobin {} g/dL",
                record.hemoglobin
            ),
            "Contact your obstetrician promptly",
        ));
    }
    if record.ferritin < 10.0 {
        alerts.push(Alert::new(
            AlertLevel::Warning,
            format!("Iron stores severely depleted (ferritin {} ng/mL)", record.ferritin),
            "Ask your doctor about iron supplementation",
        ));
    }
    if record.iron_level < 30.0 {
        alerts.push(Alert::new(
            AlertLevel::Warning,
            format!("Very low serum iron ({} µg/dL)", record.iron_level),
            "Ask your doctor about iron supplementation",
        ));
    }
    if record.mcv < 70.0 {
        alerts.push(Alert::new(
            AlertLevel::Warning,
            format!("Marked microcytosis (MCV {} fL)", record.mcv),
            "Evaluate for iron deficiency or thalassemia trait",
        ));
    } else if record.mcv > 110.0 {
        alerts.push(Alert::new(
            AlertLevel::Warning,
            format!("Marked macrocytosis (MCV {} fL)", record.mcv),
            "Check vitamin B12 and folate levels",
        ));
    }
    if severity == Severity::Severe {
        alerts.push(Alert::new(
            AlertLevel::Critical,
            "Severe anemia detected".to_string(),
            "Consult a doctor immediately",
        ));
    }

    alerts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Stable,
}

/// Projected risk score if nothing changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureRisk {
    #[serde(rename = "3_months")]
    pub three_months: f64,
    #[serde(rename = "6_months")]
    pub six_months: f64,
    #[serde(rename = "12_months")]
    pub twelve_months: f64,
    pub trend: Trend,
    /// Whether diet and follow-up alone can be expected to reverse the trend
    pub preventable: bool,
}

/// Project the score forward 3, 6 and 12 months.
///
/// An anemic label or a poor diet makes the score drift upwards; chronic
/// disease and a poor diet speed the drift up.
#[must_use]
pub fn project_future_risk(
    score: f64,
    record: &PatientRecord,
    severity: Severity,
) -> FutureRisk {
    let poor_diet = record.diet_quality == DietQuality::Poor;
    let trend = if severity != Severity::Normal || poor_diet {
        Trend::Increasing
    } else {
        Trend::Stable
    };

    let mut drift_per_month = 0.0;
    if trend == Trend::Increasing {
        drift_per_month = 1.5;
        if poor_diet {
            drift_per_month += 1.0;
        }
        if record.chronic_disease {
            drift_per_month += 1.0;
        }
    }
    let at = |months: f64| round1((score + drift_per_month * months).min(100.0));

    FutureRisk {
        three_months: at(3.0),
        six_months: at(6.0),
        twelve_months: at(12.0),
        trend,
        preventable: severity != Severity::Severe && !record.chronic_disease,
    }
}

/// Follow-up advice shown with a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub icon: String,
    pub title: String,
    pub text: String,
}

fn rec(icon: &str, title: &str, text: &str) -> Recommendation {
    Recommendation {
        icon: icon.to_string(),
        title: title.to_string(),
        text: text.to_string(),
    }
}

/// Advice for a severity, with extras for pregnancy and chronic disease.
#[must_use]
pub fn recommendations(severity: Severity, record: &PatientRecord) -> Vec<Recommendation> {
    let mut out = match severity {
        Severity::Normal => vec![
            rec(
                "🥗",
                "Maintain a balanced diet",
                "Keep including iron-rich foods such as leafy greens, lentils and millets.",
            ),
            rec(
                "📅",
                "Routine check-up",
                "Repeat a blood count once a year or if symptoms appear.",
            ),
        ],
        Severity::Mild => vec![
            rec(
                "🥬",
                "Increase dietary iron",
                "Eat iron-rich foods daily and pair them with a vitamin C source.",
            ),
            rec(
                "☕",
                "Time your tea and coffee",
                "Avoid tea or coffee within an hour of iron-rich meals.",
            ),
            rec(
                "🔁",
                "Re-test in 3 months",
                "Repeat hemoglobin and ferritin to confirm improvement.",
            ),
        ],
        Severity::Moderate => vec![
            rec(
                "🩺",
                "Consult a doctor",
                "A physician should evaluate the cause and may prescribe iron supplements.",
            ),
            rec(
                "🥬",
                "Iron-focused diet",
                "Follow the iron-rich meal plan alongside any prescribed treatment.",
            ),
            rec(
                "🔁",
                "Re-test in 4-6 weeks",
                "Track the response to treatment with a repeat blood count.",
            ),
        ],
        Severity::Severe => vec![
            rec(
                "🚨",
                "Seek medical attention now",
                "Severe anemia needs prompt evaluation; intravenous iron or transfusion may be needed.",
            ),
            rec(
                "🛌",
                "Limit exertion",
                "Avoid strenuous activity until you have been assessed.",
            ),
        ],
    };

    if record.pregnancy && severity != Severity::Normal {
        out.push(rec(
            "🤰",
            "Prenatal iron and folic acid",
            "Discuss iron and folic acid supplementation with your obstetrician.",
        ));
    }
    if record.chronic_disease {
        out.push(rec(
            "💊",
            "Coordinate with your specialist",
            "Chronic conditions can cause anemia; review results with your treating doctor.",
        ));
    }
    out
}
