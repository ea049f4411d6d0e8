//! Rule-driven recommendations, priority ordering and follow-up cadence.

use super::rules::{IMPORTANCE_PRIORITISED, LIFESTYLE_RULES};
use crate::data::PatientRecord;
use crate::risk::{RiskAssessment, RiskCategory, SeverityLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    /// `> 0.7` Critical, `> 0.4` High, else Medium.
    pub fn from_importance(importance: f64) -> Self {
        if importance > 0.7 {
            Priority::Critical
        } else if importance > 0.4 {
            Priority::High
        } else {
            Priority::Medium
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Lifestyle,
    Environment,
    Medical,
    Behavioral,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: Category,
    pub factor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<f64>,
    pub message: String,
    pub priority: Priority,
}

impl Recommendation {
    fn new(category: Category, factor: &str, current_value: Option<f64>, message: &str, priority: Priority) -> Self {
        Self {
            category,
            factor: factor.to_string(),
            current_value,
            message: message.to_string(),
            priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpPlan {
    pub next_assessment: String,
    pub follow_up_frequency: String,
    pub monitoring_duration: String,
    pub specialist_referral: bool,
}

/// Stable sort, highest priority first.
pub fn sort_by_priority(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationGenerator;

impl RecommendationGenerator {
    pub fn new() -> Self {
        Self
    }

    fn priority_for(&self, factor: &str, importance: &BTreeMap<String, f64>) -> Priority {
        if IMPORTANCE_PRIORITISED.contains(&factor) {
            Priority::from_importance(importance.get(factor).copied().unwrap_or(0.0))
        } else {
            Priority::Medium
        }
    }

    pub fn lifestyle(&self, record: &PatientRecord, importance: &BTreeMap<String, f64>) -> Vec<Recommendation> {
        LIFESTYLE_RULES
            .iter()
            .filter_map(|rule| {
                let value = record.number(rule.factor)?;
                rule.condition.matches(value).then(|| {
                    Recommendation::new(
                        Category::Lifestyle,
                        rule.factor,
                        Some(value),
                        rule.message,
                        self.priority_for(rule.factor, importance),
                    )
                })
            })
            .collect()
    }

    pub fn environmental(&self, record: &PatientRecord) -> Vec<Recommendation> {
        let mut out = Vec::new();
        let humidity = record.number("humidity").unwrap_or(50.0);
        if humidity < 40.0 {
            out.push(Recommendation::new(
                Category::Environment,
                "humidity",
                Some(humidity),
                "Use a humidifier to maintain humidity between 40-60%",
                Priority::High,
            ));
        }
        let air_conditioner = record.number("air_conditioner_use").unwrap_or(0.0);
        if air_conditioner != 0.0 {
            out.push(Recommendation::new(
                Category::Environment,
                "air_conditioning",
                Some(air_conditioner),
                "Reduce direct exposure to air conditioning, use eye drops",
                Priority::Medium,
            ));
        }
        out
    }

    pub fn medical(&self, severity: SeverityLevel, risk_probability: f64) -> Vec<Recommendation> {
        let mut out = Vec::new();
        if risk_probability >= 0.7 {
            out.push(Recommendation::new(
                Category::Medical,
                "high_risk",
                None,
                "Schedule immediate ophthalmological consultation",
                Priority::Critical,
            ));
        } else if risk_probability >= 0.4 {
            out.push(Recommendation::new(
                Category::Medical,
                "medium_risk",
                None,
                "Consider routine eye examination within 3 months",
                Priority::High,
            ));
        }
        if severity >= SeverityLevel::Moderate {
            out.push(Recommendation::new(
                Category::Medical,
                "severity",
                None,
                "Consider artificial tears or prescription eye drops",
                Priority::High,
            ));
        }
        out
    }

    pub fn behavioral(&self, record: &PatientRecord) -> Vec<Recommendation> {
        let mut out = Vec::new();
        let screen_time = record.number("screen_time").unwrap_or(0.0);
        if screen_time > 8.0 {
            out.push(Recommendation::new(
                Category::Behavioral,
                "screen_time",
                Some(screen_time),
                "Follow 20-20-20 rule: every 20 minutes, look at something 20 feet away for 20 seconds",
                Priority::High,
            ));
        }
        let blink = record.number("blink_frequency").unwrap_or(20.0);
        if blink < 15.0 {
            out.push(Recommendation::new(
                Category::Behavioral,
                "blinking",
                Some(blink),
                "Practice conscious blinking exercises, blink fully and frequently",
                Priority::High,
            ));
        }
        out
    }

    /// Lifestyle, environmental, medical and behavioral advice, highest priority first.
    pub fn generate(
        &self,
        record: &PatientRecord,
        risk: &RiskAssessment,
        severity: SeverityLevel,
        importance: &BTreeMap<String, f64>,
    ) -> Vec<Recommendation> {
        let mut all = self.lifestyle(record, importance);
        all.extend(self.environmental(record));
        all.extend(self.medical(severity, risk.probability));
        all.extend(self.behavioral(record));
        sort_by_priority(&mut all);
        all
    }

    pub fn group_by_priority(&self, recommendations: &[Recommendation]) -> BTreeMap<Priority, Vec<Recommendation>> {
        let mut groups: BTreeMap<Priority, Vec<Recommendation>> = BTreeMap::new();
        for r in recommendations {
            groups.entry(r.priority).or_default().push(r.clone());
        }
        groups
    }

    pub fn follow_up_plan(&self, category: RiskCategory, severity: SeverityLevel) -> FollowUpPlan {
        let (next, frequency, duration, referral) =
            if category == RiskCategory::High || severity >= SeverityLevel::Severe {
                ("2 weeks", "Bi-weekly", "3 months", true)
            } else if category == RiskCategory::Medium || severity >= SeverityLevel::Moderate {
                ("1 month", "Monthly", "6 months", false)
            } else {
                ("3 months", "Quarterly", "1 year", false)
            };
        FollowUpPlan {
            next_assessment: next.to_string(),
            follow_up_frequency: frequency.to_string(),
            monitoring_duration: duration.to_string(),
            specialist_referral: referral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskAssessor;

    #[test]
    fn priority_sort_is_stable() {
        let mut recs = vec![
            Recommendation::new(Category::Lifestyle, "a", None, "a", Priority::Medium),
            Recommendation::new(Category::Lifestyle, "b", None, "b", Priority::High),
            Recommendation::new(Category::Lifestyle, "c", None, "c", Priority::Medium),
            Recommendation::new(Category::Lifestyle, "d", None, "d", Priority::Critical),
            Recommendation::new(Category::Lifestyle, "e", None, "e", Priority::High),
        ];
        sort_by_priority(&mut recs);
        let order: Vec<&str> = recs.iter().map(|r| r.factor.as_str()).collect();
        assert_eq!(order, vec!["d", "b", "e", "a", "c"]);
    }

    #[test]
    fn high_risk_patient_gets_consult_first() {
        let g = RecommendationGenerator;
        let record = PatientRecord::new()
            .with("screen_time", 10.0)
            .with("blink_frequency", 12.0)
            .with("air_conditioner_use", "Yes");
        let importance = BTreeMap::from([("screen_time".to_string(), 0.8)]);
        let risk = RiskAssessor::default().assess_probability(0.75);
        let recs = g.generate(&record, &risk, SeverityLevel::Moderate, &importance);
        assert_eq!(recs[0].priority, Priority::Critical);
        assert!(recs.iter().any(|r| r.factor == "high_risk"));
        assert!(recs.iter().any(|r| r.factor == "air_conditioning"));
        assert!(recs.windows(2).all(|w| w[0].priority.rank() >= w[1].priority.rank()));
        let groups = g.group_by_priority(&recs);
        assert_eq!(groups[&Priority::Critical].len(), 2);
    }

    #[test]
    fn follow_up_tiers() {
        let g = RecommendationGenerator;
        assert!(g.follow_up_plan(RiskCategory::Low, SeverityLevel::Severe).specialist_referral);
        assert_eq!(
            g.follow_up_plan(RiskCategory::Medium, SeverityLevel::NoRisk).next_assessment,
            "1 month"
        );
        assert_eq!(
            g.follow_up_plan(RiskCategory::Low, SeverityLevel::Mild).monitoring_duration,
            "1 year"
        );
    }
}
