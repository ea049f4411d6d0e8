//! Patient and batch report assembly.

use crate::data::{format_number, PatientRecord, Value};
use crate::recommend::{FollowUpPlan, Gender, Recommendation};
use crate::risk::{FactorSummary, RiskAssessment, SeverityAssessment, SeverityLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub age: String,
    pub gender: String,
    pub screen_time: String,
    pub sleep_quality: String,
    pub stress_level: String,
}

fn shown(record: &PatientRecord, name: &str) -> String {
    match record.get(name) {
        Some(Value::Missing) | None => "N/A".to_string(),
        Some(v) => v.as_number().map(format_number).or_else(|| v.as_text()).unwrap_or_else(|| "N/A".into()),
    }
}

impl PatientInfo {
    pub fn from_record(record: &PatientRecord) -> Self {
        let gender = match Gender::from_value(record.get("gender")) {
            Gender::Female => "Female",
            Gender::Male => "Male",
        };
        Self {
            age: shown(record, "age"),
            gender: gender.to_string(),
            screen_time: format!("{} hours/day", shown(record, "screen_time")),
            sleep_quality: format!("{}/5", shown(record, "sleep_quality")),
            stress_level: format!("{}/5", shown(record, "stress_level")),
        }
    }

    /// (label, value) pairs in display order.
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("age", self.age.as_str()),
            ("gender", self.gender.as_str()),
            ("screen_time", self.screen_time.as_str()),
            ("sleep_quality", self.sleep_quality.as_str()),
            ("stress_level", self.stress_level.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientReport {
    pub report_id: Uuid,
    pub assessment_date: DateTime<Utc>,
    pub patient_info: PatientInfo,
    pub risk_assessment: RiskAssessment,
    pub severity_assessment: SeverityAssessment,
    pub key_factors: BTreeMap<String, FactorSummary>,
    pub recommendations: Vec<Recommendation>,
    pub follow_up: FollowUpPlan,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub total_assessments: usize,
    pub average_risk: f64,
    pub high_risk_count: usize,
    pub average_severity: f64,
    pub severe_cases: usize,
    pub risk_distribution: RiskDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generation_date: DateTime<Utc>,
    pub summary_statistics: Option<SummaryStatistics>,
    pub individual_reports: Vec<PatientReport>,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(
        &self,
        record: &PatientRecord,
        risk: &RiskAssessment,
        severity: &SeverityAssessment,
        key_factors: BTreeMap<String, FactorSummary>,
        recommendations: Vec<Recommendation>,
        follow_up: FollowUpPlan,
    ) -> PatientReport {
        PatientReport {
            report_id: Uuid::new_v4(),
            assessment_date: Utc::now(),
            patient_info: PatientInfo::from_record(record),
            risk_assessment: risk.clone(),
            severity_assessment: severity.clone(),
            key_factors,
            recommendations,
            follow_up,
        }
    }

    /// `None` for an empty batch.
    pub fn summary_statistics(&self, reports: &[PatientReport]) -> Option<SummaryStatistics> {
        if reports.is_empty() {
            return None;
        }
        let n = reports.len() as f64;
        let risks: Vec<f64> = reports.iter().map(|r| r.risk_assessment.probability).collect();
        let levels: Vec<SeverityLevel> = reports.iter().map(|r| r.severity_assessment.level()).collect();
        Some(SummaryStatistics {
            total_assessments: reports.len(),
            average_risk: risks.iter().sum::<f64>() / n,
            high_risk_count: risks.iter().filter(|&&p| p >= 0.6).count(),
            average_severity: levels.iter().map(|l| l.index() as f64).sum::<f64>() / n,
            severe_cases: levels.iter().filter(|&&l| l >= SeverityLevel::Severe).count(),
            risk_distribution: RiskDistribution {
                low: risks.iter().filter(|&&p| p < 0.3).count(),
                medium: risks.iter().filter(|&&p| (0.3..0.6).contains(&p)).count(),
                high: risks.iter().filter(|&&p| p >= 0.6).count(),
            },
        })
    }

    pub fn batch_report(&self, reports: Vec<PatientReport>, failures: Vec<BatchFailure>) -> BatchReport {
        BatchReport {
            generation_date: Utc::now(),
            summary_statistics: self.summary_statistics(&reports),
            individual_reports: reports,
            failures,
        }
    }
}
