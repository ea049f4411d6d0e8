//! Combines the risk model's probability with fixed category bands, confidence buckets,
//! cohort comparison, trends and alert thresholds.

use crate::config::RiskConfig;
use crate::data::stats::{mean, std_population};
use crate::data::{FeatureTable, PatientRecord};
use crate::error::Result;
use crate::model::{Classifier, Predictor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 3] = [RiskCategory::Low, RiskCategory::Medium, RiskCategory::High];

    /// Bands `[0, 0.3)`, `[0.3, 0.6)`, `[0.6, 1.0]`.
    pub fn from_probability(p: f64) -> Self {
        if p < 0.3 {
            RiskCategory::Low
        } else if p < 0.6 {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::Low => "Low Risk",
            RiskCategory::Medium => "Medium Risk",
            RiskCategory::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ConfidenceLevel::High
        } else if score >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::High => "High",
        };
        f.write_str(s)
    }
}

/// Risk result for a single patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub probability: f64,
    pub at_risk: bool,
    pub category: RiskCategory,
    pub confidence: ConfidenceLevel,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRisk {
    pub mean_risk: f64,
    pub distribution: BTreeMap<RiskCategory, usize>,
    pub positive_count: usize,
    pub total: usize,
    pub positive_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskComparison {
    pub individual: RiskAssessment,
    pub relative_risk: f64,
    pub percentile: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTrend {
    pub history: Vec<f64>,
    pub direction: TrendDirection,
    pub magnitude: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub level: AlertLevel,
    pub message: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub value: f64,
    pub importance: f64,
    pub contribution: f64,
    pub percentage: f64,
}

/// Known value ranges used to scale raw inputs into `[0, 1]`.
const FEATURE_RANGES: &[(&str, f64, f64)] = &[
    ("age", 0.0, 100.0),
    ("screen_time", 0.0, 16.0),
    ("blink_frequency", 0.0, 30.0),
    ("sleep_quality", 1.0, 5.0),
    ("stress_level", 1.0, 5.0),
];

/// Absorbs float error so a rise of exactly `rapid_increase` still alerts.
const RISE_TOLERANCE: f64 = 1e-9;

pub fn normalize_feature_value(feature: &str, value: f64) -> f64 {
    let scaled = match FEATURE_RANGES.iter().find(|(name, _, _)| *name == feature) {
        Some((_, lo, hi)) => (value - lo) / (hi - lo),
        None => value / 10.0,
    };
    scaled.clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct RiskAssessor {
    config: RiskConfig,
}

impl Default for RiskAssessor {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

impl RiskAssessor {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// `min(2·|p − threshold|, 1)`
    pub fn confidence_score(&self, p: f64) -> f64 {
        ((p - self.config.decision_threshold).abs() * 2.0).min(1.0)
    }

    pub fn assess_probability(&self, probability: f64) -> RiskAssessment {
        let probability = probability.clamp(0.0, 1.0);
        let confidence_score = self.confidence_score(probability);
        RiskAssessment {
            probability,
            at_risk: probability >= self.config.decision_threshold,
            category: RiskCategory::from_probability(probability),
            confidence: ConfidenceLevel::from_score(confidence_score),
            confidence_score,
        }
    }

    /// One assessment per row of `table`.
    pub fn assess<C: Classifier>(&self, predictor: &Predictor<C>, table: &FeatureTable) -> Result<Vec<RiskAssessment>> {
        Ok(predictor
            .predict_risk_probability(table)?
            .into_iter()
            .map(|p| self.assess_probability(p))
            .collect())
    }

    pub fn population(&self, probabilities: &[f64]) -> PopulationRisk {
        let mut distribution: BTreeMap<RiskCategory, usize> = BTreeMap::new();
        for &p in probabilities {
            *distribution.entry(RiskCategory::from_probability(p)).or_default() += 1;
        }
        let positive_count = probabilities
            .iter()
            .filter(|&&p| p >= self.config.decision_threshold)
            .count();
        let total = probabilities.len();
        PopulationRisk {
            mean_risk: mean(probabilities).unwrap_or(0.0),
            distribution,
            positive_count,
            total,
            positive_percentage: if total == 0 {
                0.0
            } else {
                positive_count as f64 / total as f64 * 100.0
            },
        }
    }

    /// Share of the baseline at or below `p`, as a percentage.
    pub fn percentile(&self, p: f64, baseline: &[f64]) -> Option<f64> {
        if baseline.is_empty() {
            return None;
        }
        let at_or_below = baseline.iter().filter(|&&b| b <= p).count();
        Some(at_or_below as f64 / baseline.len() as f64 * 100.0)
    }

    /// Individual risk relative to a baseline cohort. Without a baseline the relative risk is 1.
    pub fn compare(&self, patient: f64, baseline: Option<&[f64]>) -> RiskComparison {
        let individual = self.assess_probability(patient);
        let (relative_risk, percentile) = match baseline {
            Some(b) if !b.is_empty() => {
                let m = mean(b).unwrap_or(0.0);
                let relative = if m > 0.0 { individual.probability / m } else { 1.0 };
                (relative, self.percentile(individual.probability, b))
            }
            _ => (1.0, None),
        };
        RiskComparison {
            individual,
            relative_risk,
            percentile,
        }
    }

    /// Direction and size of change from first to last; `None` below two points.
    pub fn trend(&self, history: &[f64]) -> Option<RiskTrend> {
        let (first, last) = (*history.first()?, *history.last()?);
        if history.len() < 2 {
            return None;
        }
        let direction = if last > first {
            TrendDirection::Increasing
        } else if last < first {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };
        Some(RiskTrend {
            history: history.to_vec(),
            direction,
            magnitude: (last - first).abs(),
            volatility: std_population(history),
        })
    }

    /// Threshold alerts for the current assessment, plus a rapid-increase alert
    /// when a previous probability is known.
    pub fn alerts(&self, assessment: &RiskAssessment, previous: Option<f64>) -> Vec<RiskAlert> {
        let p = assessment.probability;
        let mut alerts = Vec::new();
        if p >= self.config.alert_high {
            alerts.push(RiskAlert {
                level: AlertLevel::High,
                message: "High risk of dry eye disease detected".into(),
                action: "Immediate consultation recommended".into(),
            });
        } else if p >= self.config.alert_medium {
            alerts.push(RiskAlert {
                level: AlertLevel::Medium,
                message: "Moderate risk of dry eye disease".into(),
                action: "Preventive measures recommended".into(),
            });
        }
        if let Some(prev) = previous {
            if p - prev >= self.config.rapid_increase - RISE_TOLERANCE {
                alerts.push(RiskAlert {
                    level: AlertLevel::High,
                    message: format!("Risk increased by {:.0} points since last assessment", (p - prev) * 100.0),
                    action: "Review recent lifestyle changes with a specialist".into(),
                });
            }
        }
        alerts
    }

    /// Per-feature share of `total_risk` for features present in both the record and `importance`.
    pub fn contributions(
        &self,
        record: &PatientRecord,
        importance: &BTreeMap<String, f64>,
        total_risk: f64,
    ) -> BTreeMap<String, FactorContribution> {
        importance
            .iter()
            .filter_map(|(feature, &imp)| {
                let value = record.number(feature)?;
                let contribution = normalize_feature_value(feature, value) * imp;
                let percentage = if total_risk > 0.0 {
                    contribution / total_risk * 100.0
                } else {
                    0.0
                };
                Some((
                    feature.clone(),
                    FactorContribution {
                        value,
                        importance: imp,
                        contribution,
                        percentage,
                    },
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn category_bands() {
        assert_eq!(RiskCategory::from_probability(0.29), RiskCategory::Low);
        assert_eq!(RiskCategory::from_probability(0.59), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_probability(0.6), RiskCategory::High);
        assert_eq!(RiskCategory::from_probability(1.0), RiskCategory::High);
    }

    #[test]
    fn confidence_buckets() {
        let a = RiskAssessor::default();
        assert_eq!(a.assess_probability(0.5).confidence, ConfidenceLevel::Low);
        assert_eq!(a.assess_probability(0.8).confidence, ConfidenceLevel::Medium);
        assert_eq!(a.assess_probability(0.95).confidence, ConfidenceLevel::High);
        assert!(a.assess_probability(0.5).at_risk);
    }

    #[test]
    fn percentile_and_trend() {
        let a = RiskAssessor::default();
        assert_relative_eq!(a.percentile(0.5, &[0.1, 0.5, 0.9, 0.7]).unwrap(), 50.0);
        let t = a.trend(&[0.2, 0.4]).unwrap();
        assert_eq!(t.direction, TrendDirection::Increasing);
        assert_relative_eq!(t.magnitude, 0.2);
        assert_relative_eq!(t.volatility, 0.1);
        assert!(a.trend(&[0.2]).is_none());
    }

    #[test]
    fn alerts_include_rapid_increase() {
        let a = RiskAssessor::default();
        let now = a.assess_probability(0.75);
        let alerts = a.alerts(&now, Some(0.5));
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].level, AlertLevel::High);
        assert!(a.alerts(&a.assess_probability(0.1), None).is_empty());
    }

    #[test]
    fn rapid_increase_fires_at_exact_boundary() {
        let a = RiskAssessor::default();
        let alerts = a.alerts(&a.assess_probability(0.7), Some(0.5));
        assert_eq!(alerts.len(), 2);
        assert!(alerts[1].message.starts_with("Risk increased by 20 points"));
        assert_eq!(a.alerts(&a.assess_probability(0.69), Some(0.5)).len(), 1);
    }

    #[test]
    fn contributions_guard_zero_total() {
        let a = RiskAssessor::default();
        let record = PatientRecord::new().with("screen_time", 8.0);
        let imp = BTreeMap::from([("screen_time".to_string(), 0.5), ("age".to_string(), 0.2)]);
        let c = a.contributions(&record, &imp, 0.0);
        assert_eq!(c.len(), 1);
        assert_relative_eq!(c["screen_time"].contribution, 0.25);
        assert_eq!(c["screen_time"].percentage, 0.0);
    }
}
