//! Severity classification. The model path is used when a severity model is loaded; otherwise
//! ordinal scores from fixed step tables are summed and banded.

use crate::data::stats::std_population;
use crate::data::{FeatureTable, PatientRecord};
use crate::error::Result;
use crate::model::{Classifier, ModelKind, Predictor};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SeverityLevel {
    NoRisk = 0,
    Mild = 1,
    Moderate = 2,
    Severe = 3,
}

impl SeverityLevel {
    pub const ALL: [SeverityLevel; 4] = [
        SeverityLevel::NoRisk,
        SeverityLevel::Mild,
        SeverityLevel::Moderate,
        SeverityLevel::Severe,
    ];

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SeverityLevel::NoRisk => "No Risk",
            SeverityLevel::Mild => "Mild",
            SeverityLevel::Moderate => "Moderate",
            SeverityLevel::Severe => "Severe",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SeverityLevel::NoRisk => "No significant dry eye symptoms. Maintain good eye hygiene.",
            SeverityLevel::Mild => "Mild dry eye symptoms. Monitor and implement basic preventive measures.",
            SeverityLevel::Moderate => {
                "Moderate dry eye symptoms. Consider lifestyle modifications and regular monitoring."
            }
            SeverityLevel::Severe => {
                "Severe dry eye symptoms. Professional consultation and treatment recommended."
            }
        }
    }

    /// Bands on the summed rule score: ≤5, ≤10, ≤15, above.
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=5 => SeverityLevel::NoRisk,
            6..=10 => SeverityLevel::Mild,
            11..=15 => SeverityLevel::Moderate,
            _ => SeverityLevel::Severe,
        }
    }
}

impl From<SeverityLevel> for u8 {
    fn from(l: SeverityLevel) -> u8 {
        l as u8
    }
}

impl TryFrom<u8> for SeverityLevel {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        SeverityLevel::from_index(v as usize).ok_or_else(|| format!("severity level {} outside 0..=3", v))
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Model-based and rule-based results carry different evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SeverityAssessment {
    ModelBased {
        level: SeverityLevel,
        probabilities: [f64; 4],
        confidence: f64,
    },
    RuleBased {
        level: SeverityLevel,
        score: u32,
        confidence: f64,
    },
}

impl SeverityAssessment {
    pub fn level(&self) -> SeverityLevel {
        match self {
            SeverityAssessment::ModelBased { level, .. } | SeverityAssessment::RuleBased { level, .. } => *level,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            SeverityAssessment::ModelBased { confidence, .. }
            | SeverityAssessment::RuleBased { confidence, .. } => *confidence,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            SeverityAssessment::ModelBased { .. } => "model",
            SeverityAssessment::RuleBased { .. } => "rules",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    /// Higher values are worse: score applies when value ≥ bound
    AtLeast,
    /// Lower values are worse: score applies when value ≤ bound
    AtMost,
}

/// (feature, default when absent, direction, steps checked in order)
const SEVERITY_STEPS: &[(&str, f64, Direction, &[(f64, u32)])] = &[
    ("screen_time", 0.0, Direction::AtLeast, &[(12.0, 4), (8.0, 3), (6.0, 2), (4.0, 1)]),
    ("blink_frequency", 20.0, Direction::AtMost, &[(10.0, 4), (12.0, 3), (15.0, 2), (18.0, 1)]),
    ("age", 30.0, Direction::AtLeast, &[(50.0, 3), (40.0, 2), (30.0, 1)]),
    ("sleep_quality", 3.0, Direction::AtMost, &[(2.0, 3), (3.0, 2), (4.0, 1)]),
    ("stress_level", 2.0, Direction::AtLeast, &[(4.0, 3), (3.0, 2), (2.0, 1)]),
];

const RULE_CONFIDENCE: f64 = 0.7;

/// Ordinal contribution of one feature value; 0 for features without a step table.
pub fn feature_score(feature: &str, value: f64) -> u32 {
    let Some((_, _, direction, steps)) = SEVERITY_STEPS.iter().find(|(name, ..)| *name == feature) else {
        return 0;
    };
    steps
        .iter()
        .find(|(bound, _)| match direction {
            Direction::AtLeast => value >= *bound,
            Direction::AtMost => value <= *bound,
        })
        .map_or(0, |(_, score)| *score)
}

/// Summed ordinal score over the step tables, using defaults for absent features.
pub fn rule_score(record: &PatientRecord) -> u32 {
    SEVERITY_STEPS
        .iter()
        .map(|(name, default, _, _)| feature_score(name, record.number(name).unwrap_or(*default)))
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProgressionRisk {
    Low,
    Medium,
    High,
}

impl fmt::Display for ProgressionRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressionRisk::Low => "Low",
            ProgressionRisk::Medium => "Medium",
            ProgressionRisk::High => "High",
        };
        f.write_str(s)
    }
}

/// Risk flags that raise progression risk by one point each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionFlags {
    pub high_screen_time: bool,
    pub low_blink_frequency: bool,
    pub poor_sleep_quality: bool,
    pub high_stress: bool,
}

impl ProgressionFlags {
    pub fn from_record(record: &PatientRecord) -> Self {
        Self {
            high_screen_time: record.number("screen_time").map_or(false, |v| v > 8.0),
            low_blink_frequency: record.number("blink_frequency").map_or(false, |v| v < 15.0),
            poor_sleep_quality: record.number("sleep_quality").map_or(false, |v| v < 3.0),
            high_stress: record.number("stress_level").map_or(false, |v| v > 3.0),
        }
    }

    fn count(&self) -> u32 {
        [
            self.high_screen_time,
            self.low_blink_frequency,
            self.poor_sleep_quality,
            self.high_stress,
        ]
        .iter()
        .filter(|f| **f)
        .count() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityDirection {
    Worsening,
    Improving,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    Stable,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityTrend {
    pub direction: SeverityDirection,
    pub change: i32,
    pub volatility: f64,
    pub consistency: Consistency,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityClassifier;

impl SeverityClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Model path when the predictor holds a severity model, rule path otherwise.
    /// `features` is the transformed one-row table; `record` is the raw input.
    pub fn classify<C: Classifier>(
        &self,
        predictor: &Predictor<C>,
        features: &FeatureTable,
        record: &PatientRecord,
    ) -> Result<SeverityAssessment> {
        if !predictor.is_trained(ModelKind::Severity) {
            return Ok(self.classify_rules(record));
        }
        let proba = predictor.predict_severity_probability(features)?;
        let mut probabilities = [0.0; 4];
        for (slot, v) in probabilities.iter_mut().zip(proba.row(0).iter()) {
            *slot = *v;
        }
        let index = crate::model::argmax(probabilities.iter().copied());
        let confidence = probabilities.iter().copied().fold(0.0, f64::max);
        Ok(SeverityAssessment::ModelBased {
            level: SeverityLevel::from_index(index).unwrap_or(SeverityLevel::NoRisk),
            probabilities,
            confidence,
        })
    }

    pub fn classify_rules(&self, record: &PatientRecord) -> SeverityAssessment {
        let score = rule_score(record);
        SeverityAssessment::RuleBased {
            level: SeverityLevel::from_score(score),
            score,
            confidence: RULE_CONFIDENCE,
        }
    }

    /// `2·level` plus one per flag: ≤3 Low, ≤6 Medium, else High.
    pub fn progression_risk(&self, level: SeverityLevel, flags: &ProgressionFlags) -> ProgressionRisk {
        match 2 * level.index() as u32 + flags.count() {
            0..=3 => ProgressionRisk::Low,
            4..=6 => ProgressionRisk::Medium,
            _ => ProgressionRisk::High,
        }
    }

    pub fn monitoring_frequency(&self, level: SeverityLevel, progression: ProgressionRisk) -> &'static str {
        if level >= SeverityLevel::Severe || progression == ProgressionRisk::High {
            "Weekly monitoring recommended"
        } else if level >= SeverityLevel::Moderate || progression == ProgressionRisk::Medium {
            "Bi-weekly monitoring recommended"
        } else if level >= SeverityLevel::Mild {
            "Monthly monitoring recommended"
        } else {
            "Quarterly monitoring sufficient"
        }
    }

    /// Compare first and last levels; `None` below two points.
    pub fn trend(&self, history: &[SeverityLevel]) -> Option<SeverityTrend> {
        if history.len() < 2 {
            return None;
        }
        let first = history[0].index() as i32;
        let last = history[history.len() - 1].index() as i32;
        let direction = match last.cmp(&first) {
            std::cmp::Ordering::Greater => SeverityDirection::Worsening,
            std::cmp::Ordering::Less => SeverityDirection::Improving,
            std::cmp::Ordering::Equal => SeverityDirection::Stable,
        };
        let volatility = if history.len() > 2 {
            let values: Vec<f64> = history.iter().map(|l| l.index() as f64).collect();
            std_population(&values)
        } else {
            0.0
        };
        Some(SeverityTrend {
            direction,
            change: last - first,
            volatility,
            consistency: if volatility <= 0.5 {
                Consistency::Stable
            } else {
                Consistency::Variable
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_tables() {
        assert_eq!(feature_score("screen_time", 12.0), 4);
        assert_eq!(feature_score("screen_time", 3.9), 0);
        assert_eq!(feature_score("blink_frequency", 10.0), 4);
        assert_eq!(feature_score("blink_frequency", 19.0), 0);
        assert_eq!(feature_score("sleep_quality", 5.0), 0);
        assert_eq!(feature_score("humidity", 10.0), 0);
    }

    #[test]
    fn defaults_for_absent_features() {
        // age 30 → 1, sleep 3 → 2, stress 2 → 1
        assert_eq!(rule_score(&PatientRecord::new()), 4);
        assert_eq!(SeverityClassifier.classify_rules(&PatientRecord::new()).level(), SeverityLevel::NoRisk);
    }

    #[test]
    fn bands_are_monotone() {
        let mut prev = SeverityLevel::NoRisk;
        for score in 0..=20 {
            let level = SeverityLevel::from_score(score);
            assert!(level >= prev);
            prev = level;
        }
        assert_eq!(SeverityLevel::from_score(5), SeverityLevel::NoRisk);
        assert_eq!(SeverityLevel::from_score(6), SeverityLevel::Mild);
        assert_eq!(SeverityLevel::from_score(16), SeverityLevel::Severe);
    }

    #[test]
    fn progression_and_monitoring() {
        let c = SeverityClassifier;
        let flags = ProgressionFlags {
            high_screen_time: true,
            high_stress: true,
            ..Default::default()
        };
        let p = c.progression_risk(SeverityLevel::Moderate, &flags);
        assert_eq!(p, ProgressionRisk::Medium);
        assert_eq!(c.monitoring_frequency(SeverityLevel::Mild, p), "Bi-weekly monitoring recommended");
        assert_eq!(
            c.monitoring_frequency(SeverityLevel::NoRisk, ProgressionRisk::Low),
            "Quarterly monitoring sufficient"
        );
    }

    #[test]
    fn severity_trend() {
        let c = SeverityClassifier;
        let t = c.trend(&[SeverityLevel::Mild, SeverityLevel::Severe]).unwrap();
        assert_eq!(t.direction, SeverityDirection::Worsening);
        assert_eq!(t.change, 2);
        assert_eq!(t.volatility, 0.0);
        let t = c
            .trend(&[SeverityLevel::Severe, SeverityLevel::NoRisk, SeverityLevel::Mild])
            .unwrap();
        assert_eq!(t.direction, SeverityDirection::Improving);
        assert_eq!(t.consistency, Consistency::Variable);
    }

    #[test]
    fn serialises_level_as_number() {
        let json = serde_json::to_string(&SeverityLevel::Moderate).unwrap();
        assert_eq!(json, "2");
        assert!(serde_json::from_str::<SeverityLevel>("7").is_err());
    }
}
