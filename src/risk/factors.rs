//! Correlation of features with the outcome, ranking, pairwise interactions and
//! a weighted per-patient factor score.

use crate::data::stats::pearson_test;
use crate::data::{FeatureTable, PatientRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FACTOR_WEIGHTS: &[(&str, f64)] = &[
    ("screen_time", 1.0),
    ("blink_frequency", 0.85),
    ("age", 0.71),
    ("sleep_quality", 0.63),
    ("stress_level", 0.58),
    ("humidity", 0.47),
    ("air_conditioner_use", 0.42),
];

const DEFAULT_WEIGHT: f64 = 0.1;
const DEFAULT_IMPORTANCE: f64 = 0.1;
const SIGNIFICANCE: f64 = 0.05;

pub fn factor_weight(feature: &str) -> Option<f64> {
    FACTOR_WEIGHTS.iter().find(|(f, _)| *f == feature).map(|(_, w)| *w)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
    Negligible,
}

impl CorrelationStrength {
    pub fn from_r(r: f64) -> Self {
        let r = r.abs();
        if r >= 0.7 {
            CorrelationStrength::Strong
        } else if r >= 0.5 {
            CorrelationStrength::Moderate
        } else if r >= 0.3 {
            CorrelationStrength::Weak
        } else {
            CorrelationStrength::Negligible
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub strength: CorrelationStrength,
}

impl Correlation {
    /// Pearson test of `x` against `y`; undefined correlations read as r = 0, p = 1.
    pub fn between(x: &[f64], y: &[f64]) -> Self {
        let (r, p_value) = pearson_test(x, y).unwrap_or((0.0, 1.0));
        Self {
            r,
            p_value,
            strength: CorrelationStrength::from_r(r),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    Importance,
    Correlation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSummary {
    pub value: f64,
    pub importance: f64,
    pub correlation: f64,
    pub risk_contribution: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorAnalyzer {
    importance: BTreeMap<String, f64>,
    correlations: BTreeMap<String, Correlation>,
}

fn column_as_f64(table: &FeatureTable, name: &str) -> Option<Vec<f64>> {
    table
        .numeric(name)
        .map(|v| v.iter().map(|x| x.unwrap_or(0.0)).collect())
}

impl FactorAnalyzer {
    pub fn new(importance: BTreeMap<String, f64>, correlations: BTreeMap<String, Correlation>) -> Self {
        Self {
            importance,
            correlations,
        }
    }

    pub fn set_importance(&mut self, importance: BTreeMap<String, f64>) {
        self.importance = importance;
    }

    pub fn importance(&self) -> &BTreeMap<String, f64> {
        &self.importance
    }

    pub fn correlations(&self) -> &BTreeMap<String, Correlation> {
        &self.correlations
    }

    /// Correlate every numeric column with the binary target.
    pub fn calculate_correlations(&mut self, table: &FeatureTable, target: &[usize]) -> &BTreeMap<String, Correlation> {
        let y: Vec<f64> = target.iter().map(|&t| t as f64).collect();
        self.correlations = table
            .numeric_column_names()
            .into_iter()
            .filter_map(|name| {
                let x = column_as_f64(table, &name)?;
                Some((name, Correlation::between(&x, &y)))
            })
            .collect();
        &self.correlations
    }

    /// Features with `|r| ≥ threshold` and p below 0.05.
    pub fn identify_risk_factors(&mut self, table: &FeatureTable, target: &[usize], threshold: f64) -> Vec<String> {
        self.calculate_correlations(table, target)
            .iter()
            .filter(|(_, c)| c.r.abs() >= threshold && c.p_value < SIGNIFICANCE)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Highest `n` features by importance or by `|r|`; ties keep name order.
    pub fn top_factors(&self, n: usize, by: RankBy) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = match by {
            RankBy::Importance => self.importance.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            RankBy::Correlation => self
                .correlations
                .iter()
                .map(|(k, c)| (k.clone(), c.r.abs()))
                .collect(),
        };
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    /// Pairwise correlations among `top` (default: top five by importance), keyed `a_x_b`.
    pub fn interactions(&self, table: &FeatureTable, top: Option<&[String]>) -> BTreeMap<String, Correlation> {
        let default_top: Vec<String>;
        let top = match top {
            Some(t) => t,
            None => {
                default_top = self
                    .top_factors(5, RankBy::Importance)
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect();
                &default_top
            }
        };
        let mut out = BTreeMap::new();
        for (i, a) in top.iter().enumerate() {
            for b in &top[i + 1..] {
                let (Some(xa), Some(xb)) = (column_as_f64(table, a), column_as_f64(table, b)) else {
                    continue;
                };
                out.insert(format!("{}_x_{}", a, b), Correlation::between(&xa, &xb));
            }
        }
        out
    }

    /// Per-feature summary for features present in `record` (default: all features with an importance).
    pub fn factor_summary(&self, record: &PatientRecord, features: Option<&[String]>) -> BTreeMap<String, FactorSummary> {
        let names: Vec<String> = match features {
            Some(f) => f.to_vec(),
            None => self.importance.keys().cloned().collect(),
        };
        names
            .into_iter()
            .filter_map(|name| {
                let value = record.number(&name)?;
                let importance = self.importance.get(&name).copied().unwrap_or(0.0);
                let correlation = self.correlations.get(&name).map_or(0.0, |c| c.r);
                let weight = factor_weight(&name).unwrap_or(DEFAULT_WEIGHT);
                Some((
                    name,
                    FactorSummary {
                        value,
                        importance,
                        correlation,
                        risk_contribution: importance * correlation.abs(),
                        weight,
                    },
                ))
            })
            .collect()
    }

    /// Weighted score over [`FACTOR_WEIGHTS`]; 0 when no weighted feature is present.
    pub fn risk_score(&self, record: &PatientRecord) -> f64 {
        self.risk_score_with(record, FACTOR_WEIGHTS)
    }

    pub fn risk_score_with(&self, record: &PatientRecord, weights: &[(&str, f64)]) -> f64 {
        let (mut score, mut total_weight) = (0.0, 0.0);
        for (feature, weight) in weights {
            let Some(value) = record.number(feature) else {
                continue;
            };
            let importance = self.importance.get(*feature).copied().unwrap_or(DEFAULT_IMPORTANCE);
            score += (value / 10.0).clamp(0.0, 1.0) * importance * weight;
            total_weight += weight;
        }
        if total_weight > 0.0 {
            score / total_weight
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use approx::assert_relative_eq;

    #[test]
    fn strength_bands() {
        assert_eq!(CorrelationStrength::from_r(-0.75), CorrelationStrength::Strong);
        assert_eq!(CorrelationStrength::from_r(0.5), CorrelationStrength::Moderate);
        assert_eq!(CorrelationStrength::from_r(0.3), CorrelationStrength::Weak);
        assert_eq!(CorrelationStrength::from_r(0.1), CorrelationStrength::Negligible);
    }

    #[test]
    fn risk_score_without_weighted_features_is_zero() {
        let a = FactorAnalyzer::default();
        assert_eq!(a.risk_score(&PatientRecord::new().with("unrelated", 5.0)), 0.0);
    }

    #[test]
    fn risk_score_uses_default_importance() {
        let a = FactorAnalyzer::default();
        let r = PatientRecord::new().with("screen_time", 20.0);
        // clamp(2.0) = 1 · 0.1 · 1.0 / 1.0
        assert_relative_eq!(a.risk_score(&r), 0.1);
    }

    #[test]
    fn risk_factors_need_significance() {
        let t = FeatureTable::from_columns(vec![
            Column::numeric("strong", (0..20).map(|i| Some(i as f64)).collect()),
            Column::numeric("noise", (0..20).map(|i| Some(((i * 7) % 5) as f64)).collect()),
        ])
        .unwrap();
        let y: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let mut a = FactorAnalyzer::default();
        let factors = a.identify_risk_factors(&t, &y, 0.1);
        assert_eq!(factors, vec!["strong".to_string()]);
        assert_eq!(a.correlations()["strong"].strength, CorrelationStrength::Strong);
    }

    #[test]
    fn summary_and_interactions() {
        let a = FactorAnalyzer::new(
            BTreeMap::from([("age".to_string(), 0.4), ("screen_time".to_string(), 0.6)]),
            BTreeMap::new(),
        );
        let s = a.factor_summary(&PatientRecord::new().with("age", 40.0), None);
        assert_eq!(s.len(), 1);
        assert_relative_eq!(s["age"].weight, 0.71);
        assert_eq!(s["age"].risk_contribution, 0.0);

        let t = FeatureTable::from_columns(vec![
            Column::numeric("age", vec![Some(1.0), Some(2.0), Some(3.0)]),
            Column::numeric("screen_time", vec![Some(2.0), Some(4.0), Some(6.0)]),
        ])
        .unwrap();
        let inter = a.interactions(&t, None);
        assert!(inter.contains_key("screen_time_x_age"));
    }
}
