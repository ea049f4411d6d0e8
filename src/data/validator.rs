//! Declarative per-field domain checks. Findings are collected, never fatal.

use super::record::format_number;
use super::stats::variance_sample;
use super::table::{ColumnData, FeatureTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule {
    Numeric { min: f64, max: f64 },
    Categorical { allowed: &'static [&'static str] },
}

pub const VALIDATION_RULES: &[(&str, FieldRule)] = &[
    ("age", FieldRule::Numeric { min: 0.0, max: 120.0 }),
    ("screen_time", FieldRule::Numeric { min: 0.0, max: 24.0 }),
    ("blink_frequency", FieldRule::Numeric { min: 0.0, max: 50.0 }),
    ("sleep_quality", FieldRule::Numeric { min: 1.0, max: 5.0 }),
    ("stress_level", FieldRule::Numeric { min: 1.0, max: 5.0 }),
    ("physical_activity", FieldRule::Numeric { min: 0.0, max: 300.0 }),
    ("humidity", FieldRule::Numeric { min: 0.0, max: 100.0 }),
    ("gender", FieldRule::Categorical { allowed: &["0", "1", "M", "F"] }),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Type,
    Range,
    Categorical,
    Missing,
}

/// A non-fatal finding against the field rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub column: String,
    pub kind: IssueKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    pub duplicates: usize,
    pub missing_percentage: BTreeMap<String, f64>,
    pub zero_variance: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub quality: QualityReport,
}

pub struct Validator {
    rules: &'static [(&'static str, FieldRule)],
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            rules: VALIDATION_RULES,
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(&self, column: &str) -> Option<FieldRule> {
        self.rules
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, r)| *r)
    }

    pub fn validate_types(&self, table: &FeatureTable) -> Vec<ValidationIssue> {
        table
            .columns()
            .iter()
            .filter(|c| matches!(self.rule(&c.name), Some(FieldRule::Numeric { .. })) && !c.is_numeric())
            .map(|c| ValidationIssue {
                column: c.name.clone(),
                kind: IssueKind::Type,
                message: format!("Column {} should be numeric", c.name),
            })
            .collect()
    }

    pub fn validate_ranges(&self, table: &FeatureTable) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for c in table.columns() {
            let (Some(FieldRule::Numeric { min, max }), ColumnData::Numeric(values)) = (self.rule(&c.name), &c.data)
            else {
                continue;
            };
            let invalid = values
                .iter()
                .flatten()
                .filter(|v| **v < min || **v > max)
                .count();
            if invalid > 0 {
                issues.push(ValidationIssue {
                    column: c.name.clone(),
                    kind: IssueKind::Range,
                    message: format!(
                        "Column {} has {} values outside range [{}, {}]",
                        c.name,
                        invalid,
                        format_number(min),
                        format_number(max)
                    ),
                });
            }
        }
        issues
    }

    pub fn validate_categorical(&self, table: &FeatureTable) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for c in table.columns() {
            let Some(FieldRule::Categorical { allowed }) = self.rule(&c.name) else {
                continue;
            };
            let present: Vec<String> = match &c.data {
                ColumnData::Numeric(v) => v.iter().flatten().map(|x| format_number(*x)).collect(),
                ColumnData::Categorical(v) => v.iter().flatten().cloned().collect(),
            };
            let invalid: BTreeSet<String> = present
                .into_iter()
                .filter(|v| !allowed.contains(&v.as_str()))
                .collect();
            if !invalid.is_empty() {
                issues.push(ValidationIssue {
                    column: c.name.clone(),
                    kind: IssueKind::Categorical,
                    message: format!(
                        "Column {} has invalid values: {}",
                        c.name,
                        invalid.into_iter().collect::<Vec<_>>().join(", ")
                    ),
                });
            }
        }
        issues
    }

    pub fn check_missing(&self, table: &FeatureTable, required: &[String]) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for name in required {
            match table.column(name) {
                None => issues.push(ValidationIssue {
                    column: name.clone(),
                    kind: IssueKind::Missing,
                    message: format!("Required column {} is missing", name),
                }),
                Some(c) if c.missing_count() > 0 => issues.push(ValidationIssue {
                    column: name.clone(),
                    kind: IssueKind::Missing,
                    message: format!("Column {} has {} missing values", name, c.missing_count()),
                }),
                Some(_) => {}
            }
        }
        issues
    }

    pub fn quality(&self, table: &FeatureTable) -> QualityReport {
        let mut seen = HashSet::new();
        let duplicates = (0..table.n_rows())
            .filter(|&i| !seen.insert(table.row_signature(i)))
            .count();
        let rows = table.n_rows().max(1) as f64;
        let missing_percentage = table
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.missing_count() as f64 / rows * 100.0))
            .collect();
        let zero_variance = table
            .numeric_column_names()
            .into_iter()
            .filter(|name| variance_sample(&table.present_values(name)) == Some(0.0))
            .collect();
        QualityReport {
            duplicates,
            missing_percentage,
            zero_variance,
        }
    }

    pub fn validate_all(&self, table: &FeatureTable, required: &[String]) -> ValidationReport {
        let mut errors = self.validate_types(table);
        errors.extend(self.validate_ranges(table));
        errors.extend(self.validate_categorical(table));
        errors.extend(self.check_missing(table, required));
        ValidationReport {
            is_valid: errors.is_empty(),
            errors,
            quality: self.quality(table),
        }
    }
}
