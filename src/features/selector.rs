//! Feature selection over the numeric columns of a cleaned table.

use crate::config::SelectionConfig;
use crate::data::stats::{mean, pearson, variance_sample};
use crate::data::FeatureTable;
use crate::error::Result;
use crate::model::{BoostedTrees, BoostingParams, Classifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Keep features whose model importance is at least `threshold`
    Importance { threshold: f64 },
    /// Top `k` by ANOVA F score
    KBest { k: usize },
    /// Refit and drop the least important feature until `n_features` remain
    Recursive { n_features: usize },
    /// Drop the later column of any pair with `|r| > threshold`
    Correlation { threshold: f64 },
    /// Drop columns with sample variance at or below `threshold`
    Variance { threshold: f64 },
    None,
}

impl SelectionMethod {
    pub fn from_config(cfg: &SelectionConfig) -> Self {
        match cfg.method.as_str() {
            "importance" => SelectionMethod::Importance { threshold: cfg.threshold },
            "k_best" => SelectionMethod::KBest { k: cfg.k_best },
            "rfe" | "recursive" => SelectionMethod::Recursive {
                n_features: cfg.n_features,
            },
            "correlation" => SelectionMethod::Correlation { threshold: 0.95 },
            "variance" => SelectionMethod::Variance { threshold: 0.01 },
            _ => SelectionMethod::None,
        }
    }
}

/// One-way ANOVA F statistic of `values` grouped by `labels`. Zero when undefined.
pub fn anova_f(values: &[f64], labels: &[usize]) -> f64 {
    let mut groups: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for (&v, &l) in values.iter().zip(labels) {
        groups.entry(l).or_default().push(v);
    }
    let n = values.len();
    let k = groups.len();
    let Some(grand) = mean(values) else {
        return 0.0;
    };
    if k < 2 || n <= k {
        return 0.0;
    }
    let (mut ssb, mut ssw) = (0.0, 0.0);
    for g in groups.values() {
        let gm = g.iter().sum::<f64>() / g.len() as f64;
        ssb += g.len() as f64 * (gm - grand).powi(2);
        ssw += g.iter().map(|v| (v - gm).powi(2)).sum::<f64>();
    }
    let msb = ssb / (k - 1) as f64;
    let msw = ssw / (n - k) as f64;
    if msw == 0.0 {
        if msb > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        msb / msw
    }
}

#[derive(Debug, Clone)]
pub struct FeatureSelector {
    selected: Vec<String>,
    importances: BTreeMap<String, f64>,
    params: BoostingParams,
}

impl Default for FeatureSelector {
    fn default() -> Self {
        Self::new(BoostingParams::selection())
    }
}

impl FeatureSelector {
    /// `params` configure the default estimator used when none is supplied.
    pub fn new(params: BoostingParams) -> Self {
        Self {
            selected: Vec::new(),
            importances: BTreeMap::new(),
            params,
        }
    }

    /// Restore a selection fitted earlier.
    pub fn with_selected(selected: Vec<String>) -> Self {
        Self {
            selected,
            ..Self::default()
        }
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn importances(&self) -> &BTreeMap<String, f64> {
        &self.importances
    }

    fn fitted_importances(
        estimator: &mut dyn Classifier,
        table: &FeatureTable,
        names: &[String],
        target: &[usize],
    ) -> Result<Option<Vec<f64>>> {
        let (matrix, _) = table.to_matrix(names);
        estimator.fit(matrix.view(), target)?;
        Ok(estimator.feature_importances().map(<[f64]>::to_vec))
    }

    /// Choose columns of `table` by `method` and return the reduced table.
    /// `estimator` is fitted for the model-based methods; a boosted ensemble is used when absent.
    pub fn select(
        &mut self,
        table: &FeatureTable,
        target: &[usize],
        method: SelectionMethod,
        estimator: Option<&mut dyn Classifier>,
    ) -> Result<FeatureTable> {
        let names = table.numeric_column_names();
        let mut fallback;
        let estimator: &mut dyn Classifier = match estimator {
            Some(e) => e,
            None => {
                fallback = BoostedTrees::with_params(&self.params, 2);
                &mut fallback
            }
        };

        let selected = match method {
            SelectionMethod::Importance { threshold } => {
                match Self::fitted_importances(estimator, table, &names, target)? {
                    Some(imp) => {
                        self.importances = names.iter().cloned().zip(imp.iter().copied()).collect();
                        let kept: Vec<String> = names
                            .iter()
                            .zip(&imp)
                            .filter(|(_, &v)| v >= threshold)
                            .map(|(n, _)| n.clone())
                            .collect();
                        if kept.is_empty() {
                            warn!(threshold, "no feature reached the importance threshold; keeping all");
                            names.clone()
                        } else {
                            kept
                        }
                    }
                    None => names.clone(),
                }
            }
            SelectionMethod::KBest { k } => {
                let mut scored: Vec<(usize, f64)> = names
                    .iter()
                    .enumerate()
                    .map(|(i, n)| {
                        let values: Vec<f64> = table
                            .numeric(n)
                            .map(|v| v.iter().map(|x| x.unwrap_or(0.0)).collect())
                            .unwrap_or_default();
                        (i, anova_f(&values, target))
                    })
                    .collect();
                scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
                let mut top: Vec<usize> = scored.into_iter().take(k).map(|(i, _)| i).collect();
                top.sort_unstable();
                top.into_iter().map(|i| names[i].clone()).collect()
            }
            SelectionMethod::Recursive { n_features } => {
                let mut current = names.clone();
                while current.len() > n_features.max(1) {
                    let Some(imp) = Self::fitted_importances(estimator, table, &current, target)? else {
                        break;
                    };
                    let weakest = imp
                        .iter()
                        .enumerate()
                        .min_by(|a, b| a.1.total_cmp(b.1))
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    current.remove(weakest);
                }
                current
            }
            SelectionMethod::Correlation { threshold } => {
                let columns: Vec<Vec<f64>> = names.iter().map(|n| table.present_values(n)).collect();
                names
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| {
                        !(0..*j).any(|i| {
                            columns[i].len() == columns[*j].len()
                                && pearson(&columns[i], &columns[*j]).map_or(false, |r| r.abs() > threshold)
                        })
                    })
                    .map(|(_, n)| n.clone())
                    .collect()
            }
            SelectionMethod::Variance { threshold } => names
                .iter()
                .filter(|n| variance_sample(&table.present_values(n)).map_or(true, |v| v > threshold))
                .cloned()
                .collect(),
            SelectionMethod::None => names.clone(),
        };

        info!(method = ?method, before = names.len(), after = selected.len(), "features selected");
        self.selected = selected;
        Ok(self.transform(table))
    }

    /// Re-apply the stored selection. With no selection the table passes through.
    pub fn transform(&self, table: &FeatureTable) -> FeatureTable {
        if self.selected.is_empty() {
            table.clone()
        } else {
            table.select_columns(&self.selected)
        }
    }
}
