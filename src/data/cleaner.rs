//! Imputation, deduplication, categorical encoding, IQR outlier handling and
//! standardisation. All fitted state lives in [`FittedStats`], owned by the caller.

use super::record::encode_category;
use super::stats::{mean, median, mode, quantile_sorted, std_population};
use super::table::{Column, ColumnData, FeatureTable};
use super::CATEGORY_ENCODINGS;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    Median,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierAction {
    /// Clamp to the IQR bounds
    Clip,
    /// Remove rows holding any outlier (fit mode only)
    Drop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanOptions {
    pub remove_duplicates: bool,
    pub handle_missing: bool,
    pub fill_strategy: FillStrategy,
    pub handle_outliers: bool,
    pub outlier_action: OutlierAction,
    pub outlier_factor: f64,
    pub encode_categorical: bool,
    pub normalize: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            handle_missing: true,
            fill_strategy: FillStrategy::Median,
            handle_outliers: true,
            outlier_action: OutlierAction::Clip,
            outlier_factor: 1.5,
            encode_categorical: true,
            normalize: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillValue {
    Number(f64),
    Category(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    pub mean: f64,
    pub scale: f64,
}

/// Per-column standardisation statistics, frozen at fit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    pub columns: BTreeMap<String, ScaleParams>,
}

/// Everything learned from the fit data and replayed on later inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittedStats {
    pub fill_values: BTreeMap<String, FillValue>,
    pub outlier_bounds: BTreeMap<String, OutlierBounds>,
    pub scaler: Option<FittedScaler>,
    /// Columns the feature engineer raised to powers at fit time
    #[serde(default)]
    pub polynomial_sources: Vec<String>,
}

/// IQR bounds `[Q1 - f*IQR, Q3 + f*IQR]`; `None` for an empty column.
pub fn iqr_bounds(values: &[f64], factor: f64) -> Option<OutlierBounds> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let q1 = quantile_sorted(&sorted, 0.25);
    let q3 = quantile_sorted(&sorted, 0.75);
    let iqr = q3 - q1;
    Some(OutlierBounds {
        lower: q1 - factor * iqr,
        upper: q3 + factor * iqr,
    })
}

/// Flag values outside the IQR bounds of the column. Missing cells are never flagged.
pub fn detect_outliers(values: &[Option<f64>], factor: f64) -> Vec<bool> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    match iqr_bounds(&present, factor) {
        Some(b) => values
            .iter()
            .map(|v| v.map_or(false, |x| !b.contains(x)))
            .collect(),
        None => vec![false; values.len()],
    }
}

fn is_indicator(values: &[Option<f64>]) -> bool {
    let distinct: HashSet<u64> = values.iter().flatten().map(|v| v.to_bits()).collect();
    distinct.len() <= 2
}

#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    options: CleanOptions,
}

impl Cleaner {
    pub fn new(options: CleanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CleanOptions {
        &self.options
    }

    /// Fit mode: learn statistics from `table`, apply them, and return them.
    /// May drop duplicate or outlier rows.
    pub fn fit(&self, table: &mut FeatureTable) -> FittedStats {
        let mut stats = FittedStats::default();
        if self.options.remove_duplicates {
            let removed = self.remove_duplicates(table);
            debug!(removed, "duplicate rows removed");
        }
        if self.options.handle_missing {
            stats.fill_values = self.fit_fill_values(table);
            self.fill_missing(table, &stats.fill_values);
        }
        if self.options.encode_categorical {
            self.encode_categorical(table);
        }
        if self.options.handle_outliers {
            stats.outlier_bounds = self.fit_outlier_bounds(table);
            let affected = self.handle_outliers(table, &stats.outlier_bounds, self.options.outlier_action);
            debug!(affected, action = ?self.options.outlier_action, "outliers handled");
        }
        if self.options.normalize {
            let scaler = self.fit_scaler(table);
            self.normalize(table, &scaler);
            stats.scaler = Some(scaler);
        }
        stats
    }

    /// Apply mode: replay `stats` without dropping rows, so outputs stay aligned with inputs.
    pub fn apply(&self, table: &mut FeatureTable, stats: &FittedStats) {
        if self.options.handle_missing {
            let mut fill = self.fit_fill_values(table);
            fill.extend(stats.fill_values.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.fill_missing(table, &fill);
        }
        if self.options.encode_categorical {
            self.encode_categorical(table);
        }
        if self.options.handle_outliers {
            self.handle_outliers(table, &stats.outlier_bounds, OutlierAction::Clip);
        }
        if self.options.normalize {
            if let Some(scaler) = &stats.scaler {
                self.normalize(table, scaler);
            }
        }
    }

    /// Drop exact-duplicate rows, keeping the first occurrence. Returns the number removed.
    pub fn remove_duplicates(&self, table: &mut FeatureTable) -> usize {
        let mut seen = HashSet::new();
        let keep: Vec<bool> = (0..table.n_rows())
            .map(|i| seen.insert(table.row_signature(i)))
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            table.retain_rows(&keep);
        }
        removed
    }

    /// Median (or mean) for numeric columns, mode for categorical columns.
    pub fn fit_fill_values(&self, table: &FeatureTable) -> BTreeMap<String, FillValue> {
        let mut out = BTreeMap::new();
        for c in table.columns() {
            let fill = match &c.data {
                ColumnData::Numeric(v) => {
                    let present: Vec<f64> = v.iter().flatten().copied().collect();
                    let centre = match self.options.fill_strategy {
                        FillStrategy::Median => median(&present),
                        FillStrategy::Mean => mean(&present),
                    };
                    centre.map(FillValue::Number)
                }
                ColumnData::Categorical(v) => {
                    mode(v.iter().flatten().map(String::as_str)).map(FillValue::Category)
                }
            };
            if let Some(f) = fill {
                out.insert(c.name.clone(), f);
            }
        }
        out
    }

    pub fn fill_missing(&self, table: &mut FeatureTable, fill: &BTreeMap<String, FillValue>) {
        for (name, value) in fill {
            let Some(col) = table.column_mut(name) else {
                continue;
            };
            match (&mut col.data, value) {
                (ColumnData::Numeric(v), FillValue::Number(x)) => {
                    v.iter_mut().filter(|c| c.is_none()).for_each(|c| *c = Some(*x));
                }
                (ColumnData::Categorical(v), FillValue::Category(s)) => {
                    v.iter_mut().filter(|c| c.is_none()).for_each(|c| *c = Some(s.clone()));
                }
                (ColumnData::Categorical(v), FillValue::Number(x)) => {
                    let s = super::record::format_number(*x);
                    v.iter_mut().filter(|c| c.is_none()).for_each(|c| *c = Some(s.clone()));
                }
                (ColumnData::Numeric(_), FillValue::Category(_)) => {}
            }
        }
    }

    /// Map known categorical fields through the fixed table, then one-hot encode
    /// every remaining text column as `<column>_<value>`.
    pub fn encode_categorical(&self, table: &mut FeatureTable) {
        for (name, _) in CATEGORY_ENCODINGS {
            let Some(col) = table.column(name) else {
                continue;
            };
            if let ColumnData::Categorical(values) = &col.data {
                let encoded: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| {
                        v.as_deref().and_then(|s| {
                            s.parse::<f64>().ok().or_else(|| encode_category(name, s))
                        })
                    })
                    .collect();
                table.set_numeric(name, encoded);
            }
        }

        let text_columns: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| !c.is_numeric())
            .map(|c| c.name.clone())
            .collect();
        for name in text_columns {
            let Some(Column {
                data: ColumnData::Categorical(values),
                ..
            }) = table.remove_column(&name)
            else {
                continue;
            };
            let categories: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
            for category in categories {
                let dummy = values
                    .iter()
                    .map(|v| Some(if v.as_deref() == Some(category) { 1.0 } else { 0.0 }))
                    .collect();
                table.set_numeric(&format!("{}_{}", name, category), dummy);
            }
        }
    }

    /// IQR bounds for every numeric, non-indicator column.
    pub fn fit_outlier_bounds(&self, table: &FeatureTable) -> BTreeMap<String, OutlierBounds> {
        table
            .columns()
            .iter()
            .filter_map(|c| match &c.data {
                ColumnData::Numeric(v) if !is_indicator(v) => {
                    let present: Vec<f64> = v.iter().flatten().copied().collect();
                    iqr_bounds(&present, self.options.outlier_factor).map(|b| (c.name.clone(), b))
                }
                _ => None,
            })
            .collect()
    }

    /// Clip values into `bounds` or drop rows that fall outside. Returns affected cells (clip)
    /// or removed rows (drop).
    pub fn handle_outliers(
        &self,
        table: &mut FeatureTable,
        bounds: &BTreeMap<String, OutlierBounds>,
        action: OutlierAction,
    ) -> usize {
        match action {
            OutlierAction::Clip => {
                let mut clipped = 0;
                for (name, b) in bounds {
                    let Some(col) = table.column_mut(name) else {
                        continue;
                    };
                    if let ColumnData::Numeric(v) = &mut col.data {
                        for x in v.iter_mut().flatten() {
                            if !b.contains(*x) {
                                *x = x.clamp(b.lower, b.upper);
                                clipped += 1;
                            }
                        }
                    }
                }
                clipped
            }
            OutlierAction::Drop => {
                let mut keep = vec![true; table.n_rows()];
                for (name, b) in bounds {
                    if let Some(v) = table.numeric(name) {
                        for (k, x) in keep.iter_mut().zip(v) {
                            if x.map_or(false, |x| !b.contains(x)) {
                                *k = false;
                            }
                        }
                    }
                }
                let removed = keep.iter().filter(|k| !**k).count();
                if removed > 0 {
                    table.retain_rows(&keep);
                }
                removed
            }
        }
    }

    /// Mean and population standard deviation per numeric column; zero spread scales by 1.
    pub fn fit_scaler(&self, table: &FeatureTable) -> FittedScaler {
        let columns = table
            .numeric_column_names()
            .into_iter()
            .filter_map(|name| {
                let present = table.present_values(&name);
                let m = mean(&present)?;
                let sd = std_population(&present);
                let scale = if sd > 0.0 { sd } else { 1.0 };
                Some((name, ScaleParams { mean: m, scale }))
            })
            .collect();
        FittedScaler { columns }
    }

    /// Standardise the columns known to `scaler`; other columns pass through.
    pub fn normalize(&self, table: &mut FeatureTable, scaler: &FittedScaler) {
        for (name, p) in &scaler.columns {
            if let Some(col) = table.column_mut(name) {
                if let ColumnData::Numeric(v) = &mut col.data {
                    for x in v.iter_mut().flatten() {
                        *x = (*x - p.mean) / p.scale;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PatientRecord;
    use approx::assert_relative_eq;

    #[test]
    fn iqr_bounds_from_quartiles() {
        let b = iqr_bounds(&[10.0, 10.0, 20.0, 20.0], 1.5).unwrap();
        assert_relative_eq!(b.lower, -5.0);
        assert_relative_eq!(b.upper, 35.0);
        let flags = detect_outliers(&[Some(10.0), Some(10.0), Some(20.0), Some(20.0), None], 1.5);
        assert!(flags.iter().all(|f| !f));
    }

    #[test]
    fn one_hot_appends_sorted_dummies() {
        let records = vec![
            PatientRecord::new().with("work_type", "office").with("gender", "M"),
            PatientRecord::new().with("work_type", "outdoor").with("gender", "F"),
        ];
        let mut t = FeatureTable::from_records(&records);
        Cleaner::default().encode_categorical(&mut t);
        assert_eq!(t.numeric("gender").unwrap(), &[Some(1.0), Some(0.0)]);
        assert!(!t.has_column("work_type"));
        assert_eq!(t.numeric("work_type_office").unwrap(), &[Some(1.0), Some(0.0)]);
        assert_eq!(t.numeric("work_type_outdoor").unwrap(), &[Some(0.0), Some(1.0)]);
    }
}
