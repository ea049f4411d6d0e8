//! Dataset and patient-record loading from CSV / JSON files.

use super::record::{PatientRecord, Value};
use super::table::{Column, FeatureTable};
use crate::error::{Error, Result};
use crate::risk::SeverityLevel;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Feature table plus labels keyed by original row id.
#[derive(Debug, Clone)]
pub struct LabeledTable {
    pub features: FeatureTable,
    pub target: BTreeMap<usize, usize>,
    /// 0-3 severity labels, for rows that have one
    pub severity: Option<BTreeMap<usize, usize>>,
}

impl LabeledTable {
    /// Binary labels aligned with the rows of `table`.
    pub fn labels_for(&self, table: &FeatureTable) -> Vec<usize> {
        table
            .row_ids()
            .iter()
            .map(|id| self.target.get(id).copied().unwrap_or(0))
            .collect()
    }

    /// Rows of `table` that carry a severity label, with the labels.
    pub fn severity_rows(&self, table: &FeatureTable) -> Option<(Vec<usize>, Vec<usize>)> {
        let severity = self.severity.as_ref()?;
        let (positions, labels): (Vec<usize>, Vec<usize>) = table
            .row_ids()
            .iter()
            .enumerate()
            .filter_map(|(pos, id)| severity.get(id).map(|&l| (pos, l)))
            .unzip();
        if positions.is_empty() {
            None
        } else {
            Some((positions, labels))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DataInfo {
    pub rows: usize,
    pub columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub missing_values: BTreeMap<String, usize>,
}

/// Read a CSV file with a header row into a table.
pub fn load_table(path: &Path) -> Result<FeatureTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::data_load(path, e.to_string()))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::data_load(path, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Err(Error::data_load(path, "missing header row"));
    }

    let mut cells: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| Error::data_load(path, format!("row {}: {}", line + 1, e)))?;
        for (j, col) in cells.iter_mut().enumerate() {
            col.push(row.get(j).map_or(Value::Missing, Value::parse));
        }
    }

    let columns = headers
        .iter()
        .zip(cells.iter())
        .map(|(name, values)| Column::from_values(name.clone(), values))
        .collect();
    let table = FeatureTable::from_columns(columns)?;
    info!(path = %path.display(), rows = table.n_rows(), columns = table.n_columns(), "dataset loaded");
    Ok(table)
}

/// Read patient records from a `.csv` (one per row) or `.json` (array of objects) file.
pub fn load_records(path: &Path) -> Result<Vec<PatientRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => Ok(load_table(path)?.to_records()),
        Some("json") => {
            let data = std::fs::read_to_string(path).map_err(|e| Error::data_load(path, e.to_string()))?;
            serde_json::from_str::<Vec<PatientRecord>>(&data)
                .map_err(|e| Error::data_load(path, format!("expected a JSON array of patient objects: {}", e)))
        }
        _ => Err(Error::data_load(path, "unsupported file format, use CSV or JSON")),
    }
}

const SEVERITY_CLASSES: usize = SeverityLevel::ALL.len();

/// Raw label as a number: yes/no words map to 1/0; unparseable text counts as missing.
fn label_value(v: &Value) -> Option<f64> {
    match v {
        Value::Text(s) => match s.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" => Some(1.0),
            "no" | "n" | "false" => Some(0.0),
            other => other.parse::<f64>().ok(),
        },
        other => other.as_number(),
    }
}

/// Class labels of `column` keyed by row id. Values must be whole numbers in `0..n_classes`.
fn labels_by_row(table: &FeatureTable, column: &str, n_classes: usize, source: &Path) -> Result<BTreeMap<usize, usize>> {
    let Some(col) = table.column(column) else {
        return Ok(BTreeMap::new());
    };
    let mut labels = BTreeMap::new();
    for (pos, &id) in table.row_ids().iter().enumerate() {
        let Some(x) = label_value(&col.cell(pos)) else {
            continue;
        };
        if x.fract() != 0.0 || x < 0.0 || x >= n_classes as f64 {
            return Err(Error::data_load(
                source,
                format!("column {} has label {} outside 0..{}", column, x, n_classes),
            ));
        }
        labels.insert(id, x as usize);
    }
    Ok(labels)
}

/// Split a raw dataset into configured feature columns and labels.
/// Rows with no target value are dropped.
pub fn features_and_target(
    table: &FeatureTable,
    features: &[String],
    target: &str,
    severity: Option<&str>,
    source: &Path,
) -> Result<LabeledTable> {
    if !table.has_column(target) {
        return Err(Error::data_load(source, format!("target column {} not found", target)));
    }
    let available: Vec<String> = features
        .iter()
        .filter(|f| table.has_column(f))
        .cloned()
        .collect();
    if available.is_empty() {
        return Err(Error::data_load(source, "none of the configured feature columns are present"));
    }
    for missing in features.iter().filter(|f| !table.has_column(f)) {
        warn!(column = %missing, "configured feature column not in dataset");
    }

    let target_labels = labels_by_row(table, target, 2, source)?;
    let mut x = table.select_columns(&available);
    let keep: Vec<bool> = x.row_ids().iter().map(|id| target_labels.contains_key(id)).collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        warn!(dropped, "rows without a target value removed");
        x.retain_rows(&keep);
    }

    let severity = severity
        .filter(|c| table.has_column(c))
        .map(|c| labels_by_row(table, c, SEVERITY_CLASSES, source))
        .transpose()?
        .filter(|m| !m.is_empty());

    Ok(LabeledTable {
        features: x,
        target: target_labels,
        severity,
    })
}

pub fn data_info(table: &FeatureTable) -> DataInfo {
    DataInfo {
        rows: table.n_rows(),
        columns: table.column_names(),
        numeric_columns: table.numeric_column_names(),
        missing_values: table
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.missing_count()))
            .collect(),
    }
}
