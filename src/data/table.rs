//! Column-oriented feature table. Every stage mutates it in place; `row_ids` carry the
//! original row index so targets can be re-aligned after rows are dropped.

use super::record::{PatientRecord, Value};
use crate::error::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Categorical(values),
        }
    }

    /// Numeric when every present value is a number or flag; categorical otherwise.
    pub fn from_values(name: impl Into<String>, values: &[Value]) -> Self {
        let all_numeric = values
            .iter()
            .all(|v| v.is_missing() || v.as_number().is_some());
        if all_numeric {
            Column::numeric(name, values.iter().map(Value::as_number).collect())
        } else {
            Column::categorical(name, values.iter().map(Value::as_text).collect())
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    pub fn missing_count(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    pub fn cell(&self, row: usize) -> Value {
        match &self.data {
            ColumnData::Numeric(v) => v[row].map_or(Value::Missing, Value::Number),
            ColumnData::Categorical(v) => v[row].clone().map_or(Value::Missing, Value::Text),
        }
    }

    fn retain(&mut self, keep: &[bool]) {
        match &mut self.data {
            ColumnData::Numeric(v) => retain_by_mask(v, keep),
            ColumnData::Categorical(v) => retain_by_mask(v, keep),
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(rows.iter().map(|&i| v[i].clone()).collect())
            }
        };
        Column {
            name: self.name.clone(),
            data,
        }
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut i = 0;
    values.retain(|_| {
        let k = keep[i];
        i += 1;
        k
    });
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<Column>,
    row_ids: Vec<usize>,
}

impl FeatureTable {
    /// Build a table from equally sized columns; rows are numbered from zero.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, Column::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(Error::InvalidInput(format!(
                "column {} has {} rows, expected {}",
                bad.name,
                bad.len(),
                n_rows
            )));
        }
        Ok(Self {
            columns,
            row_ids: (0..n_rows).collect(),
        })
    }

    /// Columns appear in first-seen order across the records.
    pub fn from_records(records: &[PatientRecord]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for r in records {
            for (name, _) in r.iter() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        let columns = names
            .into_iter()
            .map(|name| {
                let values: Vec<Value> = records
                    .iter()
                    .map(|r| r.get(&name).cloned().unwrap_or(Value::Missing))
                    .collect();
                Column::from_values(name, &values)
            })
            .collect();
        Self {
            columns,
            row_ids: (0..records.len()).collect(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn numeric_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        match &self.column(name)?.data {
            ColumnData::Numeric(v) => Some(v),
            ColumnData::Categorical(_) => None,
        }
    }

    /// Numeric column with missing cells dropped.
    pub fn present_values(&self, name: &str) -> Vec<f64> {
        self.numeric(name)
            .map(|v| v.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Replace the column in place, or append it when new.
    pub fn set_column(&mut self, column: Column) {
        debug_assert_eq!(column.len(), self.n_rows());
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    pub fn set_numeric(&mut self, name: &str, values: Vec<Option<f64>>) {
        self.set_column(Column::numeric(name, values));
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(pos))
    }

    /// Keep rows where `keep[i]` is true; relative order is preserved.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.n_rows());
        for c in &mut self.columns {
            c.retain(keep);
        }
        retain_by_mask(&mut self.row_ids, keep);
    }

    /// New table holding the rows at `positions`, in the given order.
    pub fn take_rows(&self, positions: &[usize]) -> FeatureTable {
        FeatureTable {
            columns: self.columns.iter().map(|c| c.take(positions)).collect(),
            row_ids: positions.iter().map(|&i| self.row_ids[i]).collect(),
        }
    }

    /// Subset of columns in the given order; unknown names are skipped.
    pub fn select_columns(&self, names: &[String]) -> FeatureTable {
        let columns = names
            .iter()
            .filter_map(|n| self.column(n).cloned())
            .collect();
        FeatureTable {
            columns,
            row_ids: self.row_ids.clone(),
        }
    }

    /// Dense matrix over `names`. Absent columns, missing cells and text read as 0.0.
    /// Returns the names that were absent.
    pub fn to_matrix(&self, names: &[String]) -> (Array2<f64>, Vec<String>) {
        let mut out = Array2::<f64>::zeros((self.n_rows(), names.len()));
        let mut absent = Vec::new();
        for (j, name) in names.iter().enumerate() {
            match self.numeric(name) {
                Some(values) => {
                    for (i, v) in values.iter().enumerate() {
                        out[(i, j)] = v.unwrap_or(0.0);
                    }
                }
                None => absent.push(name.clone()),
            }
        }
        (out, absent)
    }

    /// Row `i` as a record (missing cells omitted).
    pub fn row(&self, i: usize) -> PatientRecord {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.cell(i)))
            .filter(|(_, v)| !v.is_missing())
            .collect()
    }

    pub fn to_records(&self) -> Vec<PatientRecord> {
        (0..self.n_rows()).map(|i| self.row(i)).collect()
    }

    /// Exact-equality key for duplicate detection.
    pub fn row_signature(&self, i: usize) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| match &c.data {
                ColumnData::Numeric(v) => v[i].map_or_else(|| "\u{0}".to_string(), |x| x.to_bits().to_string()),
                ColumnData::Categorical(v) => v[i].clone().unwrap_or_else(|| "\u{0}".to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureTable {
        let records = vec![
            PatientRecord::new().with("age", 30.0).with("gender", "M"),
            PatientRecord::new().with("age", 50.0).with("gender", "F"),
            PatientRecord::new().with("age", 41.0),
        ];
        FeatureTable::from_records(&records)
    }

    #[test]
    fn infers_column_kinds() {
        let t = sample();
        assert!(t.column("age").unwrap().is_numeric());
        assert!(!t.column("gender").unwrap().is_numeric());
        assert_eq!(t.column("gender").unwrap().missing_count(), 1);
    }

    #[test]
    fn retain_keeps_row_identity() {
        let mut t = sample();
        t.retain_rows(&[true, false, true]);
        assert_eq!(t.row_ids(), &[0, 2]);
        assert_eq!(t.numeric("age").unwrap(), &[Some(30.0), Some(41.0)]);
    }

    #[test]
    fn matrix_reports_absent_columns() {
        let t = sample();
        let (m, absent) = t.to_matrix(&["age".to_string(), "humidity".to_string()]);
        assert_eq!(m.shape(), &[3, 2]);
        assert_eq!(m[(1, 0)], 50.0);
        assert_eq!(m[(1, 1)], 0.0);
        assert_eq!(absent, vec!["humidity".to_string()]);
    }

    #[test]
    fn from_columns_rejects_ragged() {
        let cols = vec![
            Column::numeric("a", vec![Some(1.0)]),
            Column::numeric("b", vec![Some(1.0), Some(2.0)]),
        ];
        assert!(FeatureTable::from_columns(cols).is_err());
    }
}
