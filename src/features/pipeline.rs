//! Feature pipeline: raw table → clean → engineer → normalise.
//! Normalisation is fitted after engineering so thresholds and buckets see raw units.

use super::engineer::{EngineerOptions, FeatureEngineer};
use crate::data::{CleanOptions, Cleaner, Column, FeatureTable, FillValue, FittedStats, PatientRecord};
use crate::error::Result;
use crate::risk::Correlation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Everything needed to turn a new record into model features, persisted next to the models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub stats: FittedStats,
    pub created_features: Vec<String>,
    pub selected_features: Vec<String>,
    /// Correlation of each training feature with the target
    pub correlations: BTreeMap<String, Correlation>,
}

impl PipelineState {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// `None` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    options: CleanOptions,
    engineer: FeatureEngineer,
}

impl FeaturePipeline {
    pub fn new(options: CleanOptions, engineer: EngineerOptions) -> Self {
        Self {
            options,
            engineer: FeatureEngineer::new(engineer),
        }
    }

    fn cleaner(&self) -> Cleaner {
        Cleaner::new(CleanOptions {
            normalize: false,
            ..self.options.clone()
        })
    }

    /// Fit cleaning statistics and the scaler on `table`, transforming it in place.
    /// Returns the fitted statistics and the engineered column names.
    pub fn fit_transform(&self, table: &mut FeatureTable) -> (FittedStats, Vec<String>) {
        let cleaner = self.cleaner();
        let mut stats = cleaner.fit(table);
        let (created, polynomial_sources) = self.engineer.fit(table);
        stats.polynomial_sources = polynomial_sources;
        if self.options.normalize {
            let scaler = cleaner.fit_scaler(table);
            cleaner.normalize(table, &scaler);
            stats.scaler = Some(scaler);
        }
        debug!(rows = table.n_rows(), columns = table.n_columns(), "pipeline fitted");
        (stats, created)
    }

    /// Replay fitted statistics on new rows. Row count and order are preserved.
    pub fn transform(&self, table: &mut FeatureTable, stats: &FittedStats) {
        for (name, fill) in &stats.fill_values {
            if table.has_column(name) {
                continue;
            }
            let n = table.n_rows();
            let column = match fill {
                FillValue::Number(v) => Column::numeric(name.clone(), vec![Some(*v); n]),
                FillValue::Category(s) => Column::categorical(name.clone(), vec![Some(s.clone()); n]),
            };
            table.set_column(column);
        }
        let cleaner = self.cleaner();
        cleaner.apply(table, stats);
        self.engineer.replay(table, &stats.polynomial_sources);
        if self.options.normalize {
            if let Some(scaler) = &stats.scaler {
                cleaner.normalize(table, scaler);
            }
        }
    }

    /// Single patient record → one-row feature table.
    pub fn from_record(&self, record: &PatientRecord, stats: &FittedStats) -> FeatureTable {
        let mut table = FeatureTable::from_records(std::slice::from_ref(record));
        self.transform(&mut table, stats);
        table
    }
}
