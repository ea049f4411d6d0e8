//! System configuration. Defaults carry the fixed constants of the assessment pipeline;
//! a JSON file may override any section.

use crate::data::{CleanOptions, FillStrategy, OutlierAction};
use crate::model::BoostingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Columns read from the training dataset when no list is configured.
pub const DEFAULT_FEATURES: &[&str] = &[
    "age",
    "gender",
    "screen_time",
    "blink_frequency",
    "sleep_quality",
    "stress_level",
    "physical_activity",
    "humidity",
    "air_conditioner_use",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Labelled training dataset (CSV)
    pub data_path: PathBuf,
    /// Directory holding model artifacts and pipeline state
    pub models_dir: PathBuf,
    /// Directory for generated reports
    pub reports_dir: PathBuf,
    /// Feature columns used for training, in order
    pub features: Vec<String>,
    /// Binary outcome column
    pub target_column: String,
    /// Optional 0-3 severity label column; without it no severity model is trained
    pub severity_column: Option<String>,
    pub preprocessing: PreprocessingConfig,
    pub selection: SelectionConfig,
    pub training: TrainingConfig,
    pub risk: RiskConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub remove_duplicates: bool,
    pub handle_missing: bool,
    pub fill_strategy: FillStrategy,
    pub handle_outliers: bool,
    pub outlier_action: OutlierAction,
    pub outlier_factor: f64,
    pub encode_categorical: bool,
    pub normalize: bool,
    pub polynomial_features: bool,
    pub polynomial_degree: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// One of `importance`, `k_best`, `rfe`, `correlation`, `variance`, `none`
    pub method: String,
    pub threshold: f64,
    pub k_best: usize,
    pub n_features: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_size: f64,
    pub validation_split: f64,
    pub cv_folds: usize,
    pub random_state: u64,
    pub risk_model: BoostingParams,
    pub severity_model: BoostingParams,
    pub selection_model: BoostingParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Probability at or above which a patient is classified positive
    pub decision_threshold: f64,
    /// Alert thresholds
    pub alert_high: f64,
    pub alert_medium: f64,
    pub rapid_increase: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/raw/dry_eye_dataset.csv"),
            models_dir: PathBuf::from("data/models"),
            reports_dir: PathBuf::from("results/reports"),
            features: DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect(),
            target_column: "dry_eye_disease".to_string(),
            severity_column: Some("dry_eye_severity".to_string()),
            preprocessing: PreprocessingConfig::default(),
            selection: SelectionConfig::default(),
            training: TrainingConfig::default(),
            risk: RiskConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for PreprocessingConfig {
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
            polynomial_features: false,
            polynomial_degree: 2,
        }
    }
}

impl PreprocessingConfig {
    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            remove_duplicates: self.remove_duplicates,
            handle_missing: self.handle_missing,
            fill_strategy: self.fill_strategy,
            handle_outliers: self.handle_outliers,
            outlier_action: self.outlier_action,
            outlier_factor: self.outlier_factor,
            encode_categorical: self.encode_categorical,
            normalize: self.normalize,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            method: "importance".to_string(),
            threshold: 0.01,
            k_best: 15,
            n_features: 10,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            validation_split: 0.2,
            cv_folds: 5,
            random_state: 42,
            risk_model: BoostingParams::risk(),
            severity_model: BoostingParams::severity(),
            selection_model: BoostingParams::selection(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
            alert_high: 0.7,
            alert_medium: 0.4,
            rapid_increase: 0.2,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl SystemConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<SystemConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }

    pub fn risk_model_path(&self) -> PathBuf {
        self.models_dir.join("risk_model.bin")
    }

    pub fn severity_model_path(&self) -> PathBuf {
        self.models_dir.join("severity_model.bin")
    }

    pub fn pipeline_state_path(&self) -> PathBuf {
        self.models_dir.join("pipeline.json")
    }

    pub fn training_summary_path(&self) -> PathBuf {
        self.models_dir.join("training_summary.json")
    }
}
