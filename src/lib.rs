//! Dry eye disease risk and severity assessment.
//!
//! Modular structure:
//! - [`data`]: patient records, feature tables, loading, validation and cleaning
//! - [`features`]: feature engineering, selection and the fitted pipeline
//! - [`model`]: classifier trait, boosted-tree backend, predictor and training
//! - [`risk`]: risk categories and alerts, severity classification, factor analysis
//! - [`recommend`]: rule-based recommendations and personalisation
//! - [`report`]: patient and batch reports
//! - [`system`]: end-to-end training, prediction and evaluation
//! - [`logging`]: structured logging and audit lines

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod recommend;
pub mod report;
pub mod risk;
pub mod system;

pub use config::SystemConfig;
pub use data::{FeatureTable, PatientRecord, Value};
pub use error::{Error, Result};
pub use features::{FeaturePipeline, PipelineState};
pub use logging::StructuredLogger;
pub use model::{BoostedTrees, Classifier, ModelKind, Predictor};
pub use risk::{RiskAssessment, RiskAssessor, RiskCategory, SeverityAssessment, SeverityLevel};
pub use system::{DryEyeSystem, EvaluationReport, PatientAssessment, TrainingSummary};
