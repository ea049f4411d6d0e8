//! End-to-end orchestration: training, single-patient assessment, batch runs and evaluation.

use crate::config::SystemConfig;
use crate::data::{
    data_info, features_and_target, load_table, DataInfo, FeatureTable, FillValue, LabeledTable, PatientRecord,
    ValidationReport, Validator, Value,
};
use crate::error::{Error, Result};
use crate::features::{EngineerOptions, FeaturePipeline, FeatureSelector, PipelineState, SelectionMethod};
use crate::logging::{AssessmentLogEvent, StructuredLogger};
use crate::model::metrics::confusion_matrix;
use crate::model::{
    BinaryMetrics, BoostedTrees, CrossValidation, ModelKind, ModelPaths, ModelTrainer, MulticlassMetrics,
    Predictor, TrainingMetrics,
};
use crate::recommend::{ActionPlan, PatientProfile, Personalization, RecommendationGenerator};
use crate::report::{BatchFailure, BatchReport, PatientReport, ReportGenerator};
use crate::risk::{
    Correlation, FactorAnalyzer, FactorContribution, FactorSummary, PopulationRisk, ProgressionFlags,
    ProgressionRisk, RankBy, RiskAlert, RiskAssessment, RiskAssessor, SeverityAssessment, SeverityClassifier,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Number of factors carried into a patient report.
const KEY_FACTORS: usize = 5;
/// Minimum |r| for a feature to be listed as a significant risk factor.
const SIGNIFICANT_CORRELATION: f64 = 0.1;

/// Everything produced for one patient.
#[derive(Debug, Clone, Serialize)]
pub struct PatientAssessment {
    pub risk: RiskAssessment,
    pub severity: SeverityAssessment,
    pub progression: ProgressionRisk,
    pub monitoring: String,
    pub alerts: Vec<RiskAlert>,
    pub factors: BTreeMap<String, FactorSummary>,
    pub contributions: BTreeMap<String, FactorContribution>,
    pub action_plan: ActionPlan,
    pub motivation: Vec<String>,
    pub report: PatientReport,
}

/// Written to `training_summary.json` after training.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub trained_at: DateTime<Utc>,
    pub data: DataInfo,
    pub validation: ValidationReport,
    pub training_rows: usize,
    pub created_features: Vec<String>,
    pub selected_features: Vec<String>,
    pub feature_importance: BTreeMap<String, f64>,
    pub significant_factors: Vec<String>,
    pub factor_interactions: BTreeMap<String, Correlation>,
    pub risk_distribution: PopulationRisk,
    pub metrics: TrainingMetrics,
    pub cross_validation: Option<CrossValidation>,
    pub severity_model_trained: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub rows: usize,
    pub risk: BinaryMetrics,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub top_features: Vec<(String, f64)>,
    pub risk_distribution: PopulationRisk,
    pub severity: Option<MulticlassMetrics>,
}

pub struct DryEyeSystem {
    config: SystemConfig,
    pipeline: FeaturePipeline,
    predictor: Predictor,
    state: Option<PipelineState>,
    assessor: RiskAssessor,
    severity: SeverityClassifier,
    analyzer: FactorAnalyzer,
    recommender: RecommendationGenerator,
    personalization: Personalization,
    reports: ReportGenerator,
}

impl DryEyeSystem {
    pub fn new(config: SystemConfig) -> Self {
        let pre = &config.preprocessing;
        let pipeline = FeaturePipeline::new(
            pre.clean_options(),
            EngineerOptions {
                polynomial: pre.polynomial_features,
                polynomial_degree: pre.polynomial_degree,
                ..EngineerOptions::default()
            },
        );
        let predictor = Predictor::new(
            config.training.risk_model.clone(),
            config.training.severity_model.clone(),
        );
        Self {
            assessor: RiskAssessor::new(config.risk.clone()),
            pipeline,
            predictor,
            state: None,
            severity: SeverityClassifier::new(),
            analyzer: FactorAnalyzer::default(),
            recommender: RecommendationGenerator::new(),
            personalization: Personalization::new(),
            reports: ReportGenerator::new(),
            config,
        }
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn pipeline_state(&self) -> Option<&PipelineState> {
        self.state.as_ref()
    }

    fn model_paths(&self) -> ModelPaths {
        ModelPaths {
            risk: self.config.risk_model_path(),
            severity: self.config.severity_model_path(),
        }
    }

    fn load_labeled(&self, path: &Path) -> Result<(FeatureTable, LabeledTable)> {
        let raw = load_table(path)?;
        let labeled = features_and_target(
            &raw,
            &self.config.features,
            &self.config.target_column,
            self.config.severity_column.as_deref(),
            path,
        )?;
        Ok((raw, labeled))
    }

    /// Fit the pipeline and both models on the labelled dataset at `data` (default: configured path),
    /// then persist models, pipeline state and the training summary.
    pub fn train(&mut self, data: Option<&Path>) -> Result<TrainingSummary> {
        let path = data.unwrap_or(self.config.data_path.as_path()).to_path_buf();
        info!(path = %path.display(), "training started");
        let (raw, labeled) = self.load_labeled(&path)?;

        let validation = Validator::new().validate_all(&raw, &self.config.features);
        if !validation.is_valid {
            warn!(issues = validation.errors.len(), "dataset has validation issues; continuing");
        }

        let mut x = labeled.features.clone();
        let (stats, created_features) = self.pipeline.fit_transform(&mut x);
        let y = labeled.labels_for(&x);

        let mut selector = FeatureSelector::new(self.config.training.selection_model.clone());
        let x = selector.select(&x, &y, SelectionMethod::from_config(&self.config.selection), None)?;

        let mut analyzer = FactorAnalyzer::default();
        let significant_factors = analyzer.identify_risk_factors(&x, &y, SIGNIFICANT_CORRELATION);

        let mut trainer = ModelTrainer::new(self.config.training.clone());
        let mut predictor = Predictor::new(
            self.config.training.risk_model.clone(),
            self.config.training.severity_model.clone(),
        );
        trainer.train_risk_model(&mut predictor, &x, &y, self.config.risk.decision_threshold)?;

        let severity_model_trained = match labeled.severity_rows(&x) {
            Some((positions, labels)) => {
                trainer.train_severity_model(&mut predictor, &x.take_rows(&positions), &labels)?;
                true
            }
            None => {
                info!("no severity labels; severity will use rule scoring");
                false
            }
        };

        let cross_validation = if self.config.training.cv_folds >= 2 {
            Some(trainer.cross_validate::<BoostedTrees>(&x, &y, ModelKind::Risk, self.config.training.cv_folds)?)
        } else {
            None
        };

        let feature_importance = predictor.feature_importance(ModelKind::Risk).unwrap_or_default();
        analyzer.set_importance(feature_importance.clone());
        let factor_interactions = analyzer.interactions(&x, None);
        let risk_distribution = self.assessor.population(&predictor.predict_risk_probability(&x)?);

        let paths = self.model_paths();
        predictor.save(&paths)?;
        if !severity_model_trained && paths.severity.exists() {
            std::fs::remove_file(&paths.severity)?;
            info!(path = %paths.severity.display(), "stale severity model removed");
        }
        let state = PipelineState {
            stats,
            created_features: created_features.clone(),
            selected_features: selector.selected().to_vec(),
            correlations: analyzer.correlations().clone(),
        };
        state.save(&self.config.pipeline_state_path())?;

        let summary = TrainingSummary {
            trained_at: Utc::now(),
            data: data_info(&raw),
            validation,
            training_rows: x.n_rows(),
            created_features,
            selected_features: state.selected_features.clone(),
            feature_importance,
            significant_factors,
            factor_interactions,
            risk_distribution,
            metrics: trainer.metrics().clone(),
            cross_validation,
            severity_model_trained,
        };
        let summary_path = self.config.training_summary_path();
        std::fs::write(&summary_path, serde_json::to_vec_pretty(&summary)?)?;
        info!(path = %summary_path.display(), "training summary written");

        self.predictor = predictor;
        self.analyzer = analyzer;
        self.state = Some(state);
        Ok(summary)
    }

    /// Load model artifacts and pipeline state. Absent files leave the corresponding part unset.
    pub fn load_models(&mut self) -> Result<()> {
        self.predictor.load(&self.model_paths())?;
        self.state = PipelineState::load(&self.config.pipeline_state_path())?;
        match &self.state {
            Some(state) => {
                let importance = self.predictor.feature_importance(ModelKind::Risk).unwrap_or_default();
                self.analyzer = FactorAnalyzer::new(importance, state.correlations.clone());
            }
            None => warn!(path = %self.config.pipeline_state_path().display(), "pipeline state not found"),
        }
        Ok(())
    }

    fn ready_state(&self) -> Result<&PipelineState> {
        match &self.state {
            Some(state) if self.predictor.is_trained(ModelKind::Risk) => Ok(state),
            _ => Err(Error::ModelNotTrained(ModelKind::Risk)),
        }
    }

    /// Numeric training columns must read as numbers when supplied.
    fn check_record(record: &PatientRecord, state: &PipelineState) -> Result<()> {
        if record.is_empty() {
            return Err(Error::InvalidInput("record has no fields".into()));
        }
        for (name, fill) in &state.stats.fill_values {
            let supplied = matches!(record.get(name), Some(v) if !matches!(v, Value::Missing));
            if matches!(fill, FillValue::Number(_)) && supplied && record.number(name).is_none() {
                return Err(Error::InvalidInput(format!("{} is not numeric", name)));
            }
        }
        Ok(())
    }

    pub fn predict_for_patient(&self, record: &PatientRecord) -> Result<PatientAssessment> {
        self.assess_patient(record, None)
    }

    /// Full assessment. `previous_risk` enables the rapid-increase alert.
    pub fn assess_patient(&self, record: &PatientRecord, previous_risk: Option<f64>) -> Result<PatientAssessment> {
        let state = self.ready_state()?;
        Self::check_record(record, state)?;

        let table = self.pipeline.from_record(record, &state.stats);
        let features = FeatureSelector::with_selected(state.selected_features.clone()).transform(&table);

        let probability = self
            .predictor
            .predict_risk_probability(&features)?
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidInput("no prediction produced".into()))?;
        let risk = self.assessor.assess_probability(probability);
        let severity = self.severity.classify(&self.predictor, &features, record)?;
        let level = severity.level();
        let progression = self
            .severity
            .progression_risk(level, &ProgressionFlags::from_record(record));
        let monitoring = self.severity.monitoring_frequency(level, progression).to_string();
        let alerts = self.assessor.alerts(&risk, previous_risk);

        let importance = self.analyzer.importance();
        let key_names: Vec<String> = self
            .analyzer
            .top_factors(importance.len(), RankBy::Importance)
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| record.number(name).is_some())
            .take(KEY_FACTORS)
            .collect();
        let factors = self.analyzer.factor_summary(record, Some(&key_names));
        let contributions = self.assessor.contributions(record, importance, risk.probability);

        let recommendations = self.recommender.generate(record, &risk, level, importance);
        let profile = PatientProfile::from_record(record);
        let action_plan = self.personalization.action_plan(&recommendations, &profile);
        let motivation = self.personalization.motivational_messages(&profile, false);
        let personalised: Vec<_> = action_plan
            .immediate_actions
            .iter()
            .chain(&action_plan.short_term_goals)
            .chain(&action_plan.long_term_maintenance)
            .cloned()
            .collect();
        let follow_up = self.recommender.follow_up_plan(risk.category, level);
        let report = self
            .reports
            .generate(record, &risk, &severity, factors.clone(), personalised, follow_up);

        Ok(PatientAssessment {
            risk,
            severity,
            progression,
            monitoring,
            alerts,
            factors,
            contributions,
            action_plan,
            motivation,
            report,
        })
    }

    /// Assess records in order. A failing record is logged, listed in the report and skipped.
    /// One audit line per record goes to `audit`.
    pub fn batch_predict(&self, records: &[PatientRecord], audit: &mut dyn Write) -> Result<BatchReport> {
        self.ready_state()?;
        let mut reports = Vec::with_capacity(records.len());
        let mut failures = Vec::new();
        for (index, record) in records.iter().enumerate() {
            match self.predict_for_patient(record).map_err(|e| e.for_record(index)) {
                Ok(assessment) => {
                    let report = assessment.report;
                    let report_id = report.report_id.to_string();
                    let category = report.risk_assessment.category.label();
                    StructuredLogger::emit_json(
                        &AssessmentLogEvent {
                            ts: Utc::now().to_rfc3339(),
                            index,
                            report_id: Some(report_id),
                            risk_probability: Some(report.risk_assessment.probability),
                            risk_category: Some(category),
                            severity_level: Some(report.severity_assessment.level().index() as u8),
                            error: None,
                        },
                        audit,
                    );
                    reports.push(report);
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(index, error = %message, "record skipped");
                    StructuredLogger::emit_json(&AssessmentLogEvent::failure(index, &message), audit);
                    failures.push(BatchFailure { index, error: message });
                }
            }
        }
        info!(assessed = reports.len(), failed = failures.len(), "batch complete");
        Ok(self.reports.batch_report(reports, failures))
    }

    /// Replay the fitted pipeline on a labelled dataset and score the loaded models.
    pub fn evaluate(&self, data: Option<&Path>) -> Result<EvaluationReport> {
        let state = self.ready_state()?;
        let path = data.unwrap_or(self.config.data_path.as_path()).to_path_buf();
        let (_, labeled) = self.load_labeled(&path)?;

        let mut x = labeled.features.clone();
        self.pipeline.transform(&mut x, &state.stats);
        let x = FeatureSelector::with_selected(state.selected_features.clone()).transform(&x);
        let y = labeled.labels_for(&x);

        let probabilities = self.predictor.predict_risk_probability(&x)?;
        let threshold = self.config.risk.decision_threshold;
        let predicted: Vec<usize> = probabilities.iter().map(|&p| usize::from(p >= threshold)).collect();
        let risk = BinaryMetrics::compute(&y, &predicted, &probabilities);
        info!(rows = y.len(), accuracy = risk.accuracy, auc = risk.auc_roc, "evaluation done");

        let mut top_features: Vec<(String, f64)> = self
            .predictor
            .feature_importance(ModelKind::Risk)
            .unwrap_or_default()
            .into_iter()
            .collect();
        top_features.sort_by(|a, b| b.1.total_cmp(&a.1));
        top_features.truncate(10);

        let severity = match labeled.severity_rows(&x) {
            Some((positions, labels)) if self.predictor.is_trained(ModelKind::Severity) => {
                let predicted = self.predictor.predict_severity(&x.take_rows(&positions))?;
                Some(MulticlassMetrics::compute(&labels, &predicted))
            }
            _ => None,
        };

        Ok(EvaluationReport {
            rows: y.len(),
            confusion_matrix: confusion_matrix(&y, &predicted, 2),
            risk,
            top_features,
            risk_distribution: self.assessor.population(&probabilities),
            severity,
        })
    }
}
