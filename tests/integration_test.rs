//! Integration test: config load, training on a synthetic cohort, assessment, batch, evaluation, reports.

use dryeye_risk::{
    config::SystemConfig,
    data::{load_records, PatientRecord},
    features::{EngineerOptions, FeaturePipeline},
    model::{BoostingParams, ModelKind},
    report::{render_csv, render_text, save_report, ReportFormat},
    risk::{RiskAssessor, RiskCategory, SeverityClassifier, SeverityLevel},
    DryEyeSystem, Error,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADER: &str = "age,gender,screen_time,blink_frequency,sleep_quality,stress_level,\
physical_activity,humidity,air_conditioner_use,dry_eye_disease,dry_eye_severity";

/// Cohort where disease follows screen time and blink rate, severity follows the same load.
fn write_cohort(path: &Path, n: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::from(HEADER);
    out.push('\n');
    for i in 0..n {
        let age = rng.gen_range(18.0..70.0_f64).round();
        let gender = if i % 2 == 0 { "M" } else { "F" };
        let screen = (rng.gen_range(1.0..14.0_f64) * 10.0).round() / 10.0;
        let blink = rng.gen_range(6.0..26.0_f64).round();
        let sleep = rng.gen_range(1..=5);
        let stress = rng.gen_range(1..=5);
        let activity = rng.gen_range(0.0..120.0_f64).round();
        let humidity = rng.gen_range(20.0..70.0_f64).round();
        let ac = if rng.gen_bool(0.5) { "Yes" } else { "No" };
        let load = screen + (20.0 - blink) / 2.0;
        let disease = if load > 9.0 { "Y" } else { "N" };
        let severity = match load {
            l if l < 6.0 => 0,
            l if l < 9.0 => 1,
            l if l < 12.0 => 2,
            _ => 3,
        };
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{}\n",
            age, gender, screen, blink, sleep, stress, activity, humidity, ac, disease, severity
        ));
    }
    std::fs::write(path, out).unwrap();
}

fn quick(params: BoostingParams) -> BoostingParams {
    BoostingParams {
        n_estimators: 30,
        max_depth: 3,
        subsample: 1.0,
        colsample: 1.0,
        ..params
    }
}

fn test_config(dir: &Path) -> SystemConfig {
    let mut config = SystemConfig::default();
    config.data_path = dir.join("cohort.csv");
    config.models_dir = dir.join("models");
    config.reports_dir = dir.join("reports");
    config.training.cv_folds = 3;
    config.training.risk_model = quick(BoostingParams::risk());
    config.training.severity_model = quick(BoostingParams::severity());
    config.training.selection_model = quick(BoostingParams::selection());
    config
}

fn trained_system(dir: &Path) -> DryEyeSystem {
    write_cohort(&dir.join("cohort.csv"), 120, 7);
    let mut system = DryEyeSystem::new(test_config(dir));
    system.train(None).unwrap();
    system
}

fn high_risk_patient() -> PatientRecord {
    PatientRecord::new()
        .with("age", 52.0)
        .with("gender", "F")
        .with("screen_time", 13.0)
        .with("blink_frequency", 7.0)
        .with("sleep_quality", 2.0)
        .with("stress_level", 5.0)
        .with("physical_activity", 10.0)
        .with("humidity", 25.0)
        .with("air_conditioner_use", "Yes")
}

fn low_risk_patient() -> PatientRecord {
    PatientRecord::new()
        .with("age", 28.0)
        .with("gender", "M")
        .with("screen_time", 1.5)
        .with("blink_frequency", 24.0)
        .with("sleep_quality", 5.0)
        .with("stress_level", 1.0)
        .with("physical_activity", 90.0)
        .with("humidity", 50.0)
        .with("air_conditioner_use", "No")
}

#[test]
fn config_load_default() {
    let c = SystemConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.risk.decision_threshold, 0.5);
    assert_eq!(c.selection.threshold, 0.01);
    assert_eq!(c.training.test_size, 0.2);
    assert_eq!(c.training.cv_folds, 5);
    assert_eq!(c.target_column, "dry_eye_disease");
}

#[test]
fn config_partial_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"risk": {"decision_threshold": 0.4}, "log": {"json": true}}"#).unwrap();
    let c = SystemConfig::load(&path);
    assert_eq!(c.risk.decision_threshold, 0.4);
    assert_eq!(c.risk.alert_high, 0.7);
    assert!(c.log.json);
    assert_eq!(c.training.cv_folds, 5);
}

#[test]
fn prediction_before_training_fails() {
    let dir = tempfile::tempdir().unwrap();
    let system = DryEyeSystem::new(test_config(dir.path()));
    let err = system.predict_for_patient(&high_risk_patient()).unwrap_err();
    assert!(matches!(err, Error::ModelNotTrained(ModelKind::Risk)));
}

#[test]
fn training_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let system = trained_system(dir.path());
    let config = system.config();
    assert!(config.risk_model_path().exists());
    assert!(config.severity_model_path().exists());
    assert!(config.pipeline_state_path().exists());
    assert!(config.training_summary_path().exists());

    let summary: serde_json::Value =
        serde_json::from_slice(&std::fs::read(config.training_summary_path()).unwrap()).unwrap();
    assert_eq!(summary["severity_model_trained"], true);
    assert!(summary["metrics"]["risk"]["accuracy"].as_f64().unwrap() > 0.5);
    assert_eq!(summary["cross_validation"]["scores"].as_array().unwrap().len(), 3);

    // importance keys are exactly the features the model was fitted on
    let model = system.predictor().model(ModelKind::Risk).unwrap();
    let importance = system.predictor().feature_importance(ModelKind::Risk).unwrap();
    assert_eq!(importance.keys().cloned().collect::<Vec<_>>().len(), model.feature_names.len());
    assert!(importance.keys().all(|k| model.feature_names.contains(k)));
    let state = system.pipeline_state().unwrap();
    assert!(state.created_features.contains(&"screen_blink_ratio".to_string()));
}

#[test]
fn missing_target_column_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cohort.csv");
    std::fs::write(&path, "age,screen_time\n30,5\n40,9\n").unwrap();
    let mut system = DryEyeSystem::new(test_config(dir.path()));
    assert!(matches!(system.train(Some(&path)), Err(Error::DataLoad { .. })));
}

#[test]
fn assessment_orders_patients_by_risk() {
    let dir = tempfile::tempdir().unwrap();
    let system = trained_system(dir.path());
    let high = system.predict_for_patient(&high_risk_patient()).unwrap();
    let low = system.predict_for_patient(&low_risk_patient()).unwrap();

    assert!((0.0..=1.0).contains(&high.risk.probability));
    assert!(high.risk.probability > low.risk.probability);
    assert_eq!(high.severity.method(), "model");
    assert!(high.severity.level() >= low.severity.level());

    let recs = &high.report.recommendations;
    assert!(!recs.is_empty());
    assert!(recs.windows(2).all(|w| w[0].priority >= w[1].priority));
    assert!(high.report.key_factors.len() <= 5);
    assert_eq!(high.report.patient_info.gender, "Female");
    assert_eq!(high.report.patient_info.screen_time, "13 hours/day");
}

#[test]
fn reload_gives_identical_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let trained = trained_system(dir.path());
    let before = trained.predict_for_patient(&high_risk_patient()).unwrap();

    let mut reloaded = DryEyeSystem::new(test_config(dir.path()));
    reloaded.load_models().unwrap();
    let after = reloaded.predict_for_patient(&high_risk_patient()).unwrap();

    assert_eq!(before.risk.probability, after.risk.probability);
    assert_eq!(before.severity.level(), after.severity.level());
    assert_eq!(
        trained.predictor().feature_importance(ModelKind::Risk),
        reloaded.predictor().feature_importance(ModelKind::Risk)
    );
}

#[test]
fn batch_isolates_bad_records() {
    let dir = tempfile::tempdir().unwrap();
    let system = trained_system(dir.path());
    let records = vec![
        high_risk_patient(),
        low_risk_patient().with("age", "forty"),
        low_risk_patient(),
        PatientRecord::new(),
    ];
    let mut audit = Vec::new();
    let batch = system.batch_predict(&records, &mut audit).unwrap();

    assert_eq!(batch.individual_reports.len(), 2);
    let failed: Vec<usize> = batch.failures.iter().map(|f| f.index).collect();
    assert_eq!(failed, vec![1, 3]);
    assert!(batch.failures[0].error.contains("age"));

    let lines: Vec<serde_json::Value> = String::from_utf8(audit)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1]["error"].is_string());
    assert!(lines[2]["risk_probability"].is_number());

    let stats = batch.summary_statistics.unwrap();
    assert_eq!(stats.total_assessments, 2);
    let d = &stats.risk_distribution;
    assert_eq!(d.low + d.medium + d.high, 2);
}

#[test]
fn batch_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let system = trained_system(dir.path());
    let path = dir.path().join("patients.json");
    let json = serde_json::to_string(&vec![high_risk_patient(), low_risk_patient()]).unwrap();
    std::fs::write(&path, json).unwrap();
    let records = load_records(&path).unwrap();
    assert_eq!(records.len(), 2);
    let batch = system.batch_predict(&records, &mut std::io::sink()).unwrap();
    assert!(batch.failures.is_empty());
}

#[test]
fn evaluation_replays_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let system = trained_system(dir.path());
    let holdout = dir.path().join("holdout.csv");
    write_cohort(&holdout, 40, 99);
    let report = system.evaluate(Some(&holdout)).unwrap();
    assert_eq!(report.rows, 40);
    let total: usize = report.confusion_matrix.iter().flatten().sum();
    assert_eq!(total, 40);
    assert!(report.top_features.len() <= 10);
    assert!(report.top_features.windows(2).all(|w| w[0].1 >= w[1].1));
    assert!(report.severity.is_some());
    assert_eq!(report.risk_distribution.total, 40);
}

#[test]
fn training_without_severity_column_uses_rules() {
    let dir = tempfile::tempdir().unwrap();
    write_cohort(&dir.path().join("cohort.csv"), 80, 3);
    let mut config = test_config(dir.path());
    config.severity_column = None;
    let mut system = DryEyeSystem::new(config);
    let summary = system.train(None).unwrap();
    assert!(!summary.severity_model_trained);
    assert!(!system.config().severity_model_path().exists());

    let assessment = system.predict_for_patient(&high_risk_patient()).unwrap();
    assert_eq!(assessment.severity.method(), "rules");
    assert_eq!(
        assessment.severity.level(),
        SeverityClassifier::new().classify_rules(&high_risk_patient()).level()
    );
}

#[test]
fn risk_category_bands() {
    let a = RiskAssessor::default();
    assert_eq!(a.assess_probability(0.29).category, RiskCategory::Low);
    assert_eq!(a.assess_probability(0.3).category, RiskCategory::Medium);
    assert_eq!(a.assess_probability(0.59).category, RiskCategory::Medium);
    assert_eq!(a.assess_probability(0.6).category, RiskCategory::High);
}

#[test]
fn rule_severity_is_monotone_in_screen_time() {
    let classifier = SeverityClassifier::new();
    let mut last = SeverityLevel::NoRisk;
    for hours in [1.0, 4.0, 7.0, 10.0, 14.0] {
        let record = low_risk_patient().with("screen_time", hours);
        let level = classifier.classify_rules(&record).level();
        assert!(level >= last);
        last = level;
    }
}

#[test]
fn reports_render_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let system = trained_system(dir.path());
    let assessment = system.predict_for_patient(&high_risk_patient()).unwrap();

    let text = render_text(&assessment.report);
    assert!(text.contains("DRY EYE DISEASE RISK ASSESSMENT REPORT"));
    assert!(text.contains("Screen Time: 13 hours/day"));
    assert!(text.contains("1. ["));

    let csv = render_csv(&assessment.report).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("patient_age"));
    assert!(rows[0].contains("recommendations_count"));

    let nested: PathBuf = dir.path().join("out/deeper/report.json");
    save_report(&assessment.report, ReportFormat::Json, &nested).unwrap();
    let back: serde_json::Value = serde_json::from_slice(&std::fs::read(&nested).unwrap()).unwrap();
    assert_eq!(back["report_id"], assessment.report.report_id.to_string());
}

#[test]
fn corrupt_artifact_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let system = trained_system(dir.path());
    let path = system.config().risk_model_path();
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();

    let mut reloaded = DryEyeSystem::new(test_config(dir.path()));
    assert!(matches!(reloaded.load_models(), Err(Error::CorruptArtifact { .. })));
}

#[test]
fn polynomial_features_reach_prediction() {
    let dir = tempfile::tempdir().unwrap();
    write_cohort(&dir.path().join("cohort.csv"), 120, 11);
    let mut config = test_config(dir.path());
    config.preprocessing.polynomial_features = true;
    config.selection.method = "none".into();
    let mut system = DryEyeSystem::new(config.clone());
    system.train(None).unwrap();

    let state = system.pipeline_state().unwrap();
    assert_eq!(state.stats.polynomial_sources, vec!["age", "gender", "screen_time"]);
    assert!(state.selected_features.contains(&"screen_time_squared".to_string()));

    let pipeline = FeaturePipeline::new(
        config.preprocessing.clean_options(),
        EngineerOptions {
            polynomial: true,
            ..EngineerOptions::default()
        },
    );
    let row = pipeline.from_record(&high_risk_patient(), &state.stats);
    for feature in &state.selected_features {
        assert!(row.has_column(feature), "{} absent at prediction", feature);
    }
    assert!(!row.has_column("blink_frequency_squared"));
    system.predict_for_patient(&high_risk_patient()).unwrap();
}
