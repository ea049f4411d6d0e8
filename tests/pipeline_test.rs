//! Pipeline test: validation, cleaning, engineering, selection and the rule-driven stages, no models.

use approx::assert_relative_eq;
use dryeye_risk::{
    data::{features_and_target, iqr_bounds, load_table, CleanOptions, Cleaner, Column, FeatureTable, IssueKind, PatientRecord, Validator},
    features::{screen_blink_ratio, EngineerOptions, FeaturePipeline, FeatureSelector, PipelineState, SelectionMethod},
    recommend::{Personalization, PatientProfile, Priority, RecommendationGenerator},
    Error,
    risk::{FactorAnalyzer, RiskAssessor, SeverityClassifier, SeverityLevel},
};
use std::collections::BTreeMap;

fn records() -> Vec<PatientRecord> {
    (0..12)
        .map(|i| {
            let i = i as f64;
            PatientRecord::new()
                .with("age", 20.0 + 3.0 * i)
                .with("gender", if i as usize % 2 == 0 { "M" } else { "F" })
                .with("screen_time", 1.0 + i)
                .with("blink_frequency", 25.0 - i)
                .with("sleep_quality", 1.0 + (i as usize % 5) as f64)
                .with("stress_level", 5.0 - (i as usize % 5) as f64)
        })
        .collect()
}

#[test]
fn validator_collects_issues_without_failing() {
    let table = FeatureTable::from_records(&[
        PatientRecord::new().with("age", 150.0).with("gender", "X"),
        PatientRecord::new().with("age", 30.0).with("gender", "M"),
    ]);
    let report = Validator::new().validate_all(&table, &["age".into(), "screen_time".into()]);
    assert!(!report.is_valid);
    let kinds: Vec<IssueKind> = report.errors.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&IssueKind::Range));
    assert!(kinds.contains(&IssueKind::Categorical));
    assert!(kinds.contains(&IssueKind::Missing));
}

#[test]
fn iqr_bounds_for_quartiles_ten_and_twenty() {
    let b = iqr_bounds(&[10.0, 10.0, 20.0, 20.0], 1.5).unwrap();
    assert_relative_eq!(b.lower, -5.0);
    assert_relative_eq!(b.upper, 35.0);
}

#[test]
fn cleaner_apply_keeps_row_count() {
    let cleaner = Cleaner::new(CleanOptions::default());
    let mut train = FeatureTable::from_records(&records());
    let stats = cleaner.fit(&mut train);

    let dup = records()[0].clone();
    let mut fresh = FeatureTable::from_records(&[dup.clone(), dup, PatientRecord::new().with("age", 500.0)]);
    cleaner.apply(&mut fresh, &stats);
    assert_eq!(fresh.n_rows(), 3);
}

#[test]
fn engineered_ratio_matches_formula() {
    assert_relative_eq!(screen_blink_ratio(10.0, 4.0), 2.0);
    let pipeline = FeaturePipeline::new(
        CleanOptions {
            normalize: false,
            handle_outliers: false,
            ..CleanOptions::default()
        },
        EngineerOptions::default(),
    );
    let mut table = FeatureTable::from_records(&records());
    let (_, created) = pipeline.fit_transform(&mut table);
    assert!(created.contains(&"screen_blink_ratio".to_string()));
    let ratio = table.numeric("screen_blink_ratio").unwrap();
    assert_relative_eq!(ratio[0].unwrap(), screen_blink_ratio(1.0, 25.0));
}

#[test]
fn pipeline_state_round_trips_through_disk() {
    let pipeline = FeaturePipeline::default();
    let mut table = FeatureTable::from_records(&records());
    let (stats, created) = pipeline.fit_transform(&mut table);
    let state = PipelineState {
        stats,
        created_features: created,
        selected_features: vec!["age".into(), "screen_time".into()],
        correlations: BTreeMap::new(),
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/pipeline.json");
    state.save(&path).unwrap();
    assert_eq!(PipelineState::load(&path).unwrap(), Some(state.clone()));
    assert_eq!(PipelineState::load(&dir.path().join("absent.json")).unwrap(), None);

    let one = pipeline.from_record(&records()[3], &state.stats);
    let again = pipeline.from_record(&records()[3], &state.stats);
    assert_eq!(one.row(0), again.row(0));
}

#[test]
fn variance_selection_drops_constant_columns() {
    let table = FeatureTable::from_columns(vec![
        Column::numeric("varied", vec![Some(1.0), Some(4.0), Some(2.0), Some(8.0)]),
        Column::numeric("constant", vec![Some(2.0); 4]),
    ])
    .unwrap();
    let mut selector = FeatureSelector::default();
    let out = selector
        .select(&table, &[0, 1, 0, 1], SelectionMethod::Variance { threshold: 0.01 }, None)
        .unwrap();
    assert_eq!(out.column_names(), vec!["varied".to_string()]);
    assert_eq!(selector.transform(&table).n_columns(), 1);
}

#[test]
fn csv_loading_reads_categories_and_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::write(&path, "age,gender,screen_time\n30,M,5.5\n41,F,\n").unwrap();
    let table = load_table(&path).unwrap();
    assert_eq!(table.n_rows(), 2);
    assert!(table.numeric("age").is_some());
    assert_eq!(table.numeric("screen_time").unwrap()[1], None);
}

#[test]
fn targets_outside_the_label_domain_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let features = vec!["age".to_string()];

    let path = dir.path().join("labels.csv");
    std::fs::write(&path, "age,dry_eye_disease\n30,Y\n41,N\n52,\n63,1\n").unwrap();
    let table = load_table(&path).unwrap();
    let labeled = features_and_target(&table, &features, "dry_eye_disease", None, &path).unwrap();
    assert_eq!(labeled.labels_for(&labeled.features), vec![1, 0, 1]);

    for bad in ["2", "0.7", "-1"] {
        std::fs::write(&path, format!("age,dry_eye_disease\n30,Y\n41,{}\n", bad)).unwrap();
        let table = load_table(&path).unwrap();
        match features_and_target(&table, &features, "dry_eye_disease", None, &path) {
            Err(Error::DataLoad { reason, .. }) => {
                assert!(reason.contains("dry_eye_disease"), "{}", reason);
            }
            other => panic!("expected a data load error for {}, got {:?}", bad, other.map(|_| ())),
        }
    }

    std::fs::write(&path, "age,dry_eye_disease,dry_eye_severity\n30,Y,4\n").unwrap();
    let table = load_table(&path).unwrap();
    let err = features_and_target(&table, &features, "dry_eye_disease", Some("dry_eye_severity"), &path);
    assert!(matches!(err, Err(Error::DataLoad { .. })));
}

#[test]
fn rule_path_from_record_to_plan() {
    let record = PatientRecord::new()
        .with("age", 50.0)
        .with("gender", "F")
        .with("screen_time", 11.0)
        .with("blink_frequency", 9.0)
        .with("sleep_quality", 2.0)
        .with("stress_level", 5.0)
        .with("humidity", 30.0);

    let severity = SeverityClassifier::new().classify_rules(&record);
    assert!(severity.level() >= SeverityLevel::Moderate);

    let risk = RiskAssessor::default().assess_probability(0.8);
    let importance = BTreeMap::from([("screen_time".to_string(), 0.9), ("sleep_quality".to_string(), 0.2)]);
    let generator = RecommendationGenerator::new();
    let recs = generator.generate(&record, &risk, severity.level(), &importance);
    assert_eq!(recs[0].priority, Priority::Critical);
    assert!(recs.iter().any(|r| r.factor == "humidity"));

    let profile = PatientProfile::from_record(&record);
    let plan = Personalization::new().action_plan(&recs, &profile);
    let total = plan.immediate_actions.len() + plan.short_term_goals.len() + plan.long_term_maintenance.len();
    assert_eq!(total, recs.len());
    assert!(plan.immediate_actions.iter().all(|r| r.priority >= Priority::High));

    let follow = generator.follow_up_plan(risk.category, severity.level());
    assert!(follow.specialist_referral);
}

#[test]
fn factor_score_without_known_features_is_zero() {
    let analyzer = FactorAnalyzer::default();
    let record = PatientRecord::new().with("shoe_size", 42.0);
    assert_eq!(analyzer.risk_score(&record), 0.0);
    assert!(analyzer.factor_summary(&record, None).is_empty());
}
