//! Inference benchmark: trained risk model prediction and rule-based severity scoring.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dryeye_risk::data::{Column, FeatureTable, PatientRecord};
use dryeye_risk::model::{BoostingParams, Predictor};
use dryeye_risk::risk::SeverityClassifier;

fn training_table(n: usize) -> (FeatureTable, Vec<usize>) {
    let screen: Vec<Option<f64>> = (0..n).map(|i| Some((i % 14) as f64)).collect();
    let blink: Vec<Option<f64>> = (0..n).map(|i| Some(6.0 + (i * 7 % 20) as f64)).collect();
    let labels: Vec<usize> = screen
        .iter()
        .zip(&blink)
        .map(|(s, b)| usize::from(s.unwrap_or(0.0) - b.unwrap_or(0.0) / 2.0 > 2.0))
        .collect();
    let table = FeatureTable::from_columns(vec![
        Column::numeric("screen_time", screen),
        Column::numeric("blink_frequency", blink),
    ])
    .unwrap();
    (table, labels)
}

fn bench_risk_prediction(c: &mut Criterion) {
    let params = BoostingParams {
        n_estimators: 50,
        ..BoostingParams::risk()
    };
    let mut predictor: Predictor = Predictor::new(params, BoostingParams::severity());
    let (table, labels) = training_table(300);
    predictor.train_risk(&table, &labels, None).unwrap();
    let one = table.take_rows(&[0]);

    c.bench_function("risk_predict_single", |b| {
        b.iter(|| black_box(predictor.predict_risk_probability(black_box(&one))))
    });
    c.bench_function("risk_predict_300_rows", |b| {
        b.iter(|| black_box(predictor.predict_risk_probability(black_box(&table))))
    });
}

fn bench_rule_severity(c: &mut Criterion) {
    let classifier = SeverityClassifier::new();
    let record = PatientRecord::new()
        .with("screen_time", 9.0)
        .with("blink_frequency", 11.0)
        .with("age", 45.0)
        .with("sleep_quality", 2.0)
        .with("stress_level", 4.0);

    c.bench_function("severity_rules", |b| {
        b.iter(|| black_box(classifier.classify_rules(black_box(&record))))
    });
}

criterion_group!(benches, bench_risk_prediction, bench_rule_severity);
criterion_main!(benches);
