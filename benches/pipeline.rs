//! Pipeline benchmark: patient record → cleaned, engineered, normalised feature row.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dryeye_risk::data::{FeatureTable, PatientRecord};
use dryeye_risk::features::FeaturePipeline;

fn make_records(n: usize) -> Vec<PatientRecord> {
    (0..n)
        .map(|i| {
            let f = i as f64;
            PatientRecord::new()
                .with("age", 18.0 + (f * 7.0) % 60.0)
                .with("gender", if i % 2 == 0 { "M" } else { "F" })
                .with("screen_time", 1.0 + (f * 1.3) % 13.0)
                .with("blink_frequency", 6.0 + (f * 2.7) % 20.0)
                .with("sleep_quality", 1.0 + (i % 5) as f64)
                .with("stress_level", 1.0 + ((i + 2) % 5) as f64)
                .with("physical_activity", (f * 11.0) % 120.0)
                .with("humidity", 20.0 + (f * 3.0) % 50.0)
                .with("air_conditioner_use", if i % 3 == 0 { "Yes" } else { "No" })
        })
        .collect()
}

fn bench_fit_transform(c: &mut Criterion) {
    let pipeline = FeaturePipeline::default();
    let table = FeatureTable::from_records(&make_records(500));

    c.bench_function("pipeline_fit_500_rows", |b| {
        b.iter(|| {
            let mut t = black_box(table.clone());
            black_box(pipeline.fit_transform(&mut t))
        })
    });
}

fn bench_single_record(c: &mut Criterion) {
    let pipeline = FeaturePipeline::default();
    let mut table = FeatureTable::from_records(&make_records(500));
    let (stats, _) = pipeline.fit_transform(&mut table);
    let record = make_records(7).pop().unwrap_or_default();

    c.bench_function("pipeline_single_record", |b| {
        b.iter(|| black_box(pipeline.from_record(black_box(&record), &stats)))
    });
}

criterion_group!(benches, bench_fit_transform, bench_single_record);
criterion_main!(benches);
