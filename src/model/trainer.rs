//! Stratified splitting, held-out evaluation and k-fold cross-validation.

use super::boosted::BoostingParams;
use super::classifier::Classifier;
use super::metrics::{accuracy, BinaryMetrics, CrossValidation, MulticlassMetrics};
use super::predictor::{ModelKind, Predictor};
use crate::config::TrainingConfig;
use crate::data::stats::{mean, std_population};
use crate::data::FeatureTable;
use crate::error::{Error, Result};
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Row positions for the two sides of a split, each in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn positions_by_class(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &l) in labels.iter().enumerate() {
        by_class.entry(l).or_default().push(i);
    }
    by_class
}

/// Seeded split keeping class proportions. Classes with a single member stay in train.
pub fn stratified_split(labels: &[usize], test_size: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (_, mut members) in positions_by_class(labels) {
        members.shuffle(&mut rng);
        let n_test = if members.len() < 2 {
            0
        } else {
            ((members.len() as f64 * test_size).round() as usize).clamp(1, members.len() - 1)
        };
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Split { train, test }
}

/// Deterministic stratified folds: class members are dealt round-robin after a seeded shuffle.
pub fn stratified_folds(labels: &[usize], k: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_folds = k.max(1);
    let mut folds = vec![Vec::new(); n_folds];
    let mut next = 0;
    for (_, mut members) in positions_by_class(labels) {
        members.shuffle(&mut rng);
        for m in members {
            folds[next % n_folds].push(m);
            next += 1;
        }
    }
    folds.iter_mut().for_each(|f| f.sort_unstable());
    folds
}

fn pick(labels: &[usize], positions: &[usize]) -> Vec<usize> {
    positions.iter().map(|&i| labels[i]).collect()
}

/// Test rows held back from training, returned for later evaluation.
#[derive(Debug, Clone)]
pub struct HeldOut {
    pub x: FeatureTable,
    pub y: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub risk: Option<BinaryMetrics>,
    pub severity: Option<MulticlassMetrics>,
}

#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainingConfig,
    metrics: TrainingMetrics,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            metrics: TrainingMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Split off a test set, then a validation set from the remainder, and fit.
    fn fit_split<C: Classifier>(
        &self,
        predictor: &mut Predictor<C>,
        kind: ModelKind,
        x: &FeatureTable,
        y: &[usize],
    ) -> Result<HeldOut> {
        if x.n_rows() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} labels",
                x.n_rows(),
                y.len()
            )));
        }
        let seed = self.config.random_state;
        let outer = stratified_split(y, self.config.test_size, seed);
        let y_train = pick(y, &outer.train);
        let inner = stratified_split(&y_train, self.config.validation_split, seed);

        let fit_pos: Vec<usize> = inner.train.iter().map(|&i| outer.train[i]).collect();
        let val_pos: Vec<usize> = inner.test.iter().map(|&i| outer.train[i]).collect();
        let x_fit = x.take_rows(&fit_pos);
        let y_fit = pick(y, &fit_pos);
        let x_val = x.take_rows(&val_pos);
        let y_val = pick(y, &val_pos);
        let validation = (!val_pos.is_empty()).then_some((&x_val, y_val.as_slice()));

        info!(
            model = %kind,
            train = fit_pos.len(),
            validation = val_pos.len(),
            test = outer.test.len(),
            "training split"
        );
        match kind {
            ModelKind::Risk => predictor.train_risk(&x_fit, &y_fit, validation)?,
            ModelKind::Severity => predictor.train_severity(&x_fit, &y_fit, validation)?,
        }
        Ok(HeldOut {
            x: x.take_rows(&outer.test),
            y: pick(y, &outer.test),
        })
    }

    /// Train the risk model and score it on the held-out test rows.
    pub fn train_risk_model<C: Classifier>(
        &mut self,
        predictor: &mut Predictor<C>,
        x: &FeatureTable,
        y: &[usize],
        threshold: f64,
    ) -> Result<HeldOut> {
        let held_out = self.fit_split(predictor, ModelKind::Risk, x, y)?;
        if held_out.y.is_empty() {
            warn!("no held-out rows; risk metrics skipped");
            self.metrics.risk = None;
        } else {
            let proba = predictor.predict_risk_probability(&held_out.x)?;
            let predicted: Vec<usize> = proba.iter().map(|&p| usize::from(p >= threshold)).collect();
            let m = BinaryMetrics::compute(&held_out.y, &predicted, &proba);
            info!(accuracy = m.accuracy, auc = m.auc_roc, f1 = m.f1_score, "risk model evaluated");
            self.metrics.risk = Some(m);
        }
        Ok(held_out)
    }

    pub fn train_severity_model<C: Classifier>(
        &mut self,
        predictor: &mut Predictor<C>,
        x: &FeatureTable,
        y: &[usize],
    ) -> Result<HeldOut> {
        if let Some(bad) = y.iter().find(|&&l| l > 3) {
            return Err(Error::InvalidInput(format!("severity label {} outside 0..=3", bad)));
        }
        let held_out = self.fit_split(predictor, ModelKind::Severity, x, y)?;
        if held_out.y.is_empty() {
            warn!("no held-out rows; severity metrics skipped");
            self.metrics.severity = None;
        } else {
            let predicted = predictor.predict_severity(&held_out.x)?;
            let m = MulticlassMetrics::compute(&held_out.y, &predicted);
            info!(accuracy = m.accuracy, f1 = m.f1_score, "severity model evaluated");
            self.metrics.severity = Some(m);
        }
        Ok(held_out)
    }

    /// Accuracy over stratified folds, fitting a fresh classifier per fold.
    pub fn cross_validate<C: Classifier>(
        &self,
        x: &FeatureTable,
        y: &[usize],
        kind: ModelKind,
        folds: usize,
    ) -> Result<CrossValidation> {
        if folds < 2 {
            return Err(Error::InvalidInput("cross-validation needs at least 2 folds".into()));
        }
        let (params, n_classes): (&BoostingParams, usize) = match kind {
            ModelKind::Risk => (&self.config.risk_model, 2),
            ModelKind::Severity => (&self.config.severity_model, 4),
        };
        let names = x.numeric_column_names();
        let (matrix, _) = x.to_matrix(&names);
        let fold_rows = stratified_folds(y, folds, self.config.random_state);

        let mut scores = Vec::with_capacity(folds);
        for (k, test) in fold_rows.iter().enumerate() {
            let train: Vec<usize> = fold_rows
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != k)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            if train.is_empty() || test.is_empty() {
                continue;
            }
            let mut clf = C::with_params(params, n_classes);
            clf.fit(matrix.select(Axis(0), &train).view(), &pick(y, &train))?;
            let predicted = clf.predict_classes(matrix.select(Axis(0), test).view())?;
            scores.push(accuracy(&pick(y, test), &predicted));
        }
        let cv = CrossValidation {
            mean: mean(&scores).unwrap_or(0.0),
            std: std_population(&scores),
            scores,
        };
        info!(model = %kind, mean = cv.mean, std = cv.std, "cross-validation done");
        Ok(cv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_preserves_class_balance() {
        let labels: Vec<usize> = (0..20).map(|i| usize::from(i % 4 == 0)).collect();
        let s = stratified_split(&labels, 0.2, 42);
        assert_eq!(s.train.len() + s.test.len(), 20);
        assert_eq!(pick(&labels, &s.test).iter().filter(|&&l| l == 1).count(), 1);
        assert_eq!(s, stratified_split(&labels, 0.2, 42));
    }

    #[test]
    fn folds_cover_every_row_once() {
        let labels: Vec<usize> = (0..17).map(|i| i % 3).collect();
        let folds = stratified_folds(&labels, 5, 7);
        let mut all: Vec<usize> = folds.concat();
        all.sort_unstable();
        assert_eq!(all, (0..17).collect::<Vec<_>>());
    }
}
