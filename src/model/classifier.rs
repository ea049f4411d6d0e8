//! Classifier capability used by the predictor, trainer and feature selector.

use super::BoostingParams;
use crate::error::Result;
use ndarray::{Array2, ArrayView2};

/// A probabilistic classifier over dense `f64` feature matrices.
pub trait Classifier {
    /// Fresh, unfitted classifier for `n_classes` labels (`0..n_classes`).
    fn with_params(params: &BoostingParams, n_classes: usize) -> Self
    where
        Self: Sized;

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<()>;

    /// One row per sample, one column per class; rows sum to 1.
    fn predict_probabilities(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    fn predict_classes(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        let proba = self.predict_probabilities(x)?;
        Ok(proba.rows().into_iter().map(|row| argmax(row.iter().copied())).collect())
    }

    /// Per-feature importance in fit column order; `None` before fitting.
    fn feature_importances(&self) -> Option<&[f64]>;

    fn n_classes(&self) -> usize;

    fn serialize(&self) -> Result<Vec<u8>>;

    fn deserialize(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Index of the largest value; first wins on ties.
pub fn argmax(values: impl IntoIterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in values.into_iter().enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best.0
}
