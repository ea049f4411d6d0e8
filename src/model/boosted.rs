//! Gradient-boosted tree backend on the `gbdt` crate. Binary problems use one log-likelihood
//! ensemble; multi-class problems train one ensemble per class and normalise the scores.

use super::classifier::Classifier;
use crate::error::{Error, Result};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub max_depth: u32,
    pub n_estimators: usize,
    pub learning_rate: f32,
    /// Row sampling ratio per tree
    pub subsample: f64,
    /// Feature sampling ratio per tree
    pub colsample: f64,
    pub min_leaf_size: usize,
    /// Seed for permutation importance
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self::risk()
    }
}

impl BoostingParams {
    pub fn risk() -> Self {
        Self {
            max_depth: 6,
            n_estimators: 200,
            learning_rate: 0.1,
            subsample: 0.8,
            colsample: 0.8,
            min_leaf_size: 1,
            seed: 42,
        }
    }

    pub fn severity() -> Self {
        Self {
            max_depth: 5,
            n_estimators: 150,
            ..Self::risk()
        }
    }

    /// Smaller ensemble used only to rank features.
    pub fn selection() -> Self {
        Self {
            max_depth: 4,
            n_estimators: 50,
            subsample: 1.0,
            colsample: 1.0,
            ..Self::risk()
        }
    }

    fn gbdt_config(&self, n_features: usize) -> Config {
        let mut cfg = Config::new();
        cfg.set_feature_size(n_features);
        cfg.set_max_depth(self.max_depth);
        cfg.set_iterations(self.n_estimators);
        cfg.set_shrinkage(self.learning_rate);
        cfg.set_loss("LogLikelyhood");
        cfg.set_min_leaf_size(self.min_leaf_size);
        cfg.set_data_sample_ratio(self.subsample);
        cfg.set_feature_sample_ratio(self.colsample);
        cfg.set_debug(false);
        cfg
    }
}

#[derive(Serialize, Deserialize)]
pub struct BoostedTrees {
    params: BoostingParams,
    n_classes: usize,
    n_features: usize,
    /// One ensemble for binary problems, one per class otherwise
    ensembles: Vec<GBDT>,
    importances: Option<Vec<f64>>,
}

impl std::fmt::Debug for BoostedTrees {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoostedTrees")
            .field("params", &self.params)
            .field("n_classes", &self.n_classes)
            .field("n_features", &self.n_features)
            .field("ensembles", &self.ensembles.len())
            .finish()
    }
}

fn rows_as_test_data(x: ArrayView2<'_, f64>) -> DataVec {
    x.rows()
        .into_iter()
        .map(|row| Data::new_test_data(row.iter().map(|&v| v as f32).collect(), None))
        .collect()
}

impl BoostedTrees {
    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn fit_ensemble(&self, x: ArrayView2<'_, f64>, positive: &[bool]) -> GBDT {
        let cfg = self.params.gbdt_config(x.ncols());
        let mut data: DataVec = x
            .rows()
            .into_iter()
            .zip(positive)
            .map(|(row, &pos)| {
                let label = if pos { 1.0 } else { -1.0 };
                Data::new_training_data(row.iter().map(|&v| v as f32).collect(), 1.0, label, None)
            })
            .collect();
        let mut model = GBDT::new(&cfg);
        model.fit(&mut data);
        model
    }

    fn raw_probabilities(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let data = rows_as_test_data(x);
        let n = x.nrows();
        let mut out = Array2::<f64>::zeros((n, self.n_classes));
        if self.n_classes == 2 {
            let p = self.ensembles[0].predict(&data);
            for (i, v) in p.into_iter().enumerate() {
                let v = (v as f64).clamp(0.0, 1.0);
                out[(i, 0)] = 1.0 - v;
                out[(i, 1)] = v;
            }
        } else {
            for (c, model) in self.ensembles.iter().enumerate() {
                for (i, v) in model.predict(&data).into_iter().enumerate() {
                    out[(i, c)] = (v as f64).clamp(0.0, 1.0);
                }
            }
            for mut row in out.rows_mut() {
                let total: f64 = row.sum();
                if total > 0.0 {
                    row.mapv_inplace(|v| v / total);
                } else {
                    row.fill(1.0 / self.n_classes as f64);
                }
            }
        }
        out
    }

    /// Mean absolute change in class probabilities when one column is shuffled.
    fn permutation_importances(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        let baseline = self.raw_probabilities(x);
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut scores = Vec::with_capacity(x.ncols());
        for j in 0..x.ncols() {
            let mut shuffled = x.to_owned();
            let mut column: Vec<f64> = x.column(j).to_vec();
            column.shuffle(&mut rng);
            for (i, v) in column.into_iter().enumerate() {
                shuffled[(i, j)] = v;
            }
            let permuted = self.raw_probabilities(shuffled.view());
            let delta = (&permuted - &baseline).mapv(f64::abs).mean().unwrap_or(0.0);
            scores.push(delta);
        }
        let total: f64 = scores.iter().sum();
        if total > 0.0 {
            scores.iter_mut().for_each(|s| *s /= total);
        }
        scores
    }
}

impl Classifier for BoostedTrees {
    fn with_params(params: &BoostingParams, n_classes: usize) -> Self {
        Self {
            params: params.clone(),
            n_classes: n_classes.max(2),
            n_features: 0,
            ensembles: Vec::new(),
            importances: None,
        }
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(Error::Classifier("cannot fit on an empty feature matrix".into()));
        }
        if x.nrows() != y.len() {
            return Err(Error::Classifier(format!(
                "{} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if let Some(bad) = y.iter().find(|&&l| l >= self.n_classes) {
            return Err(Error::Classifier(format!(
                "label {} outside 0..{}",
                bad, self.n_classes
            )));
        }

        self.n_features = x.ncols();
        self.ensembles = if self.n_classes == 2 {
            let positive: Vec<bool> = y.iter().map(|&l| l == 1).collect();
            vec![self.fit_ensemble(x, &positive)]
        } else {
            (0..self.n_classes)
                .map(|c| {
                    let positive: Vec<bool> = y.iter().map(|&l| l == c).collect();
                    self.fit_ensemble(x, &positive)
                })
                .collect()
        };
        self.importances = Some(self.permutation_importances(x));
        Ok(())
    }

    fn predict_probabilities(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.ensembles.is_empty() {
            return Err(Error::Classifier("classifier has not been fitted".into()));
        }
        if x.ncols() != self.n_features {
            return Err(Error::Classifier(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(self.raw_probabilities(x))
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.importances.as_deref()
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn quick() -> BoostingParams {
        BoostingParams {
            n_estimators: 20,
            max_depth: 3,
            subsample: 1.0,
            colsample: 1.0,
            ..BoostingParams::risk()
        }
    }

    #[test]
    fn separable_binary_problem() {
        let x = array![[0.0, 5.0], [1.0, 5.0], [2.0, 5.0], [8.0, 5.0], [9.0, 5.0], [10.0, 5.0]];
        let y = [0, 0, 0, 1, 1, 1];
        let mut model = BoostedTrees::with_params(&quick(), 2);
        model.fit(x.view(), &y).unwrap();
        let proba = model.predict_probabilities(x.view()).unwrap();
        assert!(proba[(0, 1)] < 0.5);
        assert!(proba[(5, 1)] > 0.5);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        let imp = model.feature_importances().unwrap();
        assert_eq!(imp.len(), 2);
        assert!(imp.iter().all(|v| *v >= 0.0));
        assert!(imp[0] >= imp[1]);
    }

    #[test]
    fn rejects_unfitted_and_bad_labels() {
        let x = array![[1.0], [2.0]];
        let mut model = BoostedTrees::with_params(&quick(), 2);
        assert!(model.predict_probabilities(x.view()).is_err());
        assert!(model.fit(x.view(), &[0, 3]).is_err());
    }
}
