//! Risk and severity models: training, feature alignment, prediction and artifact persistence.
//! An artifact is one JSON header line followed by the classifier payload; the header carries
//! the SHA-256 of the payload so truncated or edited files are rejected on load.

use super::boosted::{BoostedTrees, BoostingParams};
use super::classifier::Classifier;
use super::metrics::log_loss;
use crate::data::FeatureTable;
use crate::error::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Risk,
    Severity,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Risk => write!(f, "risk"),
            ModelKind::Severity => write!(f, "severity"),
        }
    }
}

/// Log-loss per stage of training, on the training set and optional validation set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalTrace {
    pub train_logloss: f64,
    pub validation_logloss: Option<f64>,
}

/// A fitted classifier with the ordered feature names it was trained on.
#[derive(Debug)]
pub struct TrainedModel<C> {
    pub classifier: C,
    pub feature_names: Vec<String>,
    pub eval: EvalTrace,
}

#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub risk: PathBuf,
    pub severity: PathBuf,
}

impl ModelPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            risk: dir.join("risk_model.bin"),
            severity: dir.join("severity_model.bin"),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ArtifactHeader {
    kind: ModelKind,
    feature_names: Vec<String>,
    eval: EvalTrace,
    sha256: String,
    len: usize,
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{:02x}", b)).collect()
}

/// Validation set passed to training: features plus labels.
pub type Validation<'a> = (&'a FeatureTable, &'a [usize]);

pub struct Predictor<C = BoostedTrees> {
    risk: Option<TrainedModel<C>>,
    severity: Option<TrainedModel<C>>,
    risk_params: BoostingParams,
    severity_params: BoostingParams,
}

impl<C: Classifier> Default for Predictor<C> {
    fn default() -> Self {
        Self::new(BoostingParams::risk(), BoostingParams::severity())
    }
}

/// Mean log-loss of the positive class (binary) or the true class (multi-class).
fn eval_logloss(proba: &Array2<f64>, y: &[usize]) -> f64 {
    if proba.ncols() == 2 {
        let p: Vec<f64> = proba.column(1).to_vec();
        log_loss(y, &p)
    } else {
        let p: Vec<f64> = y
            .iter()
            .enumerate()
            .map(|(i, &l)| proba.get((i, l)).copied().unwrap_or(0.0))
            .collect();
        log_loss(&vec![1; y.len()], &p)
    }
}

impl<C: Classifier> Predictor<C> {
    pub fn new(risk_params: BoostingParams, severity_params: BoostingParams) -> Self {
        Self {
            risk: None,
            severity: None,
            risk_params,
            severity_params,
        }
    }

    pub fn is_trained(&self, kind: ModelKind) -> bool {
        self.model(kind).is_some()
    }

    pub fn model(&self, kind: ModelKind) -> Option<&TrainedModel<C>> {
        match kind {
            ModelKind::Risk => self.risk.as_ref(),
            ModelKind::Severity => self.severity.as_ref(),
        }
    }

    fn require(&self, kind: ModelKind) -> Result<&TrainedModel<C>> {
        self.model(kind).ok_or(Error::ModelNotTrained(kind))
    }

    fn fit(
        &self,
        kind: ModelKind,
        x: &FeatureTable,
        y: &[usize],
        validation: Option<Validation<'_>>,
    ) -> Result<TrainedModel<C>> {
        let (params, n_classes) = match kind {
            ModelKind::Risk => (&self.risk_params, 2),
            ModelKind::Severity => (&self.severity_params, 4),
        };
        let feature_names = x.numeric_column_names();
        let (matrix, _) = x.to_matrix(&feature_names);
        let mut classifier = C::with_params(params, n_classes);
        classifier.fit(matrix.view(), y)?;

        let train_logloss = eval_logloss(&classifier.predict_probabilities(matrix.view())?, y);
        let validation_logloss = match validation {
            Some((vx, vy)) => {
                let (vm, _) = vx.to_matrix(&feature_names);
                Some(eval_logloss(&classifier.predict_probabilities(vm.view())?, vy))
            }
            None => None,
        };
        info!(
            model = %kind,
            rows = x.n_rows(),
            features = feature_names.len(),
            train_logloss,
            ?validation_logloss,
            "model trained"
        );
        Ok(TrainedModel {
            classifier,
            feature_names,
            eval: EvalTrace {
                train_logloss,
                validation_logloss,
            },
        })
    }

    /// Fit the binary risk model on the numeric columns of `x`.
    pub fn train_risk(&mut self, x: &FeatureTable, y: &[usize], validation: Option<Validation<'_>>) -> Result<()> {
        self.risk = Some(self.fit(ModelKind::Risk, x, y, validation)?);
        Ok(())
    }

    /// Fit the four-level severity model. Labels must lie in `0..=3`.
    pub fn train_severity(
        &mut self,
        x: &FeatureTable,
        y: &[usize],
        validation: Option<Validation<'_>>,
    ) -> Result<()> {
        self.severity = Some(self.fit(ModelKind::Severity, x, y, validation)?);
        Ok(())
    }

    /// Matrix over the fit-time features. Absent columns read as 0.0.
    fn aligned(&self, kind: ModelKind, x: &FeatureTable) -> Result<(&TrainedModel<C>, Array2<f64>)> {
        let model = self.require(kind)?;
        let (matrix, absent) = x.to_matrix(&model.feature_names);
        if !absent.is_empty() {
            warn!(model = %kind, missing = ?absent, "features absent at prediction time; using 0.0");
        }
        Ok((model, matrix))
    }

    pub fn predict_risk_probability(&self, x: &FeatureTable) -> Result<Vec<f64>> {
        let (model, m) = self.aligned(ModelKind::Risk, x)?;
        let proba = model.classifier.predict_probabilities(m.view())?;
        Ok(proba.column(1).to_vec())
    }

    /// Binary decision per row: probability at or above `threshold`.
    pub fn predict_risk(&self, x: &FeatureTable, threshold: f64) -> Result<Vec<bool>> {
        Ok(self
            .predict_risk_probability(x)?
            .into_iter()
            .map(|p| p >= threshold)
            .collect())
    }

    pub fn predict_severity(&self, x: &FeatureTable) -> Result<Vec<usize>> {
        let (model, m) = self.aligned(ModelKind::Severity, x)?;
        model.classifier.predict_classes(m.view())
    }

    pub fn predict_severity_probability(&self, x: &FeatureTable) -> Result<Array2<f64>> {
        let (model, m) = self.aligned(ModelKind::Severity, x)?;
        model.classifier.predict_probabilities(m.view())
    }

    /// Importance per fit-time feature name.
    pub fn feature_importance(&self, kind: ModelKind) -> Option<BTreeMap<String, f64>> {
        let model = self.model(kind)?;
        let importances = model.classifier.feature_importances()?;
        Some(
            model
                .feature_names
                .iter()
                .cloned()
                .zip(importances.iter().copied())
                .collect(),
        )
    }

    /// Write each trained model to its own artifact. Untrained models are skipped.
    pub fn save(&self, paths: &ModelPaths) -> Result<()> {
        for (kind, path) in [(ModelKind::Risk, &paths.risk), (ModelKind::Severity, &paths.severity)] {
            if let Some(model) = self.model(kind) {
                write_artifact(kind, model, path)?;
                info!(model = %kind, path = %path.display(), "model saved");
            }
        }
        Ok(())
    }

    /// Load whichever artifacts exist. A missing file leaves that model unset.
    pub fn load(&mut self, paths: &ModelPaths) -> Result<()> {
        for (kind, path) in [(ModelKind::Risk, &paths.risk), (ModelKind::Severity, &paths.severity)] {
            if !path.exists() {
                warn!(model = %kind, path = %path.display(), "model artifact not found");
                continue;
            }
            let model = read_artifact::<C>(kind, path)?;
            info!(model = %kind, path = %path.display(), features = model.feature_names.len(), "model loaded");
            match kind {
                ModelKind::Risk => self.risk = Some(model),
                ModelKind::Severity => self.severity = Some(model),
            }
        }
        Ok(())
    }
}

fn write_artifact<C: Classifier>(kind: ModelKind, model: &TrainedModel<C>, path: &Path) -> Result<()> {
    let payload = model.classifier.serialize()?;
    let header = ArtifactHeader {
        kind,
        feature_names: model.feature_names.clone(),
        eval: model.eval.clone(),
        sha256: hex_digest(&payload),
        len: payload.len(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut bytes = serde_json::to_vec(&header)?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&payload);
    std::fs::write(path, bytes)?;
    Ok(())
}

fn read_artifact<C: Classifier>(kind: ModelKind, path: &Path) -> Result<TrainedModel<C>> {
    let corrupt = |reason: String| Error::CorruptArtifact {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(path)?;
    let split = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| corrupt("missing header line".into()))?;
    let header: ArtifactHeader =
        serde_json::from_slice(&bytes[..split]).map_err(|e| corrupt(format!("bad header: {}", e)))?;
    let payload = &bytes[split + 1..];
    if header.kind != kind {
        return Err(corrupt(format!("holds a {} model, expected {}", header.kind, kind)));
    }
    if payload.len() != header.len || hex_digest(payload) != header.sha256 {
        return Err(corrupt("payload digest mismatch".into()));
    }
    let classifier = C::deserialize(payload)?;
    Ok(TrainedModel {
        classifier,
        feature_names: header.feature_names,
        eval: header.eval,
    })
}
