//! Classification metrics for held-out evaluation and cross-validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Binary metrics for the risk model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub auc_roc: f64,
}

/// Multi-class metrics with support-weighted averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MulticlassMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub mean: f64,
    pub std: f64,
    pub scores: Vec<f64>,
}

impl BinaryMetrics {
    pub fn compute(labels: &[usize], predicted: &[usize], probabilities: &[f64]) -> Self {
        Self {
            accuracy: accuracy(labels, predicted),
            precision: precision(labels, predicted, 1),
            recall: recall(labels, predicted, 1),
            f1_score: f1(labels, predicted, 1),
            auc_roc: roc_auc(probabilities, labels),
        }
    }
}

impl MulticlassMetrics {
    pub fn compute(labels: &[usize], predicted: &[usize]) -> Self {
        let classes: BTreeSet<usize> = labels.iter().copied().collect();
        let total = labels.len().max(1) as f64;
        let (mut p, mut r, mut f) = (0.0, 0.0, 0.0);
        for &c in &classes {
            let w = labels.iter().filter(|&&l| l == c).count() as f64 / total;
            p += w * precision(labels, predicted, c);
            r += w * recall(labels, predicted, c);
            f += w * f1(labels, predicted, c);
        }
        Self {
            accuracy: accuracy(labels, predicted),
            precision: p,
            recall: r,
            f1_score: f,
        }
    }
}

pub fn accuracy(labels: &[usize], predicted: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = labels.iter().zip(predicted).filter(|(a, b)| a == b).count();
    correct as f64 / labels.len() as f64
}

/// Precision for class `positive`; 0 when nothing was predicted positive.
pub fn precision(labels: &[usize], predicted: &[usize], positive: usize) -> f64 {
    let (tp, fp) = labels
        .iter()
        .zip(predicted)
        .filter(|(_, &p)| p == positive)
        .fold((0usize, 0usize), |(tp, fp), (&l, _)| {
            if l == positive {
                (tp + 1, fp)
            } else {
                (tp, fp + 1)
            }
        });
    if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    }
}

/// Recall for class `positive`; 0 when the class never occurs.
pub fn recall(labels: &[usize], predicted: &[usize], positive: usize) -> f64 {
    let (tp, fn_) = labels
        .iter()
        .zip(predicted)
        .filter(|(&l, _)| l == positive)
        .fold((0usize, 0usize), |(tp, fn_), (_, &p)| {
            if p == positive {
                (tp + 1, fn_)
            } else {
                (tp, fn_ + 1)
            }
        });
    if tp + fn_ == 0 {
        0.0
    } else {
        tp as f64 / (tp + fn_) as f64
    }
}

pub fn f1(labels: &[usize], predicted: &[usize], positive: usize) -> f64 {
    let p = precision(labels, predicted, positive);
    let r = recall(labels, predicted, positive);
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

/// Area under the ROC curve via the Mann-Whitney statistic; tied scores count half.
/// Returns 0.5 when either class is absent.
pub fn roc_auc(scores: &[f64], labels: &[usize]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut pairs: Vec<(f64, bool)> = scores.iter().zip(labels).map(|(&s, &l)| (s, l == 1)).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Average ranks over tie groups.
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j + 1 < pairs.len() && pairs[j + 1].0 == pairs[i].0 {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum_pos += pairs[i..=j].iter().filter(|p| p.1).count() as f64 * avg_rank;
        i = j + 1;
    }
    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos as f64 * n_neg as f64)
}

/// `matrix[true][predicted]` counts over `n_classes`.
pub fn confusion_matrix(labels: &[usize], predicted: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut m = vec![vec![0; n_classes]; n_classes];
    for (&l, &p) in labels.iter().zip(predicted) {
        if l < n_classes && p < n_classes {
            m[l][p] += 1;
        }
    }
    m
}

/// Mean binary cross-entropy with probabilities clipped away from 0 and 1.
pub fn log_loss(labels: &[usize], probabilities: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let eps = 1e-15;
    let total: f64 = labels
        .iter()
        .zip(probabilities)
        .map(|(&l, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            if l == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / labels.len() as f64
}
