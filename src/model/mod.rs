//! Classifier capability, the boosted-tree backend, the risk/severity predictor and training.

mod boosted;
mod classifier;
pub mod metrics;
mod predictor;
mod trainer;

pub use boosted::{BoostedTrees, BoostingParams};
pub use classifier::{argmax, Classifier};
pub use metrics::{BinaryMetrics, CrossValidation, MulticlassMetrics};
pub use predictor::{EvalTrace, ModelKind, ModelPaths, Predictor, TrainedModel, Validation};
pub use trainer::{stratified_folds, stratified_split, HeldOut, ModelTrainer, Split, TrainingMetrics};
