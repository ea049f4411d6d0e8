//! Derived features, feature selection and the clean → engineer → normalise pipeline.

mod engineer;
mod pipeline;
mod selector;

pub use engineer::{screen_blink_ratio, AgeGroup, EngineerOptions, FeatureEngineer};
pub use pipeline::{FeaturePipeline, PipelineState};
pub use selector::{anova_f, FeatureSelector, SelectionMethod};
