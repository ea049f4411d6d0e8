//! Crate error kinds. Validation findings are not errors; see [`crate::data::ValidationReport`].

use crate::model::ModelKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Prediction attempted before the model was trained or loaded.
    #[error("{0} model not trained")]
    ModelNotTrained(ModelKind),

    /// Missing or malformed input file. Aborts the pipeline.
    #[error("failed to load data from {path}: {reason}")]
    DataLoad { path: PathBuf, reason: String },

    /// A single record failed inside a batch run.
    #[error("record {index} failed: {source}")]
    Record {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// Model artifact header or digest did not match its payload.
    #[error("model artifact {path} is corrupt: {reason}")]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn data_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::DataLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an error as the failure of batch record `index`.
    pub fn for_record(self, index: usize) -> Self {
        Error::Record {
            index,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
