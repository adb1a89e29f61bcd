//! Error taxonomy shared by the training and scoring pipelines

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LtvError {
    /// Input table is unreadable or malformed.
    #[error("Data source error ({}): {reason}", path.display())]
    DataSource { path: PathBuf, reason: String },

    /// Model fitting failed: bad inputs or the optimizer did not converge.
    #[error("Model fit error ({model}): {reason}")]
    ModelFit { model: &'static str, reason: String },

    /// A persisted parameter artifact is absent or corrupt.
    #[error("Model load error ({}): {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// Writing an artifact or output table failed.
    #[error("Persistence error ({}): {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// In-memory data is unusable for the requested step.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Plot error: {0}")]
    Plot(String),
}

impl LtvError {
    pub fn data_source(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LtvError::DataSource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn model_fit(model: &'static str, reason: impl ToString) -> Self {
        LtvError::ModelFit {
            model,
            reason: reason.to_string(),
        }
    }

    pub fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LtvError::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LtvError::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LtvError>;
