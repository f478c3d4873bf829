use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide error type.
///
/// `exit_code` maps each variant to the process exit code a front-end
/// should use.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or inconsistent inputs, detected before any sampling starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A helper could not produce a finite result (the likelihood never
    /// returns this; it scores degenerate proposals with a sentinel instead).
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    /// Resume was requested but the checkpoint is absent or unreadable.
    #[error("cannot resume from '{}': {reason}", path.display())]
    Resume { path: PathBuf, reason: String },

    /// A region's package lacked something needed for the result bundle.
    #[error("aggregation failed for region {region}: {reason}")]
    Aggregation { region: usize, reason: String },

    /// Failure inside the nested sampler.
    #[error("sampler error: {0}")]
    Sampler(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Configuration(_) => 2,
            AppError::Io(_) | AppError::Json(_) => 3,
            AppError::NumericDegeneracy(_) | AppError::Sampler(_) => 4,
            AppError::Resume { .. } => 5,
            AppError::Aggregation { .. } => 6,
        }
    }
}
