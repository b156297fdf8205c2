//! Error types for the evaluation toolkit.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while estimating or evaluating.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file does not exist.
    #[error("File '{0}' does not exist")]
    FileNotFound(PathBuf),

    /// A malformed line or an inconsistent input file.
    #[error("Format error in '{path}', line {line}: {message}")]
    Format {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Invalid configuration (option out of range, bad parameter set).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The estimator name is not in the registry.
    #[error("'{0}' is not a valid estimator name")]
    UnknownEstimator(String),

    /// A pure estimate store was asked for a pair it does not hold.
    #[error("No estimate available for document '{document}' to query '{query}'")]
    MissingEstimate { query: String, document: String },
}

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a format error with file and line context.
    pub fn format(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
