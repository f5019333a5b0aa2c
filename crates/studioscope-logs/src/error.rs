use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the log analysis engine
///
/// Only genuine resource failures surface as `Err`. A missing log file is
/// an empty result, and malformed query parameters are reported through
/// the result's `error` field.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid regex pattern: {pattern}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid date: {value}")]
    InvalidDate { value: String },
}

impl LogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LogError>;
