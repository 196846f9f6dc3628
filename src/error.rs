use thiserror::Error;

use crate::sensor::SensorKind;

/// Sensor core error types
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Sensor source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {value:?}")]
    Parse { path: String, value: String },

    #[error("Malformed {kind:?} reading: expected {expected} values, got {got}")]
    MalformedReading {
        kind: SensorKind,
        expected: usize,
        got: usize,
    },

    #[error("Unsupported sensor kind: {0:?}")]
    UnsupportedKind(SensorKind),
}

/// Result type for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

impl SensorError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        SensorError::Io {
            path: path.into(),
            source,
        }
    }
}
