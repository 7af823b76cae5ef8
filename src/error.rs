//! Error types for the prazo pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PrazoError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PrazoError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl From<csv::Error> for PrazoError {
    fn from(err: csv::Error) -> Self {
        PrazoError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PrazoError {
    fn from(err: serde_json::Error) -> Self {
        PrazoError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PrazoError::DataError("bad table".to_string());
        assert_eq!(err.to_string(), "Data error: bad table");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PrazoError = io_err.into();
        assert!(matches!(err, PrazoError::IoError(_)));
    }
}
