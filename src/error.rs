//! Error types for the theft detection engine.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the scoring engine.
///
/// Numeric degeneracy (NaN/Inf during feature computation) is not an error:
/// the extractor sanitizes those values to 0.0 before they leave it.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input table rejected before any scoring happened.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A model artifact could not be loaded. Fatal at startup for
    /// classifiers and scalers; the sequence model degrades instead.
    #[error("failed to load artifact `{name}`: {source}")]
    ArtifactLoad {
        name: String,
        #[source]
        source: BoxedSource,
    },

    /// A detector cannot produce a score; callers substitute its
    /// documented fallback.
    #[error("detector `{0}` is unavailable")]
    DetectorUnavailable(&'static str),

    /// Inference on a loaded model failed at request time. Isolated to one
    /// row when it happens inside a batch.
    #[error("inference failed for `{detector}`: {source}")]
    Inference {
        detector: String,
        #[source]
        source: BoxedSource,
    },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn artifact(name: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self::ArtifactLoad {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn inference(detector: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self::Inference {
            detector: detector.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::validation("input table has no rows");
        assert_eq!(err.to_string(), "invalid input: input table has no rows");

        let err = EngineError::artifact("xgboost", "file not found".to_string());
        assert!(err.to_string().contains("xgboost"));
    }
}
