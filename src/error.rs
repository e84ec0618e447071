//! Error types for the analysis engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    // Input validation errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid batch item at index {index}: {reason}")]
    InvalidItem { index: usize, reason: String },

    // Scorer execution errors
    #[error("Speech analysis failed: {cause}")]
    ScorerFailed { scorer: &'static str, cause: String },

    // Deadline errors
    #[error("analysis timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("analysis cancelled")]
    Cancelled,

    // Configuration errors
    #[error("invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: &'static str, message: String },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Whether the error came from caller input rather than from the engine.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidInput(_) | AnalysisError::InvalidItem { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scorer_failed_display_wraps_cause() {
        let error = AnalysisError::ScorerFailed {
            scorer: "clarity",
            cause: "boom".to_string(),
        };
        assert_eq!(error.to_string(), "Speech analysis failed: boom");
    }

    #[test]
    fn test_invalid_item_display_carries_index() {
        let error = AnalysisError::InvalidItem {
            index: 4,
            reason: "empty text".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "invalid batch item at index 4: empty text"
        );
        assert!(error.is_validation());
    }

    #[test]
    fn test_timeout_is_not_validation() {
        let error = AnalysisError::Timeout { timeout_ms: 250 };
        assert_eq!(error.to_string(), "analysis timed out after 250ms");
        assert!(!error.is_validation());
    }

    #[test]
    fn test_config_parse_from_serde() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: AnalysisError = parse_err.into();
        assert!(error.to_string().starts_with("failed to parse configuration"));
    }
}
