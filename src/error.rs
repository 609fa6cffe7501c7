//! Unified error handling for the trap-matcher library.
//!
//! Errors only surface from the dataset parsers and the configuration layer.
//! The detector recovers from every variant locally: a failed dataset
//! contributes zero records and a malformed record is skipped, so public
//! detector operations always resolve to a representable "no trap" state.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for trap-matcher operations.
#[derive(Debug, Error)]
pub enum TrapMatchError {
    /// A dataset file is missing, unreadable, or not in the expected schema
    #[error("Failed to load dataset '{}': {message}", .path.display())]
    DataLoad { path: PathBuf, message: String },

    /// A single record lacks geometry or carries an unparseable limit
    #[error("Record {index} is malformed: {message}")]
    MalformedRecord { index: usize, message: String },

    /// Top-level JSON could not be decoded
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TrapMatchError {
    /// Attach a dataset path to a parse failure.
    pub fn at_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            TrapMatchError::DataLoad { message, .. } => TrapMatchError::DataLoad {
                path: path.into(),
                message,
            },
            other => TrapMatchError::DataLoad {
                path: path.into(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for trap-matcher operations.
pub type Result<T> = std::result::Result<T, TrapMatchError>;

/// Extension trait for converting Option to TrapMatchError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a malformed record error.
    fn ok_or_malformed(self, index: usize, message: &str) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_malformed(self, index: usize, message: &str) -> Result<T> {
        self.ok_or_else(|| TrapMatchError::MalformedRecord {
            index,
            message: message.to_string(),
        })
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrapMatchError::Internal {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrapMatchError::MalformedRecord {
            index: 7,
            message: "missing coordinates".to_string(),
        };
        assert!(err.to_string().contains("Record 7"));
        assert!(err.to_string().contains("missing coordinates"));

        let err = TrapMatchError::DataLoad {
            path: PathBuf::from("speedtraps.geojson"),
            message: "not found".to_string(),
        };
        assert!(err.to_string().contains("speedtraps.geojson"));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_malformed(3, "no limit");
        assert!(matches!(
            result,
            Err(TrapMatchError::MalformedRecord { index: 3, .. })
        ));
    }

    #[test]
    fn test_at_path_wraps_parse_error() {
        let parse_err = serde_json::from_str::<Vec<f64>>("{").unwrap_err();
        let err = TrapMatchError::from(parse_err).at_path("cameras.json");
        match err {
            TrapMatchError::DataLoad { path, message } => {
                assert_eq!(path, PathBuf::from("cameras.json"));
                assert!(message.contains("JSON parse error"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
