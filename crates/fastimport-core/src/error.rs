//! Semantic error types shared across the toolkit

use thiserror::Error;

/// Errors raised by the command model and by downstream stream consumers
#[derive(Error, Debug)]
pub enum Error {
    #[error("Illegal path '{0}'")]
    InvalidPath(String),

    #[error("Unknown mode {0:o}")]
    UnknownMode(u32),

    #[error("One-shot file list has already been drained")]
    FileListDrained,

    #[error("Unknown date format '{0}'")]
    UnknownDateFormat(String),

    #[error("Missing handler for command {0}")]
    MissingHandler(String),

    #[error("Unknown parameter - '{param}' not in {knowns:?}")]
    UnknownParameter { param: String, knowns: Vec<String> },

    #[error("Bad repository size - {found} revisions found, {expected} expected")]
    BadRepositorySize { expected: usize, found: usize },

    #[error("Bad restart - attempted to skip commit {0} but matching revision-id is unknown")]
    BadRestart(String),

    #[error("Unknown feature '{0}' - try a later importer or an earlier data format")]
    UnknownFeature(String),
}

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidPath("/absolute".to_string());
        assert_eq!(err.to_string(), "Illegal path '/absolute'");

        let err = Error::UnknownMode(0o777);
        assert_eq!(err.to_string(), "Unknown mode 777");

        let err = Error::UnknownFeature("done".to_string());
        assert_eq!(
            err.to_string(),
            "Unknown feature 'done' - try a later importer or an earlier data format"
        );
    }

    #[test]
    fn test_consumer_error_display() {
        let err = Error::BadRepositorySize {
            expected: 12,
            found: 11,
        };
        assert_eq!(
            err.to_string(),
            "Bad repository size - 11 revisions found, 12 expected"
        );

        let err = Error::BadRestart(":10".to_string());
        assert_eq!(
            err.to_string(),
            "Bad restart - attempted to skip commit :10 but matching revision-id is unknown"
        );

        let err = Error::UnknownParameter {
            param: "verbose".to_string(),
            knowns: vec!["info".to_string(), "count".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown parameter - 'verbose' not in [\"info\", \"count\"]"
        );
    }
}
