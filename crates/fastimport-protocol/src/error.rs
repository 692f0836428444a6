//! Stream parsing error types

use thiserror::Error;

/// Errors raised while reading or parsing an import stream.
///
/// Parse failures carry the line number the reader had reached when the
/// problem was noticed.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {lineno}: Unexpected EOF - expected {expected} bytes, found {found}")]
    MissingBytes {
        lineno: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {lineno}: Unexpected EOF - expected '{terminator}' terminator")]
    MissingTerminator { lineno: u64, terminator: String },

    #[error("line {lineno}: Invalid command '{command}'")]
    InvalidCommand { lineno: u64, command: String },

    #[error("line {lineno}: Command {command} is missing section {section}")]
    MissingSection {
        lineno: u64,
        command: &'static str,
        section: &'static str,
    },

    #[error("line {lineno}: Bad format for section {section} in command {command}: found '{text}'")]
    BadFormat {
        lineno: u64,
        command: &'static str,
        section: &'static str,
        text: String,
    },

    #[error("line {lineno}: Timezone '{timezone}' could not be converted.{reason}")]
    InvalidTimezone {
        lineno: u64,
        timezone: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] fastimport_core::Error),
}

/// Result type for stream parsing operations
pub type ParseResult<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::MissingBytes {
            lineno: 3,
            expected: 10,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "line 3: Unexpected EOF - expected 10 bytes, found 2"
        );

        let err = ParseError::InvalidCommand {
            lineno: 1,
            command: "garbage".to_string(),
        };
        assert_eq!(err.to_string(), "line 1: Invalid command 'garbage'");

        let err = ParseError::MissingSection {
            lineno: 5,
            command: "commit",
            section: "committer",
        };
        assert_eq!(
            err.to_string(),
            "line 5: Command commit is missing section committer"
        );
    }

    #[test]
    fn test_core_error_conversion() {
        let err = ParseError::from(fastimport_core::Error::UnknownMode(0o777));
        assert!(matches!(err, ParseError::Core(_)));
        assert_eq!(err.to_string(), "Core error: Unknown mode 777");
    }
}
