//! Error types for the buyback converter.
//!
//! Two layers, both built with `thiserror`:
//! - [`ParseError`] is raised for a single vendor line and never aborts a file.
//! - [`BuybackError`] is the crate-level error that aborts a file kind.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for converter operations.
pub type Result<T> = std::result::Result<T, BuybackError>;

/// Record-level parse failure.
///
/// The conversion engine catches these, logs the offending line and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A required column is blank or missing
    #[error("Required field {0} is blank")]
    MissingRequired(&'static str),

    /// A date or date-time column could not be parsed
    #[error("Invalid date in {field}: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    /// A numeric column could not be parsed
    #[error("Invalid number in {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// A positional line has fewer cells than the layout needs
    #[error("Line has {found} columns, expected at least {expected}")]
    ShortLine { expected: usize, found: usize },

    /// Folding the record into its universe row overflows a sum
    #[error("Universe column {column} overflows for {identifier}")]
    AggregateOverflow { identifier: String, column: usize },

    /// A record asked for a column its own layout does not define
    #[error("Unknown column: {0}")]
    UnknownColumn(&'static str),
}

/// Main error type for conversion runs.
#[derive(Error, Debug)]
pub enum BuybackError {
    /// I/O failure on a specific path
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted line could not be read back
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The raw vendor file for the requested date does not exist
    #[error("Input file not found: {0}")]
    MissingInput(PathBuf),

    /// Configuration rejected by `validate()`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Market has no identifier code
    #[error("Unsupported market: {0}")]
    UnsupportedMarket(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Generic(String),
}

impl BuybackError {
    /// Create a generic error from any string-like type.
    pub fn generic(msg: impl Into<String>) -> Self {
        BuybackError::Generic(msg.into())
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuybackError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::InvalidDate {
            field: "LastUpdate",
            value: "2019-13-45".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid date in LastUpdate: \"2019-13-45\"");
    }

    #[test]
    fn test_parse_error_converts() {
        let err: BuybackError = ParseError::MissingRequired("LastUpdate").into();
        assert!(matches!(err, BuybackError::Parse(ParseError::MissingRequired(_))));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = BuybackError::io(
            "/data/out/aapl.tsv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/data/out/aapl.tsv"));
    }
}
