//! Error types for tpgen-store

use thiserror::Error;
use tpgen_core::GrammarError;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the upload gate and the record store
#[derive(Debug, Error)]
pub enum StoreError {
    /// File extension not accepted
    #[error("Unsupported file type '{file_name}'. Allowed: {allowed}")]
    UnsupportedExtension {
        /// Uploaded file name
        file_name: String,
        /// Accepted extensions, comma separated
        allowed: String,
    },

    /// Upload exceeds the size limit
    #[error("File is {size} bytes; the limit is {limit} bytes")]
    TooLarge {
        /// Upload size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// Upload is not UTF-8
    #[error("File is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    /// Grammar validation failed
    #[error("{}", .0.display_message())]
    Grammar(#[from] GrammarError),

    /// Tolerant parse failed
    #[error("Failed to parse test plan: {}", .0.join("; "))]
    ParseFailed(Vec<String>),

    /// No record with this id
    #[error("Upload {0} not found")]
    NotFound(u64),

    /// The `sequence` file does not hold an id
    #[error("Corrupt sequence file: '{0}'")]
    CorruptSequence(String),

    /// Another writer held the store lock past the timeout
    #[error("Timed out waiting for store lock '{0}'")]
    LeaseTimeout(String),

    /// Template or catalog error
    #[error(transparent)]
    Core(#[from] tpgen_core::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpgen_core::GrammarErrorCode;

    #[test]
    fn test_grammar_error_display() {
        let err: StoreError = GrammarError::new(
            GrammarErrorCode::MissingRequiredField,
            "Missing required field 'hardware'",
            None,
        )
        .into();
        assert_eq!(err.to_string(), "[ERROR]\nMissing required field 'hardware'");
    }

    #[test]
    fn test_grammar_error_display_with_line() {
        let err = StoreError::Grammar(GrammarError::new(
            GrammarErrorCode::YamlSyntaxError,
            "bad indent",
            Some(12),
        ));
        assert_eq!(err.to_string(), "Line 12 [ERROR]\nbad indent");
    }

    #[test]
    fn test_too_large_display() {
        let err = StoreError::TooLarge { size: 10, limit: 5 };
        assert_eq!(err.to_string(), "File is 10 bytes; the limit is 5 bytes");
    }

    #[test]
    fn test_parse_failed_display() {
        let err = StoreError::ParseFailed(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Failed to parse test plan: a; b");
    }

    #[test]
    fn test_corrupt_sequence_display() {
        let err = StoreError::CorruptSequence("x1".to_string());
        assert_eq!(err.to_string(), "Corrupt sequence file: 'x1'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::IoError(_)));
    }
}
