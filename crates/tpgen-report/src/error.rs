//! Error types for tpgen-report

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering a report
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown output format name
    #[error("Unknown output format '{0}'. Valid: json, yaml, markdown")]
    UnknownFormat(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_display() {
        let err = Error::UnknownFormat("html".to_string());
        assert!(err.to_string().contains("'html'"));
        assert!(err.to_string().contains("markdown"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u8>("x").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::SerializationError(_)));
    }
}
