//! Error types for tpgen-core

use thiserror::Error;

/// Result type alias for tpgen-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading engine configuration.
///
/// Analysis itself never fails with these: grammar and parse problems are
/// reported as data in [`crate::ValidationReport`] and
/// [`crate::AnalysisOutcome`].
#[derive(Debug, Error)]
pub enum Error {
    /// Reference template is malformed
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Machine catalog is malformed
    #[error("Invalid machine catalog: {0}")]
    InvalidCatalog(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
