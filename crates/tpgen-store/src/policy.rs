//! Upload gate
//!
//! Extension, size and encoding checks applied before any parsing.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, StoreError};

/// Default upload size limit (5 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Limits applied to uploaded files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Maximum size in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    /// Accepted extensions, lowercase, without the dot
    #[serde(default = "default_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_extensions() -> Vec<String> {
    vec!["yaml".to_string(), "yml".to_string()]
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_extensions: default_extensions(),
        }
    }
}

impl UploadPolicy {
    /// Policy with a custom size limit
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Check an upload and decode it.
    ///
    /// Checks run in order: extension, size, encoding.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn admit<'a>(&self, file_name: &str, bytes: &'a [u8]) -> Result<&'a str> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let accepted = extension
            .as_deref()
            .is_some_and(|ext| self.allowed_extensions.iter().any(|a| a == ext));
        if !accepted {
            return Err(StoreError::UnsupportedExtension {
                file_name: file_name.to_string(),
                allowed: self
                    .allowed_extensions
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        if bytes.len() > self.max_bytes {
            return Err(StoreError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        std::str::from_utf8(bytes).map_err(|e| StoreError::InvalidEncoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.max_bytes, 5_242_880);
        assert_eq!(policy.allowed_extensions, vec!["yaml", "yml"]);
    }

    #[test]
    fn test_admits_yaml() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.admit("plan.yaml", b"a: 1").expect("admit"), "a: 1");
        assert!(policy.admit("PLAN.YML", b"a: 1").is_ok());
    }

    #[test]
    fn test_rejects_extension() {
        let policy = UploadPolicy::default();
        for name in ["plan.json", "plan", "yaml", "plan.yaml.txt"] {
            let err = policy.admit(name, b"a: 1").expect_err(name);
            assert!(matches!(err, StoreError::UnsupportedExtension { .. }), "{name}");
        }
    }

    #[test]
    fn test_extension_checked_before_size() {
        let policy = UploadPolicy::default().with_max_bytes(1);
        let err = policy.admit("plan.txt", b"too long").expect_err("reject");
        assert!(matches!(err, StoreError::UnsupportedExtension { .. }));
    }

    #[test]
    fn test_rejects_oversized() {
        let policy = UploadPolicy::default().with_max_bytes(4);
        let err = policy.admit("plan.yaml", b"a: 12").expect_err("too large");
        assert!(matches!(err, StoreError::TooLarge { size: 5, limit: 4 }));
        assert!(policy.admit("plan.yaml", b"a: 1").is_ok());
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let policy = UploadPolicy::default();
        let err = policy.admit("plan.yaml", &[0x61, 0xff, 0xfe]).expect_err("encoding");
        assert!(matches!(err, StoreError::InvalidEncoding(_)));
    }

    #[test]
    fn test_policy_deserialize_defaults() {
        let policy: UploadPolicy = serde_json::from_str(r#"{"max_bytes": 10}"#).expect("parse");
        assert_eq!(policy.max_bytes, 10);
        assert_eq!(policy.allowed_extensions.len(), 2);
    }
}
