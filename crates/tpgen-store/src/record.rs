//! Persisted upload records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tpgen_core::{AnalysisResult, BasicInfo, ComparisonResult, TypeError, ValidationStatus};

/// Hex SHA-256 of uploaded content
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// One stored upload: raw text plus its analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Store-allocated id
    pub id: u64,
    /// Uploaded file name
    pub file_name: String,
    /// Size in bytes
    pub file_size: usize,
    /// Raw uploaded text
    pub content: String,
    /// Hex SHA-256 of `content`
    pub sha256: String,
    /// Summary columns
    pub basic_info: BasicInfo,
    /// Verdict
    pub validation_status: ValidationStatus,
    /// Template the plan was compared against
    pub template_name: String,
    /// Full analysis
    pub analysis: AnalysisResult,
    /// Uploader
    pub created_by: String,
    /// Upload time
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Summary row for listings
    #[must_use]
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id,
            file_name: self.file_name.clone(),
            plan_name: self.basic_info.plan_name.clone(),
            test_type: self.basic_info.test_type.clone(),
            validation_status: self.validation_status,
            warning_count: self.analysis.warning_count,
            error_count: self.analysis.error_count,
            compatible_count: self.analysis.compatible_count,
            created_by: self.created_by.clone(),
            created_at: self.created_at,
        }
    }
}

/// Listing row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    /// Record id
    pub id: u64,
    /// Uploaded file name
    pub file_name: String,
    /// `metadata.plan_name`
    pub plan_name: Option<String>,
    /// `metadata.test_type`
    pub test_type: Option<String>,
    /// Verdict
    pub validation_status: ValidationStatus,
    /// Number of warnings
    pub warning_count: usize,
    /// Number of validation errors
    pub error_count: usize,
    /// Number of compatible machines
    pub compatible_count: usize,
    /// Uploader
    pub created_by: String,
    /// Upload time
    pub created_at: DateTime<Utc>,
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Items across all pages
    pub total: usize,
    /// 1-based page number
    pub page: usize,
    /// Requested page size
    pub page_size: usize,
    /// Number of pages
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Cut one page out of an ordered list; `page` is 1-based and a
    /// `page_size` of zero is treated as one.
    #[must_use]
    pub fn paginate(all: Vec<T>, page: usize, page_size: usize) -> Self {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let total = all.len();
        let total_pages = total.div_ceil(page_size);
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// Stored plan next to the reference template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonView {
    /// Record id
    pub id: u64,
    /// Uploaded text
    pub user_yaml: String,
    /// Reference template skeleton
    pub template_yaml: String,
    /// Fresh comparison against the current template
    pub comparison: ComparisonResult,
    /// Same as `comparison.missing_fields`
    pub missing_fields: Vec<String>,
    /// Same as `comparison.type_errors`
    pub type_errors: Vec<TypeError>,
}
