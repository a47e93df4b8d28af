//! TPGen Store
//!
//! Upload gate and file-backed record store. An upload passes the
//! [`UploadPolicy`] (extension, size, encoding), the grammar check and the
//! tolerant analysis before one JSON record is written. Records can be
//! listed, fetched, deleted and re-compared against the current template.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod policy;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use policy::{DEFAULT_MAX_UPLOAD_BYTES, UploadPolicy};
pub use record::{ComparisonView, Page, RecordSummary, UploadRecord, content_digest};
pub use store::UploadStore;
