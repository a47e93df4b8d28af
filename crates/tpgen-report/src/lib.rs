//! TPGen Report Generator
//!
//! Renders analyses, template comparisons and upload listings as Markdown,
//! JSON or YAML.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::format_push_string)]
#![allow(clippy::too_many_lines)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod format;
pub mod markdown;

pub use error::{Error, Result};
pub use format::{OutputFormat, render_outcome, to_data_string};
pub use markdown::{
    analysis_markdown, comparison_markdown, grammar_failure_markdown, parse_failure_markdown,
    record_list_markdown,
};
