//! tpgen
//!
//! Facade over the workspace crates: the analysis engine, the upload record
//! store and the report renderers.

#![forbid(unsafe_code)]

pub use tpgen_core as core;
pub use tpgen_report as report;
pub use tpgen_store as store;
