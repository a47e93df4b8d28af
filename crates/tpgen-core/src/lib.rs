//! TPGen Core
//!
//! Validation and analysis engine for hardware test-plan YAML documents.
//!
//! A plan goes through two gates. [`grammar::validate`] is a fail-fast check
//! reporting the first grammar or schema violation with its source line.
//! [`Analyzer::analyze`] then re-parses tolerantly, compares the plan with
//! the [`ReferenceTemplate`], partitions the [`MachineCatalog`] into
//! compatible and incompatible machines, and aggregates warnings and
//! validation errors into an [`AnalysisResult`].
//!
//! Template and catalog are read-only configuration handed to the analyzer;
//! every operation here is pure and deterministic.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::redundant_closure_for_method_calls))]

pub mod analyzer;
pub mod compatibility;
pub mod document;
pub mod error;
pub mod grammar;
pub mod machine;
pub mod proptest_impl;
pub mod result;
pub mod template;

pub use analyzer::{AnalysisOutcome, Analyzer, DEPRECATED_FIELDS};
pub use compatibility::{
    CompatibilityResult, Constraint, ConstraintFailure, ConstraintKind, IncompatibleMachine,
    KernelVersion, PlanConstraints, evaluate,
};
pub use document::{DocumentLimits, Node, NodeKind, NormalizeError, NormalizedDocument};
pub use error::{Error, Result};
pub use grammar::{GrammarError, GrammarErrorCode, ValidationReport, validate};
pub use machine::{MachineCatalog, MachineProfile};
pub use result::{
    AnalysisResult, BasicInfo, Finding, FindingCode, Severity, ValidationStatus, aggregate,
};
pub use template::{ComparisonResult, FieldType, ReferenceTemplate, TemplateField, TypeError, compare};
