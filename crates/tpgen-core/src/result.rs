//! Analysis results
//!
//! Findings produced by the analyzer, the basic-info summary and the
//! aggregated [`AnalysisResult`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::compatibility::{CompatibilityResult, IncompatibleMachine};
use crate::document::{Node, NormalizedDocument};
use crate::machine::MachineProfile;
use crate::template::{ComparisonResult, ReferenceTemplate};

/// Severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Soft finding; never affects validity
    Warning,
    /// Validation error; the plan is not valid
    Error,
}

/// What a finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCode {
    /// Key the reference template does not know
    UnknownField,
    /// Key that has been renamed
    DeprecatedField,
    /// Required template field absent from the plan
    MissingTemplateField,
    /// `test_suites` has no entries
    EmptyTestSuites,
    /// Two suites share an `order`
    DuplicateSuiteOrder,
    /// `hardware.machines` names a machine outside the catalog
    UnknownMachine,
    /// Field present with the wrong type
    TypeMismatch,
    /// Kernel version in the plan does not parse
    InvalidKernelVersion,
    /// Kernel bounds contradict each other or the pinned version
    ContradictoryKernelBounds,
    /// Two suites share a name
    DuplicateSuiteName,
    /// Firmware comparison requested without a firmware version
    MissingFirmwareVersion,
}

impl FindingCode {
    /// Severity this code is reported with
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::UnknownField
            | Self::DeprecatedField
            | Self::MissingTemplateField
            | Self::EmptyTestSuites
            | Self::DuplicateSuiteOrder
            | Self::UnknownMachine => Severity::Warning,
            Self::TypeMismatch
            | Self::InvalidKernelVersion
            | Self::ContradictoryKernelBounds
            | Self::DuplicateSuiteName
            | Self::MissingFirmwareVersion => Severity::Error,
        }
    }

    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownField => "UNKNOWN_FIELD",
            Self::DeprecatedField => "DEPRECATED_FIELD",
            Self::MissingTemplateField => "MISSING_TEMPLATE_FIELD",
            Self::EmptyTestSuites => "EMPTY_TEST_SUITES",
            Self::DuplicateSuiteOrder => "DUPLICATE_SUITE_ORDER",
            Self::UnknownMachine => "UNKNOWN_MACHINE",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::InvalidKernelVersion => "INVALID_KERNEL_VERSION",
            Self::ContradictoryKernelBounds => "CONTRADICTORY_KERNEL_BOUNDS",
            Self::DuplicateSuiteName => "DUPLICATE_SUITE_NAME",
            Self::MissingFirmwareVersion => "MISSING_FIRMWARE_VERSION",
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A warning or validation error tied to a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Finding code
    pub code: FindingCode,
    /// Field the finding refers to
    pub field_path: String,
    /// Source line, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    /// Human-readable message
    pub message: String,
}

impl Finding {
    /// Create a finding without a line
    #[must_use]
    pub fn new(code: FindingCode, field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            field_path: field_path.into(),
            line_number: None,
            message: message.into(),
        }
    }

    /// Attach a source line
    #[must_use]
    pub const fn at_line(mut self, line: Option<usize>) -> Self {
        self.line_number = line;
        self
    }

    /// Severity of this finding
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_number {
            Some(line) => write!(f, "Line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Summary fields extracted from fixed paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    /// `metadata.plan_name`
    pub plan_name: Option<String>,
    /// `metadata.test_type`
    pub test_type: Option<String>,
    /// `hardware.cpu`
    pub cpu: Option<String>,
    /// `hardware.gpu`
    pub gpu: Option<String>,
    /// `environment.os`; lists are joined with ", "
    pub os: Option<String>,
    /// `environment.kernel.version` or a plain `environment.kernel`
    pub kernel: Option<String>,
}

impl BasicInfo {
    /// Extract the summary from a document. Absent fields stay `None`.
    #[must_use]
    pub fn from_document(document: &NormalizedDocument) -> Self {
        let os = match document.get("environment.os") {
            Some(Node::List(items)) => {
                let joined: Vec<String> = (0..items.len())
                    .filter_map(|i| document.text(&format!("environment.os[{i}]")))
                    .collect();
                (!joined.is_empty()).then(|| joined.join(", "))
            }
            Some(_) => document.text("environment.os"),
            None => None,
        };
        let kernel = document
            .text("environment.kernel.version")
            .or_else(|| document.text("environment.kernel"));
        Self {
            plan_name: document.text("metadata.plan_name"),
            test_type: document.text("metadata.test_type"),
            cpu: document.text("hardware.cpu"),
            gpu: document.text("hardware.gpu"),
            os,
            kernel,
        }
    }
}

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// No findings
    Valid,
    /// Warnings only
    Warning,
    /// At least one validation error
    Error,
}

impl ValidationStatus {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about an analyzed plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// True when there are no validation errors
    pub is_valid: bool,
    /// Overall verdict
    pub validation_status: ValidationStatus,
    /// Machines satisfying every constraint
    pub compatible_count: usize,
    /// Machines failing at least one constraint
    pub incompatible_count: usize,
    /// Number of warnings
    pub warning_count: usize,
    /// Number of validation errors
    pub error_count: usize,
    /// Summary fields
    pub basic_info: BasicInfo,
    /// Template comparison
    pub comparison: ComparisonResult,
    /// Catalog partition
    #[serde(flatten)]
    pub compatibility: CompatibilityResult,
    /// Soft findings
    pub warnings: Vec<Finding>,
    /// Validation errors
    #[serde(rename = "errors")]
    pub validation_errors: Vec<Finding>,
    /// Template the plan was compared against
    pub template_name: String,
    /// Template version
    pub template_version: String,
}

impl AnalysisResult {
    /// Compatible machines, catalog order
    #[must_use]
    pub fn compatible_machines(&self) -> &[MachineProfile] {
        &self.compatibility.compatible_machines
    }

    /// Incompatible machines with their failures, catalog order
    #[must_use]
    pub fn incompatible_machines(&self) -> &[IncompatibleMachine] {
        &self.compatibility.incompatible_machines
    }
}

/// Merge the pipeline outputs into one result.
///
/// Findings are split by severity, keeping their order.
#[must_use]
pub fn aggregate(
    basic_info: BasicInfo,
    comparison: ComparisonResult,
    compatibility: CompatibilityResult,
    findings: Vec<Finding>,
    template: &ReferenceTemplate,
) -> AnalysisResult {
    let (validation_errors, warnings): (Vec<_>, Vec<_>) = findings
        .into_iter()
        .partition(|f| f.severity() == Severity::Error);

    let validation_status = if !validation_errors.is_empty() {
        ValidationStatus::Error
    } else if !warnings.is_empty() {
        ValidationStatus::Warning
    } else {
        ValidationStatus::Valid
    };

    AnalysisResult {
        is_valid: validation_errors.is_empty(),
        validation_status,
        compatible_count: compatibility.compatible_machines.len(),
        incompatible_count: compatibility.incompatible_machines.len(),
        warning_count: warnings.len(),
        error_count: validation_errors.len(),
        basic_info,
        comparison,
        compatibility,
        warnings,
        validation_errors,
        template_name: template.name.clone(),
        template_version: template.version.clone(),
    }
}
