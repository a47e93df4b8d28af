//! Structural analysis
//!
//! [`Analyzer::analyze`] re-parses a grammar-checked plan tolerantly and runs
//! the template comparison, the compatibility evaluation and the plan lint
//! rules. Any parse anomaly ends the run with `success = false`; nothing
//! here panics or returns an error.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::compatibility::PlanConstraints;
use crate::document::{
    DocumentLimits, Node, NormalizeError, NormalizedDocument, generalize_path, join_key,
};
use crate::error::Result;
use crate::machine::MachineCatalog;
use crate::result::{AnalysisResult, BasicInfo, Finding, FindingCode, aggregate};
use crate::template::{ComparisonResult, ReferenceTemplate, compare};

/// Renamed keys and their replacements
pub const DEPRECATED_FIELDS: &[(&str, &str)] = &[
    ("metadata.name", "metadata.plan_name"),
    ("metadata.type", "metadata.test_type"),
    ("hardware.cpu_model", "hardware.cpu"),
    ("hardware.gpu_model", "hardware.gpu"),
    ("environment.os_version", "environment.os"),
    ("environment.kernel_version", "environment.kernel"),
];

/// Outcome of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    /// False when the tolerant parse failed
    pub success: bool,
    /// Parse failure messages; empty on success
    pub parse_errors: Vec<String>,
    /// Analysis, present on success
    #[serde(flatten)]
    pub analysis: Option<AnalysisResult>,
    /// Reference template skeleton for side-by-side display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<serde_yaml::Value>,
}

impl AnalysisOutcome {
    fn parse_failure(messages: Vec<String>) -> Self {
        Self {
            success: false,
            parse_errors: messages,
            analysis: None,
            template: None,
        }
    }
}

/// Analyzer bound to one template and one catalog
#[derive(Debug, Clone)]
pub struct Analyzer {
    template: Arc<ReferenceTemplate>,
    catalog: Arc<MachineCatalog>,
    limits: DocumentLimits,
}

impl Analyzer {
    /// Create an analyzer with default structural limits
    #[must_use]
    pub fn new(template: Arc<ReferenceTemplate>, catalog: Arc<MachineCatalog>) -> Self {
        Self {
            template,
            catalog,
            limits: DocumentLimits::default(),
        }
    }

    /// Analyzer over the built-in template and catalog
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded data is malformed.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(
            Arc::new(ReferenceTemplate::builtin()?),
            Arc::new(MachineCatalog::builtin()?),
        ))
    }

    /// Override the structural limits
    #[must_use]
    pub const fn with_limits(mut self, limits: DocumentLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Reference template in use
    #[must_use]
    pub fn template(&self) -> &ReferenceTemplate {
        &self.template
    }

    /// Machine catalog in use
    #[must_use]
    pub fn catalog(&self) -> &MachineCatalog {
        &self.catalog
    }

    /// Structural limits in use
    #[must_use]
    pub const fn limits(&self) -> DocumentLimits {
        self.limits
    }

    /// Analyze raw plan text
    #[must_use]
    pub fn analyze(&self, text: &str) -> AnalysisOutcome {
        let document = match NormalizedDocument::parse_with_limits(text, self.limits) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(error = %err, "tolerant parse failed");
                return AnalysisOutcome::parse_failure(vec![parse_message(&err)]);
            }
        };
        if document.root().as_map().is_none() {
            let message = format!("Document root must be a map, found {}", document.root().kind());
            tracing::warn!(%message, "tolerant parse failed");
            return AnalysisOutcome::parse_failure(vec![message]);
        }

        let analysis = self.analyze_document(&document);
        AnalysisOutcome {
            success: true,
            parse_errors: Vec::new(),
            analysis: Some(analysis),
            template: Some(self.template.skeleton()),
        }
    }

    /// Analyze an already parsed document
    #[must_use]
    pub fn analyze_document(&self, document: &NormalizedDocument) -> AnalysisResult {
        let basic_info = BasicInfo::from_document(document);
        let comparison = compare(document, &self.template);
        let (constraints, kernel_findings) = PlanConstraints::from_document(document);
        let compatibility = constraints.evaluate(&self.catalog);

        let mut findings = Vec::new();
        self.field_findings(document, document.root(), "", &mut findings);
        comparison_findings(document, &comparison, &mut findings);
        suite_findings(document, &mut findings);
        self.machine_findings(document, &mut findings);
        firmware_findings(document, &mut findings);
        findings.extend(kernel_findings);

        let result = aggregate(basic_info, comparison, compatibility, findings, &self.template);
        tracing::info!(
            plan = result.basic_info.plan_name.as_deref().unwrap_or("<unnamed>"),
            status = %result.validation_status,
            warnings = result.warning_count,
            errors = result.error_count,
            compatible = result.compatible_count,
            incompatible = result.incompatible_count,
            "analysis complete"
        );
        result
    }

    fn field_findings(
        &self,
        document: &NormalizedDocument,
        node: &Node,
        path: &str,
        out: &mut Vec<Finding>,
    ) {
        match node {
            Node::Map(entries) => {
                for (key, child) in entries {
                    let child_path = join_key(path, key);
                    let generic = generalize_path(&child_path);
                    if let Some((_, replacement)) =
                        DEPRECATED_FIELDS.iter().find(|(old, _)| *old == generic)
                    {
                        out.push(
                            Finding::new(
                                FindingCode::DeprecatedField,
                                &child_path,
                                format!("Field '{child_path}' is deprecated; use '{replacement}'"),
                            )
                            .at_line(document.line_of(&child_path)),
                        );
                    } else if !self.template.knows(&child_path) {
                        out.push(
                            Finding::new(
                                FindingCode::UnknownField,
                                &child_path,
                                format!("Unknown field '{child_path}'"),
                            )
                            .at_line(document.line_of(&child_path)),
                        );
                    } else {
                        self.field_findings(document, child, &child_path, out);
                    }
                }
            }
            Node::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.field_findings(document, item, &format!("{path}[{i}]"), out);
                }
            }
            _ => {}
        }
    }

    fn machine_findings(&self, document: &NormalizedDocument, out: &mut Vec<Finding>) {
        for resolved in document.resolve("hardware.machines[].name") {
            let Some(name) = resolved.node.and_then(Node::scalar_text) else {
                continue;
            };
            if self.catalog.find_by_name(&name).is_none() {
                out.push(
                    Finding::new(
                        FindingCode::UnknownMachine,
                        &resolved.path,
                        format!("Machine '{name}' is not in the catalog"),
                    )
                    .at_line(document.line_of(&resolved.path)),
                );
            }
        }
    }
}

fn parse_message(err: &NormalizeError) -> String {
    match err {
        NormalizeError::Syntax {
            message,
            line: Some(line),
        } => format!("Line {line}: {message}"),
        other => other.to_string(),
    }
}

fn comparison_findings(
    document: &NormalizedDocument,
    comparison: &ComparisonResult,
    out: &mut Vec<Finding>,
) {
    for path in &comparison.missing_fields {
        out.push(
            Finding::new(
                FindingCode::MissingTemplateField,
                path,
                format!("Missing template field '{path}'"),
            )
            .at_line(document.nearest_line(path)),
        );
    }
    for error in &comparison.type_errors {
        out.push(
            Finding::new(
                FindingCode::TypeMismatch,
                &error.field_path,
                format!(
                    "Field '{}' must be {}, found {}",
                    error.field_path, error.expected_type, error.actual_type
                ),
            )
            .at_line(document.line_of(&error.field_path)),
        );
    }
}

fn suite_findings(document: &NormalizedDocument, out: &mut Vec<Finding>) {
    let Some(suites) = document.get("test_suites").and_then(Node::as_list) else {
        return;
    };
    if suites.is_empty() {
        out.push(
            Finding::new(
                FindingCode::EmptyTestSuites,
                "test_suites",
                "Plan declares no test suites",
            )
            .at_line(document.line_of("test_suites")),
        );
        return;
    }

    let mut orders: HashMap<String, usize> = HashMap::new();
    let mut names: HashMap<String, usize> = HashMap::new();
    for (i, suite) in suites.iter().enumerate() {
        if let Some(order) = suite.get("order").and_then(Node::scalar_text) {
            if let Some(first) = orders.get(&order) {
                let path = format!("test_suites[{i}].order");
                out.push(
                    Finding::new(
                        FindingCode::DuplicateSuiteOrder,
                        &path,
                        format!("Suite order {order} is already used by test_suites[{first}]"),
                    )
                    .at_line(document.line_of(&path)),
                );
            } else {
                orders.insert(order, i);
            }
        }
        if let Some(name) = suite.get("name").and_then(Node::scalar_text) {
            let key = name.trim().to_string();
            if let Some(first) = names.get(&key) {
                let path = format!("test_suites[{i}].name");
                out.push(
                    Finding::new(
                        FindingCode::DuplicateSuiteName,
                        &path,
                        format!("Suite name '{key}' is already used by test_suites[{first}]"),
                    )
                    .at_line(document.line_of(&path)),
                );
            } else {
                names.insert(key, i);
            }
        }
    }
}

fn firmware_findings(document: &NormalizedDocument, out: &mut Vec<Finding>) {
    let comparison = matches!(
        document.get("firmware.comparison"),
        Some(Node::Boolean(true))
    );
    if comparison && document.get_present("firmware.gpu_version").is_none() {
        out.push(
            Finding::new(
                FindingCode::MissingFirmwareVersion,
                "firmware.gpu_version",
                "Firmware comparison requires 'firmware.gpu_version'",
            )
            .at_line(document.line_of("firmware.comparison")),
        );
    }
}
