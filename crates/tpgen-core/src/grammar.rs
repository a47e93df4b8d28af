//! Grammar validation
//!
//! First gate of the pipeline. Checks that the text is well-formed YAML and
//! that it follows the fixed test-plan schema: required top-level sections,
//! the `test_type` enumeration and the nesting of the hardware/environment
//! constraint blocks.
//!
//! Validation fails fast: checks run in a fixed order and only the first
//! violation is reported.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::{DocumentLimits, Node, NodeKind, NormalizeError, NormalizedDocument};

/// Top-level sections every test plan must declare
pub const REQUIRED_SECTIONS: &[&str] = &["metadata", "hardware", "environment", "test_suites"];

/// Accepted values for `metadata.test_type`
pub const VALID_TEST_TYPES: &[&str] = &[
    "smoke",
    "functional",
    "regression",
    "performance",
    "stress",
    "compatibility",
    "stability",
];

/// Stable identifier of a grammar failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrammarErrorCode {
    /// Text is empty or only comments
    EmptyDocument,
    /// Not well-formed YAML
    YamlSyntaxError,
    /// Root node is not a mapping
    InvalidRoot,
    /// A required key is absent or null
    MissingRequiredField,
    /// A key holds a value of the wrong shape
    WrongType,
    /// A value is outside its enumeration
    InvalidEnumValue,
    /// Structure exceeds parser bounds
    DocumentTooComplex,
}

impl GrammarErrorCode {
    /// The serialized form (`YAML_SYNTAX_ERROR`, ...)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyDocument => "EMPTY_DOCUMENT",
            Self::YamlSyntaxError => "YAML_SYNTAX_ERROR",
            Self::InvalidRoot => "INVALID_ROOT",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::WrongType => "WRONG_TYPE",
            Self::InvalidEnumValue => "INVALID_ENUM_VALUE",
            Self::DocumentTooComplex => "DOCUMENT_TOO_COMPLEX",
        }
    }
}

impl fmt::Display for GrammarErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first grammar violation found in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarError {
    /// Stable error code
    pub error_code: GrammarErrorCode,
    /// Human-readable description
    pub error_message: String,
    /// 1-indexed source line, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
}

impl GrammarError {
    /// Create a grammar error
    #[must_use]
    pub fn new(
        error_code: GrammarErrorCode,
        error_message: impl Into<String>,
        line_number: Option<usize>,
    ) -> Self {
        Self {
            error_code,
            error_message: error_message.into(),
            line_number,
        }
    }

    /// Display string shown to the uploader:
    /// `Line {n} [ERROR]\n{message}` or `[ERROR]\n{message}`
    #[must_use]
    pub fn display_message(&self) -> String {
        match self.line_number {
            Some(line) => format!("Line {line} [ERROR]\n{}", self.error_message),
            None => format!("[ERROR]\n{}", self.error_message),
        }
    }
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_number {
            Some(line) => write!(f, "{} at line {line}: {}", self.error_code, self.error_message),
            None => write!(f, "{}: {}", self.error_code, self.error_message),
        }
    }
}

impl std::error::Error for GrammarError {}

/// Outcome of [`validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the document passed
    pub valid: bool,
    /// First violation, when invalid
    #[serde(flatten)]
    pub error: Option<GrammarError>,
}

impl ValidationReport {
    /// Passing report
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    /// Failing report
    #[must_use]
    pub const fn failed(error: GrammarError) -> Self {
        Self {
            valid: false,
            error: Some(error),
        }
    }

    /// Line of the violation
    #[must_use]
    pub fn line_number(&self) -> Option<usize> {
        self.error.as_ref().and_then(|e| e.line_number)
    }

    /// Code of the violation
    #[must_use]
    pub fn error_code(&self) -> Option<GrammarErrorCode> {
        self.error.as_ref().map(|e| e.error_code)
    }
}

/// Validate raw test-plan text.
///
/// Side-effect free and deterministic.
#[must_use]
pub fn validate(text: &str) -> ValidationReport {
    match check(text) {
        Ok(_) => ValidationReport::passed(),
        Err(error) => {
            tracing::debug!(code = %error.error_code, line = ?error.line_number, "grammar check failed");
            ValidationReport::failed(error)
        }
    }
}

/// Validate and hand back the parsed document
///
/// # Errors
///
/// Returns the first grammar violation.
pub fn check(text: &str) -> Result<NormalizedDocument, GrammarError> {
    let unbounded = DocumentLimits {
        max_depth: usize::MAX,
        max_nodes: usize::MAX,
    };
    let doc = NormalizedDocument::parse_with_limits(text, unbounded).map_err(from_normalize)?;
    check_schema(&doc)?;
    Ok(doc)
}

fn from_normalize(err: NormalizeError) -> GrammarError {
    match err {
        NormalizeError::Empty => {
            GrammarError::new(GrammarErrorCode::EmptyDocument, "Document is empty", None)
        }
        NormalizeError::Syntax { message, line } => GrammarError::new(
            GrammarErrorCode::YamlSyntaxError,
            format!("YAML syntax error: {message}"),
            line,
        ),
        NormalizeError::UnsupportedKey { .. } => {
            GrammarError::new(GrammarErrorCode::WrongType, err.to_string(), None)
        }
        NormalizeError::TooDeep { .. } | NormalizeError::TooLarge { .. } => {
            GrammarError::new(GrammarErrorCode::DocumentTooComplex, err.to_string(), None)
        }
    }
}

fn check_schema(doc: &NormalizedDocument) -> Result<(), GrammarError> {
    let root = doc.root();
    if root.as_map().is_none() {
        return Err(GrammarError::new(
            GrammarErrorCode::InvalidRoot,
            format!("Document root must be a map, found {}", root.kind()),
            Some(1),
        ));
    }

    for section in REQUIRED_SECTIONS {
        if doc.get_present(section).is_none() {
            return Err(GrammarError::new(
                GrammarErrorCode::MissingRequiredField,
                format!("Missing required field '{section}'"),
                doc.line_of(section),
            ));
        }
    }

    expect_kind(doc, "metadata", &[NodeKind::Map])?;
    expect_kind(doc, "hardware", &[NodeKind::Map])?;
    expect_kind(doc, "environment", &[NodeKind::Map])?;
    expect_kind(doc, "test_suites", &[NodeKind::List])?;
    expect_kind(doc, "firmware", &[NodeKind::Map])?;

    check_metadata(doc)?;
    check_hardware(doc)?;
    check_environment(doc)?;
    check_test_suites(doc)
}

fn check_metadata(doc: &NormalizedDocument) -> Result<(), GrammarError> {
    let path = "metadata.test_type";
    let Some(node) = doc.get_present(path) else {
        return Ok(());
    };
    let Some(test_type) = node.as_str() else {
        return Err(wrong_type(doc, path, "string", node));
    };
    if !VALID_TEST_TYPES.contains(&test_type) {
        return Err(GrammarError::new(
            GrammarErrorCode::InvalidEnumValue,
            format!(
                "Invalid test_type '{test_type}'. Valid: {}",
                VALID_TEST_TYPES.join(", ")
            ),
            doc.nearest_line(path),
        ));
    }
    Ok(())
}

fn check_hardware(doc: &NormalizedDocument) -> Result<(), GrammarError> {
    for path in ["hardware.cpu", "hardware.gpu"] {
        if let Some(node) = doc.get_present(path) {
            if !node.is_scalar() {
                return Err(wrong_type(doc, path, "string", node));
            }
        }
    }

    let path = "hardware.machines";
    if let Some(node) = doc.get_present(path) {
        let Some(machines) = node.as_list() else {
            return Err(wrong_type(doc, path, "list", node));
        };
        for (i, machine) in machines.iter().enumerate() {
            if machine.as_map().is_none() {
                return Err(wrong_type(doc, &format!("{path}[{i}]"), "map", machine));
            }
        }
    }
    Ok(())
}

fn check_environment(doc: &NormalizedDocument) -> Result<(), GrammarError> {
    for path in ["environment.os", "environment.deployment"] {
        let Some(node) = doc.get_present(path) else {
            continue;
        };
        match node {
            Node::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_scalar() || item.is_null() {
                        return Err(wrong_type(doc, &format!("{path}[{i}]"), "string", item));
                    }
                }
            }
            other if other.is_scalar() => {}
            other => return Err(wrong_type(doc, path, "string or list of strings", other)),
        }
    }

    let path = "environment.kernel";
    if let Some(node) = doc.get_present(path) {
        match node {
            Node::Map(entries) => {
                for (key, value) in entries {
                    if !value.is_scalar() {
                        return Err(wrong_type(doc, &format!("{path}.{key}"), "string", value));
                    }
                }
            }
            other if other.is_scalar() => {}
            other => return Err(wrong_type(doc, path, "string or map", other)),
        }
    }
    Ok(())
}

fn check_test_suites(doc: &NormalizedDocument) -> Result<(), GrammarError> {
    let Some(suites) = doc.get("test_suites").and_then(Node::as_list) else {
        return Ok(());
    };
    for (i, suite) in suites.iter().enumerate() {
        let path = format!("test_suites[{i}]");
        if suite.as_map().is_none() {
            return Err(wrong_type(doc, &path, "map", suite));
        }
        let name_path = format!("{path}.name");
        match suite.get("name") {
            None | Some(Node::Null) => {
                return Err(GrammarError::new(
                    GrammarErrorCode::MissingRequiredField,
                    format!("Missing required field '{name_path}'"),
                    doc.nearest_line(&name_path),
                ));
            }
            Some(Node::String(_)) => {}
            Some(other) => return Err(wrong_type(doc, &name_path, "string", other)),
        }
    }
    Ok(())
}

fn expect_kind(
    doc: &NormalizedDocument,
    path: &str,
    kinds: &[NodeKind],
) -> Result<(), GrammarError> {
    match doc.get_present(path) {
        Some(node) if !kinds.contains(&node.kind()) => {
            let expected: Vec<&str> = kinds.iter().map(NodeKind::as_str).collect();
            Err(wrong_type(doc, path, &expected.join(" or "), node))
        }
        _ => Ok(()),
    }
}

fn wrong_type(doc: &NormalizedDocument, path: &str, expected: &str, found: &Node) -> GrammarError {
    GrammarError::new(
        GrammarErrorCode::WrongType,
        format!("Field '{path}' must be a {expected}, found {}", found.kind()),
        doc.nearest_line(path),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"metadata:
  plan_name: GPU smoke
  test_type: smoke
hardware:
  cpu: Intel Xeon 8380
  gpu: NVIDIA A100
environment:
  os: ubuntu-22.04
  kernel:
    type: default
    version: 6.1.0
test_suites:
  - name: boot
    order: 1
"#;

    fn error_of(text: &str) -> GrammarError {
        validate(text).error.expect("expected a grammar error")
    }

    #[test]
    fn test_valid_document() {
        let report = validate(VALID);
        assert!(report.valid);
        assert!(report.error.is_none());
    }

    #[test]
    fn test_check_returns_document() {
        let doc = check(VALID).expect("valid");
        assert_eq!(doc.text("hardware.cpu").as_deref(), Some("Intel Xeon 8380"));
    }

    #[test]
    fn test_empty_document() {
        let err = error_of("\n\n");
        assert_eq!(err.error_code, GrammarErrorCode::EmptyDocument);
        assert_eq!(err.line_number, None);
    }

    #[test]
    fn test_indentation_error_reports_line() {
        let text = VALID.replace("    version: 6.1.0\n", "    version: 6.1.0\n     deployment: bare-metal\n");
        let report = validate(&text);
        assert!(!report.valid);
        assert_eq!(report.line_number(), Some(12));
        assert_eq!(report.error_code(), Some(GrammarErrorCode::YamlSyntaxError));
    }

    #[test]
    fn test_root_must_be_map() {
        let err = error_of("- a\n- b\n");
        assert_eq!(err.error_code, GrammarErrorCode::InvalidRoot);
        assert_eq!(err.line_number, Some(1));
    }

    #[test]
    fn test_missing_section() {
        let text = VALID.replace("hardware:\n  cpu: Intel Xeon 8380\n  gpu: NVIDIA A100\n", "");
        let err = error_of(&text);
        assert_eq!(err.error_code, GrammarErrorCode::MissingRequiredField);
        assert!(err.error_message.contains("'hardware'"));
        assert_eq!(err.line_number, None);
    }

    #[test]
    fn test_null_section_counts_as_missing() {
        let text = VALID.replace("test_suites:\n  - name: boot\n    order: 1\n", "test_suites:\n");
        let err = error_of(&text);
        assert_eq!(err.error_code, GrammarErrorCode::MissingRequiredField);
        assert_eq!(err.line_number, Some(12));
    }

    #[test]
    fn test_first_missing_section_wins() {
        let err = error_of("environment: {}\n");
        assert!(err.error_message.contains("'metadata'"));
    }

    #[test]
    fn test_section_wrong_type() {
        let text = VALID.replace("hardware:\n  cpu: Intel Xeon 8380\n  gpu: NVIDIA A100\n", "hardware: big\n");
        let err = error_of(&text);
        assert_eq!(err.error_code, GrammarErrorCode::WrongType);
        assert_eq!(err.line_number, Some(4));
        assert!(err.error_message.contains("must be a map, found string"));
    }

    #[test]
    fn test_test_suites_must_be_list() {
        let text = VALID.replace("  - name: boot\n    order: 1\n", "  boot: 1\n");
        let err = error_of(&text);
        assert_eq!(err.error_code, GrammarErrorCode::WrongType);
        assert!(err.error_message.contains("'test_suites' must be a list"));
    }

    #[test]
    fn test_invalid_test_type() {
        let text = VALID.replace("test_type: smoke", "test_type: exploratory");
        let err = error_of(&text);
        assert_eq!(err.error_code, GrammarErrorCode::InvalidEnumValue);
        assert_eq!(err.line_number, Some(3));
        assert!(err.error_message.contains("exploratory"));
    }

    #[test]
    fn test_test_type_must_be_string() {
        let text = VALID.replace("test_type: smoke", "test_type: [smoke]");
        assert_eq!(error_of(&text).error_code, GrammarErrorCode::WrongType);
    }

    #[test]
    fn test_test_type_is_optional() {
        let text = VALID.replace("  test_type: smoke\n", "");
        assert!(validate(&text).valid);
    }

    #[test]
    fn test_cpu_must_be_scalar() {
        let text = VALID.replace("cpu: Intel Xeon 8380", "cpu: {model: x}");
        let err = error_of(&text);
        assert_eq!(err.error_code, GrammarErrorCode::WrongType);
        assert_eq!(err.line_number, Some(5));
    }

    #[test]
    fn test_machines_must_be_list_of_maps() {
        let text = VALID.replace("  gpu: NVIDIA A100\n", "  gpu: NVIDIA A100\n  machines:\n    - node-01\n");
        let err = error_of(&text);
        assert_eq!(err.error_code, GrammarErrorCode::WrongType);
        assert!(err.error_message.contains("hardware.machines[0]"));
        assert_eq!(err.line_number, Some(8));
    }

    #[test]
    fn test_os_accepts_list() {
        let text = VALID.replace("os: ubuntu-22.04", "os: [ubuntu-22.04, rhel-9]");
        assert!(validate(&text).valid);
    }

    #[test]
    fn test_os_rejects_map() {
        let text = VALID.replace("os: ubuntu-22.04", "os: {name: ubuntu}");
        assert_eq!(error_of(&text).error_code, GrammarErrorCode::WrongType);
    }

    #[test]
    fn test_kernel_map_values_must_be_scalars() {
        let text = VALID.replace("    version: 6.1.0\n", "    version:\n      - 6.1.0\n");
        let err = error_of(&text);
        assert_eq!(err.error_code, GrammarErrorCode::WrongType);
        assert!(err.error_message.contains("environment.kernel.version"));
    }

    #[test]
    fn test_kernel_accepts_string() {
        let text = VALID.replace(
            "  kernel:\n    type: default\n    version: 6.1.0\n",
            "  kernel: 6.1.0\n",
        );
        assert!(validate(&text).valid);
    }

    #[test]
    fn test_suite_requires_name() {
        let text = VALID.replace("  - name: boot\n    order: 1\n", "  - order: 1\n");
        let err = error_of(&text);
        assert_eq!(err.error_code, GrammarErrorCode::MissingRequiredField);
        assert!(err.error_message.contains("test_suites[0].name"));
        assert_eq!(err.line_number, Some(13));
    }

    #[test]
    fn test_display_message_with_line() {
        let err = GrammarError::new(GrammarErrorCode::WrongType, "bad", Some(7));
        assert_eq!(err.display_message(), "Line 7 [ERROR]\nbad");
    }

    #[test]
    fn test_display_message_without_line() {
        let err = GrammarError::new(GrammarErrorCode::MissingRequiredField, "missing", None);
        assert_eq!(err.display_message(), "[ERROR]\nmissing");
    }

    #[test]
    fn test_report_json_shape() {
        let report = validate("metadata: [");
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["valid"], false);
        assert_eq!(json["error_code"], "YAML_SYNTAX_ERROR");
        assert!(json["error_message"].as_str().is_some());
    }

    #[test]
    fn test_passed_report_json_shape() {
        let json = serde_json::to_value(validate(VALID)).expect("serialize");
        assert_eq!(json, serde_json::json!({ "valid": true }));
    }

    #[test]
    fn test_validate_is_deterministic() {
        let text = VALID.replace("test_type: smoke", "test_type: nope");
        assert_eq!(validate(&text), validate(&text));
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&GrammarErrorCode::MissingRequiredField).expect("json");
        assert_eq!(json, "\"MISSING_REQUIRED_FIELD\"");
        assert_eq!(GrammarErrorCode::WrongType.as_str(), "WRONG_TYPE");
    }
}
