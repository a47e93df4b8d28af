//! Reference template and template comparison
//!
//! The reference template is configuration data: a versioned list of field
//! declarations (path, expected type, required flag). It is loaded once per
//! process and never mutated. [`compare`] diffs a normalized document
//! against it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::document::{Node, NormalizedDocument, Segment, generalize_path, parse_path};
use crate::error::{Error, Result};

const BUILTIN_TEMPLATE: &str = include_str!("../data/smoke_template.yaml");

/// Type a template field expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// String scalar
    String,
    /// Integral number
    Integer,
    /// Integer or float
    Number,
    /// Boolean
    Boolean,
    /// Sequence
    List,
    /// Mapping
    Map,
    /// String from `allowed_values`
    Enum,
}

impl FieldType {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Map => "map",
            Self::Enum => "enum",
        }
    }

    fn accepts(self, node: &Node, allowed_values: &[String]) -> bool {
        match (self, node) {
            (Self::String, Node::String(_))
            | (Self::Integer, Node::Integer(_))
            | (Self::Number, Node::Integer(_) | Node::Float(_))
            | (Self::Boolean, Node::Boolean(_))
            | (Self::List, Node::List(_))
            | (Self::Map, Node::Map(_)) => true,
            (Self::Enum, Node::String(s)) => allowed_values.iter().any(|v| v == s),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept `type: string` as well as `type: [string, list]`.
fn deserialize_one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<FieldType>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(FieldType),
        Many(Vec<FieldType>),
    }
    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(t) => Ok(vec![t]),
        OneOrMany::Many(ts) => Ok(ts),
    }
}

fn serialize_one_or_many<S>(types: &[FieldType], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match types {
        [single] => single.serialize(serializer),
        many => many.serialize(serializer),
    }
}

/// One field declaration of the reference template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    /// Dotted path; `[]` addresses every list element
    pub path: String,
    /// Accepted types (any of)
    #[serde(
        rename = "type",
        deserialize_with = "deserialize_one_or_many",
        serialize_with = "serialize_one_or_many"
    )]
    pub types: Vec<FieldType>,
    /// Absence produces a missing-field entry
    #[serde(default)]
    pub required: bool,
    /// Accepted values for `enum`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    /// Value shown in the template skeleton
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TemplateField {
    /// Whether a node has one of the accepted types
    #[must_use]
    pub fn accepts(&self, node: &Node) -> bool {
        self.types.iter().any(|t| t.accepts(node, &self.allowed_values))
    }

    /// Expected type as shown in type errors (`string`, `string|list`,
    /// `enum(smoke|stress)`)
    #[must_use]
    pub fn expected_type(&self) -> String {
        self.types
            .iter()
            .map(|t| match t {
                FieldType::Enum => format!("enum({})", self.allowed_values.join("|")),
                other => other.as_str().to_string(),
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    fn placeholder(&self) -> serde_yaml::Value {
        use serde_yaml::Value;
        if let Some(default) = &self.default {
            return default.clone();
        }
        match self.types.first() {
            Some(FieldType::Integer | FieldType::Number) => Value::Number(0.into()),
            Some(FieldType::Boolean) => Value::Bool(false),
            Some(FieldType::List) => Value::Sequence(Vec::new()),
            Some(FieldType::Map) => Value::Mapping(serde_yaml::Mapping::new()),
            Some(FieldType::Enum) => self
                .allowed_values
                .first()
                .map_or(Value::Null, |v| Value::String(v.clone())),
            Some(FieldType::String) | None => Value::String("<string>".to_string()),
        }
    }
}

/// Versioned reference template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTemplate {
    /// Template name (e.g. "Smoke Template")
    pub name: String,
    /// Template version
    pub version: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field declarations, in comparison order
    pub fields: Vec<TemplateField>,
}

impl ReferenceTemplate {
    /// The template shipped with the crate
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded template is malformed.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_TEMPLATE)
    }

    /// Load a template from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a template
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or the declarations are
    /// inconsistent (duplicate paths, enums without values, concrete
    /// indices in paths).
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let template: Self = serde_yaml::from_str(yaml)?;
        template.check()?;
        Ok(template)
    }

    /// Serialize the template definition
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(Error::from)
    }

    fn check(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(Error::InvalidTemplate(format!(
                "template '{}' declares no fields",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.path.trim().is_empty() {
                return Err(Error::InvalidTemplate("empty field path".to_string()));
            }
            if parse_path(&field.path)
                .iter()
                .any(|s| matches!(s, Segment::Index(_)))
            {
                return Err(Error::InvalidTemplate(format!(
                    "field '{}' uses a concrete index; use [] instead",
                    field.path
                )));
            }
            if field.types.is_empty() {
                return Err(Error::InvalidTemplate(format!(
                    "field '{}' declares no type",
                    field.path
                )));
            }
            if field.types.contains(&FieldType::Enum) && field.allowed_values.is_empty() {
                return Err(Error::InvalidTemplate(format!(
                    "enum field '{}' declares no allowed_values",
                    field.path
                )));
            }
            if !seen.insert(field.path.as_str()) {
                return Err(Error::InvalidTemplate(format!(
                    "duplicate field '{}'",
                    field.path
                )));
            }
        }
        Ok(())
    }

    /// Look up a field declaration
    #[must_use]
    pub fn field(&self, path: &str) -> Option<&TemplateField> {
        self.fields.iter().find(|f| f.path == path)
    }

    /// Required fields, in declaration order
    pub fn required_fields(&self) -> impl Iterator<Item = &TemplateField> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Whether any declared field lies below `path`
    #[must_use]
    pub fn has_descendants(&self, path: &str) -> bool {
        let path = generalize_path(path);
        self.fields.iter().any(|f| is_descendant(&f.path, &path))
    }

    /// Whether the template accounts for a document path.
    ///
    /// A path is known when it is declared, when it is an ancestor of a
    /// declared field, or when it sits below a declared field that has no
    /// declared children of its own.
    #[must_use]
    pub fn knows(&self, path: &str) -> bool {
        let path = generalize_path(path);
        self.fields
            .iter()
            .any(|f| f.path == path || is_descendant(&f.path, &path))
            || self
                .fields
                .iter()
                .any(|f| is_descendant(&path, &f.path) && !self.has_descendants(&f.path))
    }

    /// Example document showing every declared field
    #[must_use]
    pub fn skeleton(&self) -> serde_yaml::Value {
        let mut root = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        for field in &self.fields {
            let leaf = if self.has_descendants(&field.path) {
                None
            } else {
                Some(field.placeholder())
            };
            insert_skeleton(&mut root, &parse_path(&field.path), leaf);
        }
        root
    }

    /// [`Self::skeleton`] rendered as YAML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn skeleton_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.skeleton()).map_err(Error::from)
    }
}

fn is_descendant(candidate: &str, ancestor: &str) -> bool {
    candidate
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
}

fn insert_skeleton(target: &mut serde_yaml::Value, segments: &[Segment], leaf: Option<serde_yaml::Value>) {
    use serde_yaml::Value;

    let Some((first, rest)) = segments.split_first() else {
        if let (Some(leaf), true) = (leaf, target.is_null()) {
            *target = leaf;
        }
        return;
    };
    match first {
        Segment::Key(key) => {
            if !target.is_mapping() {
                *target = Value::Mapping(serde_yaml::Mapping::new());
            }
            if let Value::Mapping(map) = target {
                let child = map.entry(Value::String(key.clone())).or_insert(Value::Null);
                insert_skeleton(child, rest, leaf);
            }
        }
        Segment::Each | Segment::Index(_) => {
            if !target.is_sequence() {
                *target = Value::Sequence(vec![Value::Null]);
            }
            if let Value::Sequence(items) = target {
                if items.is_empty() {
                    items.push(Value::Null);
                }
                insert_skeleton(&mut items[0], rest, leaf);
            }
        }
    }
}

/// A field present in the document with the wrong type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeError {
    /// Concrete path of the offending value
    pub field_path: String,
    /// Type(s) the template expects
    pub expected_type: String,
    /// Type found in the document
    pub actual_type: String,
}

/// Difference between a document and the reference template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Required paths absent (or null) in the document, template order
    pub missing_fields: Vec<String>,
    /// Present paths with the wrong type, template order
    pub type_errors: Vec<TypeError>,
}

impl ComparisonResult {
    /// No missing fields and no type errors
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_fields.is_empty() && self.type_errors.is_empty()
    }
}

/// Compare a document against the reference template.
///
/// Pure and deterministic: results follow template declaration order, then
/// list element order.
#[must_use]
pub fn compare(document: &NormalizedDocument, template: &ReferenceTemplate) -> ComparisonResult {
    let mut result = ComparisonResult::default();
    for field in &template.fields {
        for resolved in document.resolve(&field.path) {
            match resolved.node {
                None | Some(Node::Null) => {
                    if field.required {
                        result.missing_fields.push(resolved.path);
                    }
                }
                Some(node) if !field.accepts(node) => result.type_errors.push(TypeError {
                    field_path: resolved.path,
                    expected_type: field.expected_type(),
                    actual_type: node.kind().to_string(),
                }),
                Some(_) => {}
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
name: Test Template
version: "1"
fields:
  - path: metadata.plan_name
    type: string
    required: true
  - path: metadata.test_type
    type: enum
    allowed_values: [smoke, stress]
  - path: hardware.cpu
    type: string
    required: true
  - path: hardware.cores
    type: number
  - path: test_suites
    type: list
    required: true
  - path: test_suites[].name
    type: string
    required: true
  - path: test_suites[].order
    type: integer
"#;

    fn template() -> ReferenceTemplate {
        ReferenceTemplate::from_yaml(TEMPLATE).expect("template")
    }

    fn doc(text: &str) -> NormalizedDocument {
        NormalizedDocument::parse(text).expect("parse")
    }

    #[test]
    fn test_builtin_template_loads() {
        let template = ReferenceTemplate::builtin().expect("builtin");
        assert_eq!(template.name, "Smoke Template");
        assert!(template.field("hardware.cpu").is_some());
        assert!(template.required_fields().count() > 5);
    }

    #[test]
    fn test_one_or_many_types() {
        let template = ReferenceTemplate::builtin().expect("builtin");
        let os = template.field("environment.os").expect("os");
        assert_eq!(os.types, vec![FieldType::String, FieldType::List]);
        assert_eq!(os.expected_type(), "string|list");
    }

    #[test]
    fn test_clean_document() {
        let d = doc("metadata: {plan_name: p, test_type: smoke}\nhardware: {cpu: x, cores: 8}\ntest_suites: [{name: a, order: 1}]\n");
        assert!(compare(&d, &template()).is_clean());
    }

    #[test]
    fn test_missing_field_reported_once() {
        let d = doc("metadata: {}\nhardware: {cpu: 5}\ntest_suites: []\n");
        let result = compare(&d, &template());
        assert_eq!(result.missing_fields, vec!["metadata.plan_name"]);
        assert_eq!(result.type_errors.len(), 1);
        assert_eq!(result.type_errors[0].field_path, "hardware.cpu");
        assert!(
            !result
                .type_errors
                .iter()
                .any(|e| e.field_path == "metadata.plan_name")
        );
    }

    #[test]
    fn test_null_counts_as_missing() {
        let d = doc("metadata: {plan_name: ~}\nhardware: {cpu: x}\ntest_suites: []\n");
        let result = compare(&d, &template());
        assert_eq!(result.missing_fields, vec!["metadata.plan_name"]);
        assert!(result.type_errors.is_empty());
    }

    #[test]
    fn test_optional_field_absent_is_silent() {
        let d = doc("metadata: {plan_name: p}\nhardware: {cpu: x}\ntest_suites: []\n");
        assert!(compare(&d, &template()).is_clean());
    }

    #[test]
    fn test_type_error_fields() {
        let d = doc("metadata: {plan_name: [a]}\nhardware: {cpu: x}\ntest_suites: []\n");
        let result = compare(&d, &template());
        assert_eq!(
            result.type_errors,
            vec![TypeError {
                field_path: "metadata.plan_name".to_string(),
                expected_type: "string".to_string(),
                actual_type: "list".to_string(),
            }]
        );
    }

    #[test]
    fn test_number_accepts_integer_and_float() {
        for cores in ["8", "8.5"] {
            let d = doc(&format!(
                "metadata: {{plan_name: p}}\nhardware: {{cpu: x, cores: {cores}}}\ntest_suites: []\n"
            ));
            assert!(compare(&d, &template()).type_errors.is_empty(), "cores={cores}");
        }
    }

    #[test]
    fn test_enum_outside_allowed_values() {
        let d = doc("metadata: {plan_name: p, test_type: soak}\nhardware: {cpu: x}\ntest_suites: []\n");
        let result = compare(&d, &template());
        assert_eq!(result.type_errors.len(), 1);
        assert_eq!(result.type_errors[0].expected_type, "enum(smoke|stress)");
        assert_eq!(result.type_errors[0].actual_type, "string");
    }

    #[test]
    fn test_list_elements_in_order() {
        let d = doc(
            "metadata: {plan_name: p}\nhardware: {cpu: x}\ntest_suites:\n  - {order: first}\n  - {name: b}\n  - {order: 3}\n",
        );
        let result = compare(&d, &template());
        assert_eq!(
            result.missing_fields,
            vec!["test_suites[0].name", "test_suites[2].name"]
        );
        assert_eq!(result.type_errors.len(), 1);
        assert_eq!(result.type_errors[0].field_path, "test_suites[0].order");
    }

    #[test]
    fn test_compare_is_idempotent() {
        let d = doc("metadata: {}\nhardware: {cpu: 1}\ntest_suites: [{order: x}]\n");
        let t = template();
        assert_eq!(compare(&d, &t), compare(&d, &t));
    }

    #[test]
    fn test_knows_paths() {
        let t = ReferenceTemplate::builtin().expect("builtin");
        assert!(t.knows("metadata"));
        assert!(t.knows("hardware.machines[3].specs.cpu"));
        assert!(t.knows("environment.os[1]"));
        assert!(!t.knows("notes"));
        assert!(!t.knows("hardware.psu"));
    }

    #[test]
    fn test_has_descendants() {
        let t = ReferenceTemplate::builtin().expect("builtin");
        assert!(t.has_descendants("hardware"));
        assert!(t.has_descendants("test_suites[4]"));
        assert!(!t.has_descendants("environment.os"));
    }

    #[test]
    fn test_skeleton_shape() {
        let t = ReferenceTemplate::builtin().expect("builtin");
        let skeleton = t.skeleton();
        assert_eq!(skeleton["metadata"]["version"], serde_yaml::Value::String("1.0".into()));
        assert_eq!(skeleton["metadata"]["test_type"], serde_yaml::Value::String("smoke".into()));
        assert!(skeleton["test_suites"].is_sequence());
        assert!(skeleton["test_suites"][0]["name"].is_string());
        assert!(skeleton["environment"]["kernel"].is_mapping());
        assert_eq!(skeleton["firmware"]["comparison"], serde_yaml::Value::Bool(false));
    }

    #[test]
    fn test_skeleton_yaml_renders() {
        let yaml = ReferenceTemplate::builtin()
            .expect("builtin")
            .skeleton_yaml()
            .expect("yaml");
        assert!(yaml.contains("plan_name"));
        assert!(yaml.contains("test_suites"));
    }

    #[test]
    fn test_rejects_duplicate_path() {
        let yaml = "name: t\nversion: '1'\nfields:\n  - {path: a, type: string}\n  - {path: a, type: map}\n";
        let err = ReferenceTemplate::from_yaml(yaml).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate field 'a'"));
    }

    #[test]
    fn test_rejects_enum_without_values() {
        let yaml = "name: t\nversion: '1'\nfields:\n  - {path: a, type: enum}\n";
        assert!(matches!(
            ReferenceTemplate::from_yaml(yaml),
            Err(Error::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_rejects_concrete_index() {
        let yaml = "name: t\nversion: '1'\nfields:\n  - {path: 'a[0].b', type: string}\n";
        assert!(matches!(
            ReferenceTemplate::from_yaml(yaml),
            Err(Error::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_rejects_empty_fields() {
        let yaml = "name: t\nversion: '1'\nfields: []\n";
        assert!(ReferenceTemplate::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_template_yaml_roundtrip() {
        let t = template();
        let back = ReferenceTemplate::from_yaml(&t.to_yaml().expect("yaml")).expect("parse");
        assert_eq!(back, t);
    }
}
