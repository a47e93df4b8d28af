//! Machine compatibility evaluation
//!
//! Plan requirements are extracted from the document once as
//! [`PlanConstraints`] and then checked against every catalog machine. A
//! machine is compatible when every declared constraint holds; otherwise it
//! is incompatible and carries all of its failures.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use crate::document::{Node, NormalizedDocument};
use crate::machine::{MachineCatalog, MachineProfile};
use crate::result::{Finding, FindingCode};

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\s*[vV]?(\d+(?:\.\d+)*)").unwrap()
});

/// Dotted numeric kernel version.
///
/// Only the leading numeric prefix is kept (`5.15.0-91-generic` is
/// `5.15.0`) and missing trailing components compare as zero, so `6.1`
/// equals `6.1.0`.
#[derive(Debug, Clone, Eq)]
pub struct KernelVersion {
    components: Vec<u64>,
}

impl KernelVersion {
    /// Parse the leading version of a kernel release string
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let captures = VERSION_REGEX.captures(text)?;
        let components = captures
            .get(1)?
            .as_str()
            .split('.')
            .map(str::parse)
            .collect::<Result<Vec<u64>, _>>()
            .ok()?;
        Some(Self { components })
    }

    /// Version components as written
    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl Ord for KernelVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for KernelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KernelVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Which requirement a constraint expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// `hardware.cpu`
    Cpu,
    /// `hardware.gpu`
    Gpu,
    /// `environment.os`
    Os,
    /// `environment.deployment`
    Deployment,
    /// `environment.kernel.type`
    KernelType,
    /// `environment.kernel` / `environment.kernel.version`
    Kernel,
    /// `environment.kernel.min_version` / `max_version`
    KernelRange,
}

impl ConstraintKind {
    /// Snake-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Os => "os",
            Self::Deployment => "deployment",
            Self::KernelType => "kernel_type",
            Self::Kernel => "kernel",
            Self::KernelRange => "kernel_range",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requirement declared by a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Machine CPU must match
    Cpu(String),
    /// Machine GPU must match
    Gpu(String),
    /// Machine OS must be one of these
    Os(Vec<String>),
    /// Machine deployment must be one of these
    Deployment(Vec<String>),
    /// Machine kernel flavor must match
    KernelType(String),
    /// Machine kernel must equal this version
    Kernel(KernelVersion),
    /// Machine kernel must lie in the inclusive range
    KernelRange {
        /// Lower bound
        min: Option<KernelVersion>,
        /// Upper bound
        max: Option<KernelVersion>,
    },
}

fn normalize(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

fn same_identifier(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

impl Constraint {
    /// Kind of this constraint
    #[must_use]
    pub const fn kind(&self) -> ConstraintKind {
        match self {
            Self::Cpu(_) => ConstraintKind::Cpu,
            Self::Gpu(_) => ConstraintKind::Gpu,
            Self::Os(_) => ConstraintKind::Os,
            Self::Deployment(_) => ConstraintKind::Deployment,
            Self::KernelType(_) => ConstraintKind::KernelType,
            Self::Kernel(_) => ConstraintKind::Kernel,
            Self::KernelRange { .. } => ConstraintKind::KernelRange,
        }
    }

    /// Requirement as displayed in failures
    #[must_use]
    pub fn expected(&self) -> String {
        match self {
            Self::Cpu(v) | Self::Gpu(v) | Self::KernelType(v) => v.clone(),
            Self::Os(values) | Self::Deployment(values) => values.join(" | "),
            Self::Kernel(version) => version.to_string(),
            Self::KernelRange { min, max } => match (min, max) {
                (Some(min), Some(max)) => format!(">= {min}, <= {max}"),
                (Some(min), None) => format!(">= {min}"),
                (None, Some(max)) => format!("<= {max}"),
                (None, None) => "any".to_string(),
            },
        }
    }

    /// Check a machine; `None` means satisfied
    #[must_use]
    pub fn check(&self, machine: &MachineProfile) -> Option<ConstraintFailure> {
        let actual = match self {
            Self::Cpu(_) => Some(machine.cpu.as_str()),
            Self::Gpu(_) => Some(machine.gpu.as_str()),
            Self::Os(_) => Some(machine.os.as_str()),
            Self::Deployment(_) => machine.deployment.as_deref(),
            Self::KernelType(_) => machine.kernel_type.as_deref(),
            Self::Kernel(_) | Self::KernelRange { .. } => Some(machine.kernel.as_str()),
        };

        let satisfied = match (self, actual) {
            (_, None) => false,
            (Self::Cpu(want) | Self::Gpu(want), Some(have)) => same_identifier(want, have),
            (Self::Os(allowed) | Self::Deployment(allowed), Some(have)) => {
                allowed.iter().any(|want| same_identifier(want, have))
            }
            (Self::KernelType(want), Some(have)) => want.trim() == have.trim(),
            (Self::Kernel(want), Some(have)) => {
                KernelVersion::parse(have).is_some_and(|have| have == *want)
            }
            (Self::KernelRange { min, max }, Some(have)) => {
                KernelVersion::parse(have).is_some_and(|have| {
                    min.as_ref().is_none_or(|min| have >= *min)
                        && max.as_ref().is_none_or(|max| have <= *max)
                })
            }
        };

        if satisfied {
            return None;
        }
        let expected = self.expected();
        let actual = actual.unwrap_or("").to_string();
        let message = match (self, actual.is_empty()) {
            (Self::Kernel(_) | Self::KernelRange { .. }, false)
                if KernelVersion::parse(&actual).is_none() =>
            {
                format!("machine kernel '{actual}' is not a version")
            }
            (_, true) => format!("machine declares no {}; plan requires {expected}", self.kind()),
            _ => format!("{} mismatch: plan requires {expected}, machine has {actual}", self.kind()),
        };
        Some(ConstraintFailure {
            constraint: self.kind(),
            expected,
            actual,
            message,
        })
    }
}

/// A constraint a machine does not satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintFailure {
    /// Constraint that failed
    pub constraint: ConstraintKind,
    /// What the plan requires
    pub expected: String,
    /// What the machine has (empty when undeclared)
    pub actual: String,
    /// Human-readable explanation
    pub message: String,
}

/// Machine with the constraints it fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompatibleMachine {
    /// The machine
    pub machine: MachineProfile,
    /// Every failing constraint, in evaluation order
    pub failures: Vec<ConstraintFailure>,
}

/// Catalog partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// Machines satisfying every constraint, catalog order
    pub compatible_machines: Vec<MachineProfile>,
    /// Machines failing at least one constraint, catalog order
    pub incompatible_machines: Vec<IncompatibleMachine>,
}

impl CompatibilityResult {
    /// Machines on both sides of the partition
    #[must_use]
    pub fn total(&self) -> usize {
        self.compatible_machines.len() + self.incompatible_machines.len()
    }
}

/// Constraints declared by a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanConstraints {
    constraints: Vec<Constraint>,
}

impl PlanConstraints {
    /// Build from explicit constraints
    #[must_use]
    pub const fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    /// Declared constraints, evaluation order
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Extract constraints from a plan.
    ///
    /// Kernel versions that do not parse, and bounds that contradict each
    /// other, are returned as validation errors; the affected kernel
    /// constraint is then left out.
    #[must_use]
    pub fn from_document(document: &NormalizedDocument) -> (Self, Vec<Finding>) {
        let mut constraints = Vec::new();
        let mut findings = Vec::new();

        if let Some(cpu) = document.text("hardware.cpu") {
            constraints.push(Constraint::Cpu(cpu));
        }
        if let Some(gpu) = document.text("hardware.gpu") {
            constraints.push(Constraint::Gpu(gpu));
        }
        let os = string_set(document, "environment.os");
        if !os.is_empty() {
            constraints.push(Constraint::Os(os));
        }
        let deployment = string_set(document, "environment.deployment");
        if !deployment.is_empty() {
            constraints.push(Constraint::Deployment(deployment));
        }

        let version_path = match document.get_present("environment.kernel") {
            Some(Node::Map(_)) => "environment.kernel.version",
            _ => "environment.kernel",
        };
        if let Some(kernel_type) = document.text("environment.kernel.type") {
            constraints.push(Constraint::KernelType(kernel_type));
        }

        let mut parse = |path: &str| -> Option<KernelVersion> {
            if let Some(Node::Float(value)) = document.get(path) {
                if document.float_literal(path).is_none() {
                    findings.push(
                        Finding::new(
                            FindingCode::InvalidKernelVersion,
                            path,
                            format!(
                                "Field '{path}' was read as the number {value} and may have lost digits; quote the version"
                            ),
                        )
                        .at_line(document.nearest_line(path)),
                    );
                    return None;
                }
            }
            let text = document.text(path)?;
            let version = KernelVersion::parse(&text);
            if version.is_none() {
                findings.push(
                    Finding::new(
                        FindingCode::InvalidKernelVersion,
                        path,
                        format!("Field '{path}' is not a kernel version: '{text}'"),
                    )
                    .at_line(document.line_of(path)),
                );
            }
            version
        };
        let version = parse(version_path);
        let min = parse("environment.kernel.min_version");
        let max = parse("environment.kernel.max_version");

        let mut bounds_ok = true;
        if let (Some(lo), Some(hi)) = (&min, &max) {
            if lo > hi {
                bounds_ok = false;
                findings.push(
                    Finding::new(
                        FindingCode::ContradictoryKernelBounds,
                        "environment.kernel",
                        format!("Kernel min_version {lo} is greater than max_version {hi}"),
                    )
                    .at_line(document.line_of("environment.kernel.min_version")),
                );
            }
        }
        if let Some(v) = &version {
            let below = min.as_ref().is_some_and(|lo| v < lo);
            let above = max.as_ref().is_some_and(|hi| v > hi);
            if bounds_ok && (below || above) {
                findings.push(
                    Finding::new(
                        FindingCode::ContradictoryKernelBounds,
                        version_path,
                        format!(
                            "Kernel version {v} is outside {}",
                            Constraint::KernelRange {
                                min: min.clone(),
                                max: max.clone()
                            }
                            .expected()
                        ),
                    )
                    .at_line(document.line_of(version_path)),
                );
            }
        }

        if let Some(v) = version {
            constraints.push(Constraint::Kernel(v));
        }
        if bounds_ok && (min.is_some() || max.is_some()) {
            constraints.push(Constraint::KernelRange { min, max });
        }

        (Self { constraints }, findings)
    }

    /// Partition a catalog, preserving catalog order
    #[must_use]
    pub fn evaluate(&self, catalog: &MachineCatalog) -> CompatibilityResult {
        let mut result = CompatibilityResult::default();
        for machine in catalog.iter() {
            let failures: Vec<ConstraintFailure> = self
                .constraints
                .iter()
                .filter_map(|c| c.check(machine))
                .collect();
            if failures.is_empty() {
                result.compatible_machines.push(machine.clone());
            } else {
                result.incompatible_machines.push(IncompatibleMachine {
                    machine: machine.clone(),
                    failures,
                });
            }
        }
        result
    }
}

/// String or list of scalars, nulls skipped
fn string_set(document: &NormalizedDocument, path: &str) -> Vec<String> {
    match document.get(path) {
        Some(Node::List(items)) => (0..items.len())
            .filter_map(|i| document.text(&format!("{path}[{i}]")))
            .collect(),
        Some(_) => document.text(path).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Evaluate a plan against a catalog
#[must_use]
pub fn evaluate(document: &NormalizedDocument, catalog: &MachineCatalog) -> CompatibilityResult {
    PlanConstraints::from_document(document).0.evaluate(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> KernelVersion {
        KernelVersion::parse(text).expect("version")
    }

    fn doc(text: &str) -> NormalizedDocument {
        NormalizedDocument::parse(text).expect("parse")
    }

    fn machine(id: u32, cpu: &str, kernel: &str) -> MachineProfile {
        MachineProfile::new(id, format!("m{id}"), cpu, "NVIDIA A100", "ubuntu-22.04", kernel)
    }

    fn xeon_epyc_catalog() -> MachineCatalog {
        MachineCatalog::new(vec![
            machine(1, "Intel Xeon 8380", "5.15.0"),
            machine(2, "AMD EPYC 7763", "6.1.0"),
        ])
        .expect("catalog")
    }

    #[test]
    fn test_version_parse_prefix() {
        assert_eq!(v("5.15.0-91-generic").components(), &[5, 15, 0]);
        assert_eq!(v("v6.1").components(), &[6, 1]);
        assert!(KernelVersion::parse("latest").is_none());
        assert!(KernelVersion::parse("").is_none());
    }

    #[test]
    fn test_version_zero_padding() {
        assert_eq!(v("6.1"), v("6.1.0"));
        assert!(v("6.1") < v("6.1.1"));
        assert!(v("5.19") < v("6"));
        assert!(v("5.15.10") > v("5.15.9"));
        assert_eq!(v("6.1.0").to_string(), "6.1.0");
    }

    #[test]
    fn test_cpu_partition() {
        let d = doc("hardware: {cpu: Intel Xeon 8380}\n");
        let result = evaluate(&d, &xeon_epyc_catalog());
        assert_eq!(result.compatible_machines.len(), 1);
        assert_eq!(result.compatible_machines[0].id, 1);
        assert_eq!(result.incompatible_machines.len(), 1);
        let failure = &result.incompatible_machines[0].failures[0];
        assert_eq!(failure.constraint, ConstraintKind::Cpu);
        assert_eq!(failure.expected, "Intel Xeon 8380");
        assert_eq!(failure.actual, "AMD EPYC 7763");
    }

    #[test]
    fn test_cpu_match_is_normalized() {
        let d = doc("hardware: {cpu: '  intel XEON 8380 '}\n");
        let result = evaluate(&d, &xeon_epyc_catalog());
        assert_eq!(result.compatible_machines.len(), 1);
    }

    #[test]
    fn test_no_constraints_all_compatible() {
        let d = doc("metadata: {plan_name: p}\n");
        let result = evaluate(&d, &xeon_epyc_catalog());
        assert_eq!(result.compatible_machines.len(), 2);
        assert!(result.incompatible_machines.is_empty());
    }

    #[test]
    fn test_empty_catalog() {
        let d = doc("hardware: {cpu: x}\n");
        let result = evaluate(&d, &MachineCatalog::empty());
        assert!(result.compatible_machines.is_empty());
        assert!(result.incompatible_machines.is_empty());
    }

    #[test]
    fn test_all_failures_attached() {
        let d = doc("hardware: {cpu: Z, gpu: Y}\nenvironment: {os: rhel-9, kernel: 4.19}\n");
        let result = evaluate(&d, &xeon_epyc_catalog());
        assert_eq!(result.incompatible_machines.len(), 2);
        let kinds: Vec<ConstraintKind> = result.incompatible_machines[0]
            .failures
            .iter()
            .map(|f| f.constraint)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ConstraintKind::Cpu,
                ConstraintKind::Gpu,
                ConstraintKind::Os,
                ConstraintKind::Kernel
            ]
        );
    }

    #[test]
    fn test_os_set_membership() {
        let d = doc("environment:\n  os: [rhel-9, Ubuntu-22.04]\n");
        let result = evaluate(&d, &xeon_epyc_catalog());
        assert_eq!(result.compatible_machines.len(), 2);
    }

    #[test]
    fn test_deployment_missing_on_machine_fails() {
        let d = doc("environment: {deployment: docker}\n");
        let result = evaluate(&d, &xeon_epyc_catalog());
        assert_eq!(result.incompatible_machines.len(), 2);
        let failure = &result.incompatible_machines[0].failures[0];
        assert_eq!(failure.constraint, ConstraintKind::Deployment);
        assert_eq!(failure.actual, "");
        assert!(failure.message.contains("declares no deployment"));
    }

    #[test]
    fn test_kernel_type_exact() {
        let catalog = MachineCatalog::new(vec![
            machine(1, "c", "6.1").with_kernel_type("realtime"),
            machine(2, "c", "6.1").with_kernel_type("default"),
        ])
        .expect("catalog");
        let d = doc("environment:\n  kernel:\n    type: realtime\n");
        let result = evaluate(&d, &catalog);
        assert_eq!(result.compatible_machines.len(), 1);
        assert_eq!(result.compatible_machines[0].id, 1);
    }

    #[test]
    fn test_kernel_version_equality_with_suffix() {
        let catalog = MachineCatalog::new(vec![machine(1, "c", "5.15.0-91-generic")]).expect("catalog");
        let d = doc("environment:\n  kernel:\n    version: '5.15'\n");
        assert_eq!(evaluate(&d, &catalog).compatible_machines.len(), 1);
    }

    #[test]
    fn test_kernel_range_inclusive() {
        let catalog = MachineCatalog::new(vec![
            machine(1, "c", "5.15.0"),
            machine(2, "c", "6.1.0"),
            machine(3, "c", "6.5.0"),
        ])
        .expect("catalog");
        let d = doc("environment:\n  kernel:\n    min_version: 5.15.0\n    max_version: 6.1.0\n");
        let result = evaluate(&d, &catalog);
        let ids: Vec<u32> = result.compatible_machines.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(
            result.incompatible_machines[0].failures[0].expected,
            ">= 5.15.0, <= 6.1.0"
        );
    }

    #[test]
    fn test_unparseable_machine_kernel_fails() {
        let catalog = MachineCatalog::new(vec![machine(1, "c", "custom-build")]).expect("catalog");
        let d = doc("environment:\n  kernel:\n    min_version: '5.0'\n");
        let result = evaluate(&d, &catalog);
        let failure = &result.incompatible_machines[0].failures[0];
        assert_eq!(failure.constraint, ConstraintKind::KernelRange);
        assert!(failure.message.contains("is not a version"));
    }

    #[test]
    fn test_unparseable_plan_kernel_is_finding() {
        let d = doc("environment:\n  kernel: latest\n");
        let (constraints, findings) = PlanConstraints::from_document(&d);
        assert!(constraints.constraints().is_empty());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::InvalidKernelVersion);
        assert_eq!(findings[0].field_path, "environment.kernel");
        assert_eq!(findings[0].line_number, Some(2));
    }

    #[test]
    fn test_contradictory_bounds() {
        let d = doc("environment:\n  kernel:\n    min_version: 6.5.0\n    max_version: 5.15.0\n");
        let (constraints, findings) = PlanConstraints::from_document(&d);
        assert!(constraints.constraints().is_empty());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::ContradictoryKernelBounds);
        assert_eq!(findings[0].line_number, Some(3));
    }

    #[test]
    fn test_version_outside_bounds() {
        let d = doc("environment:\n  kernel:\n    version: 6.5.0\n    max_version: 6.1.0\n");
        let (_, findings) = PlanConstraints::from_document(&d);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field_path, "environment.kernel.version");
        assert!(findings[0].message.contains("outside <= 6.1.0"));
    }

    #[test]
    fn test_numeric_kernel_value() {
        let d = doc("environment:\n  kernel: 6.1\n");
        let (constraints, findings) = PlanConstraints::from_document(&d);
        assert!(findings.is_empty());
        assert_eq!(constraints.constraints(), &[Constraint::Kernel(v("6.1.0"))]);
    }

    #[test]
    fn test_unquoted_two_digit_minor_kernel() {
        let catalog = MachineCatalog::new(vec![
            machine(1, "Intel Xeon 8380", "6.10.0"),
            machine(2, "Intel Xeon 8380", "6.1.0"),
        ])
        .expect("catalog");
        for plan in [
            "environment:\n  kernel:\n    version: 6.10\n",
            "environment:\n  kernel: 6.10\n",
            "environment:\n  kernel:\n    min_version: 6.10\n    max_version: 6.10\n",
        ] {
            let d = doc(plan);
            let (constraints, findings) = PlanConstraints::from_document(&d);
            assert!(findings.is_empty(), "{plan}");
            let result = constraints.evaluate(&catalog);
            let ids: Vec<u32> = result.compatible_machines.iter().map(|m| m.id).collect();
            assert_eq!(ids, vec![1], "{plan}");
        }
    }

    #[test]
    fn test_flow_style_float_kernel_is_rejected() {
        let d = doc("environment: {kernel: {version: 6.10}}\n");
        let (constraints, findings) = PlanConstraints::from_document(&d);
        assert!(constraints.constraints().is_empty());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, FindingCode::InvalidKernelVersion);
        assert_eq!(findings[0].field_path, "environment.kernel.version");
        assert!(findings[0].message.contains("quote the version"));
        assert_eq!(findings[0].line_number, Some(1));
    }

    #[test]
    fn test_partition_preserves_order() {
        let catalog = MachineCatalog::builtin().expect("builtin");
        let d = doc("hardware: {cpu: AMD EPYC 7763}\n");
        let result = evaluate(&d, &catalog);
        assert_eq!(result.total(), catalog.len());
        let ids: Vec<u32> = result
            .incompatible_machines
            .iter()
            .map(|m| m.machine.id)
            .collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
