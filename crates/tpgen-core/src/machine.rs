//! Machine catalog
//!
//! The catalog lists the lab machines a test plan can run on. It is loaded
//! once (built-in default or a YAML file) and shared read-only.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};

const BUILTIN_CATALOG: &str = include_str!("../data/machines.yaml");

/// Hardware and software profile of one machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineProfile {
    /// Catalog identifier
    pub id: u32,
    /// Machine name
    pub name: String,
    /// Motherboard model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motherboard: Option<String>,
    /// CPU identifier (e.g. "Intel Xeon 8380")
    pub cpu: String,
    /// GPU identifier
    pub gpu: String,
    /// Operating system (e.g. "ubuntu-22.04")
    pub os: String,
    /// Kernel release (e.g. "5.15.0-91-generic")
    pub kernel: String,
    /// Kernel flavor (default, realtime, lowlatency, custom)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_type: Option<String>,
    /// Deployment model (bare-metal, vm, docker, k8s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
}

impl MachineProfile {
    /// Create a profile with the mandatory fields
    #[must_use]
    pub fn new(
        id: u32,
        name: impl Into<String>,
        cpu: impl Into<String>,
        gpu: impl Into<String>,
        os: impl Into<String>,
        kernel: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            motherboard: None,
            cpu: cpu.into(),
            gpu: gpu.into(),
            os: os.into(),
            kernel: kernel.into(),
            kernel_type: None,
            deployment: None,
        }
    }

    /// Set the kernel flavor
    #[must_use]
    pub fn with_kernel_type(mut self, kernel_type: impl Into<String>) -> Self {
        self.kernel_type = Some(kernel_type.into());
        self
    }

    /// Set the deployment model
    #[must_use]
    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }
}

/// Ordered, read-only list of machines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineCatalog {
    machines: Vec<MachineProfile>,
}

impl MachineCatalog {
    /// Build a catalog, rejecting duplicate ids
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCatalog`] if two machines share an id.
    pub fn new(machines: Vec<MachineProfile>) -> Result<Self> {
        let mut ids = HashSet::new();
        for machine in &machines {
            if !ids.insert(machine.id) {
                return Err(Error::InvalidCatalog(format!(
                    "duplicate machine id {}",
                    machine.id
                )));
            }
            if machine.name.trim().is_empty() {
                return Err(Error::InvalidCatalog(format!(
                    "machine {} has an empty name",
                    machine.id
                )));
            }
        }
        Ok(Self { machines })
    }

    /// Catalog with no machines
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            machines: Vec::new(),
        }
    }

    /// The catalog shipped with the crate
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded catalog is malformed.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Parse a catalog from YAML (`machines: [...]`)
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or ids repeat.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let parsed: Self = serde_yaml::from_str(yaml)?;
        Self::new(parsed.machines)
    }

    /// Load a catalog file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Number of machines
    #[must_use]
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Machines in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &MachineProfile> {
        self.machines.iter()
    }

    /// Machines as a slice
    #[must_use]
    pub fn machines(&self) -> &[MachineProfile] {
        &self.machines
    }

    /// Find a machine by name (trimmed, case-insensitive)
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&MachineProfile> {
        let name = name.trim();
        self.machines
            .iter()
            .find(|m| m.name.trim().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = MachineCatalog::builtin().expect("builtin");
        assert_eq!(catalog.len(), 5);
        assert!(catalog.iter().any(|m| m.cpu == "Intel Xeon 8380"));
        assert!(catalog.iter().any(|m| m.cpu == "AMD EPYC 7763"));
    }

    #[test]
    fn test_catalog_order_preserved() {
        let catalog = MachineCatalog::builtin().expect("builtin");
        let ids: Vec<u32> = catalog.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let yaml = r"
machines:
  - {id: 1, name: a, cpu: c, gpu: g, os: o, kernel: '6.1'}
  - {id: 1, name: b, cpu: c, gpu: g, os: o, kernel: '6.1'}
";
        let err = MachineCatalog::from_yaml(yaml).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate machine id 1"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let machine = MachineProfile::new(1, " ", "c", "g", "o", "6.1");
        assert!(MachineCatalog::new(vec![machine]).is_err());
    }

    #[test]
    fn test_optional_fields_default() {
        let yaml = "machines:\n  - {id: 7, name: a, cpu: c, gpu: g, os: o, kernel: '6.1'}\n";
        let catalog = MachineCatalog::from_yaml(yaml).expect("parse");
        let machine = &catalog.machines()[0];
        assert!(machine.kernel_type.is_none());
        assert!(machine.deployment.is_none());
        assert!(machine.motherboard.is_none());
    }

    #[test]
    fn test_find_by_name() {
        let catalog = MachineCatalog::builtin().expect("builtin");
        assert_eq!(catalog.find_by_name(" LAB-EPYC-01 ").map(|m| m.id), Some(2));
        assert!(catalog.find_by_name("nope").is_none());
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = MachineCatalog::empty();
        assert!(catalog.is_empty());
        assert_eq!(catalog.iter().count(), 0);
    }

    #[test]
    fn test_builders() {
        let machine = MachineProfile::new(1, "a", "c", "g", "o", "6.1")
            .with_kernel_type("realtime")
            .with_deployment("k8s");
        assert_eq!(machine.kernel_type.as_deref(), Some("realtime"));
        assert_eq!(machine.deployment.as_deref(), Some("k8s"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("machines.yaml");
        std::fs::write(&path, "machines: []\n").expect("write");
        assert!(MachineCatalog::from_file(&path).expect("load").is_empty());
    }
}
