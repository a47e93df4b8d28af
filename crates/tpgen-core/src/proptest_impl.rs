//! Proptest strategies for property-based testing
//!
//! Generates machine profiles, catalogs and schema-conforming plans.

use crate::machine::{MachineCatalog, MachineProfile};
use proptest::prelude::*;

const CPUS: &[&str] = &["Intel Xeon 8380", "AMD EPYC 7763", "Intel Xeon 6448Y", "Ampere Altra Q80"];
const GPUS: &[&str] = &["NVIDIA A100", "NVIDIA H100", "AMD Instinct MI250"];
const OSES: &[&str] = &[
    "ubuntu-20.04",
    "ubuntu-22.04",
    "ubuntu-24.04",
    "rhel-8",
    "rhel-9",
    "centos-7",
    "centos-8",
    "debian-11",
    "debian-12",
];
const DEPLOYMENTS: &[&str] = &["bare-metal", "vm", "docker", "k8s"];
const KERNEL_TYPES: &[&str] = &["default", "realtime", "lowlatency", "custom"];
const KERNELS: &[&str] = &["5.15.0", "5.19.0", "6.1.0", "6.2.0", "6.5.0", "6.10"];
const TEST_TYPES: &[&str] = &[
    "smoke",
    "functional",
    "regression",
    "performance",
    "stress",
    "compatibility",
    "stability",
];

/// Strategy for CPU identifiers
pub fn cpu_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(CPUS)
}

/// Strategy for GPU identifiers
pub fn gpu_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(GPUS)
}

/// Strategy for operating systems
pub fn os_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(OSES)
}

/// Strategy for kernel releases, with and without distro suffixes
pub fn kernel_strategy() -> impl Strategy<Value = String> {
    (prop::sample::select(KERNELS), prop::option::of(1u32..200)).prop_map(|(base, build)| {
        build.map_or_else(|| base.to_string(), |b| format!("{base}-{b}-generic"))
    })
}

/// Strategy for a machine with a given id
pub fn machine_profile_strategy(id: u32) -> impl Strategy<Value = MachineProfile> {
    (
        cpu_strategy(),
        gpu_strategy(),
        os_strategy(),
        kernel_strategy(),
        prop::option::of(prop::sample::select(KERNEL_TYPES)),
        prop::option::of(prop::sample::select(DEPLOYMENTS)),
    )
        .prop_map(move |(cpu, gpu, os, kernel, kernel_type, deployment)| {
            let mut machine = MachineProfile::new(id, format!("machine-{id}"), cpu, gpu, os, kernel);
            machine.kernel_type = kernel_type.map(str::to_string);
            machine.deployment = deployment.map(str::to_string);
            machine
        })
}

/// Strategy for catalogs of up to `max` machines with unique ids
pub fn catalog_strategy(max: usize) -> impl Strategy<Value = MachineCatalog> {
    (0..=max).prop_flat_map(|len| {
        let machines: Vec<_> = (1..=len)
            .map(|id| machine_profile_strategy(u32::try_from(id).unwrap_or(u32::MAX)))
            .collect();
        machines.prop_map(|machines| MachineCatalog::new(machines).unwrap_or_default())
    })
}

/// Strategy for schema-conforming plan text
pub fn plan_strategy() -> impl Strategy<Value = String> {
    (
        "[A-Za-z][A-Za-z0-9 ]{0,20}",
        prop::option::of(prop::sample::select(TEST_TYPES)),
        cpu_strategy(),
        gpu_strategy(),
        prop::collection::vec(os_strategy(), 1..3),
        prop::option::of(prop::sample::select(KERNELS)),
        prop::collection::vec("[a-z][a-z_]{0,12}", 0..5),
    )
        .prop_map(|(name, test_type, cpu, gpu, oses, kernel, suites)| {
            let mut plan = format!("metadata:\n  plan_name: \"{name}\"\n  version: '1.0'\n");
            if let Some(test_type) = test_type {
                plan.push_str(&format!("  test_type: {test_type}\n"));
            }
            plan.push_str(&format!("hardware:\n  cpu: {cpu}\n  gpu: {gpu}\n"));
            plan.push_str("environment:\n  os:\n");
            for os in oses {
                plan.push_str(&format!("    - {os}\n"));
            }
            match kernel {
                Some(kernel) => plan.push_str(&format!("  kernel:\n    version: {kernel}\n")),
                None => plan.push_str("  kernel: 6.1.0\n"),
            }
            if suites.is_empty() {
                plan.push_str("test_suites: []\n");
            } else {
                plan.push_str("test_suites:\n");
                for (i, suite) in suites.iter().enumerate() {
                    plan.push_str(&format!("  - name: {suite}_{i}\n    order: {}\n", i + 1));
                }
            }
            plan
        })
}
