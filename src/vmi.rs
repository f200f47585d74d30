// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed view of the KubeVirt `VirtualMachineInstance` resource.
//!
//! mendy only consumes this resource — it never creates or mutates one — so
//! the spec is deliberately minimal and the status models just the fields the
//! discovery stage reads: the phase and the per-interface runtime addresses.
//! Unknown fields returned by the API server are ignored during
//! deserialization.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Minimal `VirtualMachineInstance` spec.
///
/// Only fields useful for diagnosis are modelled; the domain definition and
/// network bindings belong to the virtualization platform and are opaque
/// here.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstance",
    namespaced,
    doc = "VirtualMachineInstance is the running incarnation of a KubeVirt virtual machine. mendy queries it read-only to learn the transient pod-network address assigned after a restore."
)]
#[kube(status = "VirtualMachineInstanceStatus")]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    /// Requested guest hostname, when set by the owning VirtualMachine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Node placement constraints, surfaced for diagnosis only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
}

/// Runtime status of a `VirtualMachineInstance`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceStatus {
    /// Lifecycle phase (e.g. "Pending", "Scheduling", "Running").
    ///
    /// Discovery does not gate on the phase: an instance that is not running
    /// yet simply has no address, which is the retried missing-address case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Per-interface runtime state reported by the guest agent / virt stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<VmiInterfaceStatus>>,
}

/// Runtime state of a single guest interface as reported in VMI status.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmiInterfaceStatus {
    /// Logical network name this interface is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Primary address of the interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// All addresses of the interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_addresses: Option<Vec<String>>,

    /// MAC address of the interface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    /// Name of the interface inside the guest (e.g. "eth0").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
}

impl VirtualMachineInstance {
    /// Extract the transient management address from the instance status.
    ///
    /// Takes the first status interface carrying a populated, parseable
    /// address — `ipAddress` first, then the first entry of `ipAddresses` —
    /// matching the source recovery workflow's use of the first status entry.
    /// Returns `None` while the status has not populated an address yet.
    #[must_use]
    pub fn transient_address(&self) -> Option<IpAddr> {
        let interfaces = self.status.as_ref()?.interfaces.as_ref()?;

        for interface in interfaces {
            if let Some(addr) = interface
                .ip_address
                .as_deref()
                .and_then(parse_status_address)
            {
                return Some(addr);
            }

            if let Some(addr) = interface
                .ip_addresses
                .as_ref()
                .and_then(|ips| ips.first())
                .and_then(|ip| parse_status_address(ip))
            {
                return Some(addr);
            }
        }

        None
    }

    /// Reported lifecycle phase, or "Unknown" when the status is absent.
    #[must_use]
    pub fn phase(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown")
    }
}

/// Parse an address string from VMI status.
///
/// Some virt stacks report the address with a prefix length attached; the
/// prefix is dropped before parsing.
fn parse_status_address(raw: &str) -> Option<IpAddr> {
    let bare = raw.split('/').next().unwrap_or(raw).trim();
    if bare.is_empty() {
        return None;
    }
    bare.parse().ok()
}

#[cfg(test)]
#[path = "vmi_tests.rs"]
mod vmi_tests;
