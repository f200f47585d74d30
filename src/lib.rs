// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Mendy - Machine-Network Recovery for KubeVirt Guests
//!
//! Mendy is a disaster-recovery tool for virtual machines whose guests carry
//! a stable, operator-assigned address on a secondary ("machine network")
//! interface. After a restore, the orchestration-managed pod network comes
//! back with a fresh transient address while the machine-network interface
//! comes back bare. Mendy closes that gap in one stateless pass:
//!
//! 1. **Discover** — query the Kubernetes API for the
//!    VirtualMachineInstance matching a label selector, enforce that exactly
//!    one matches, and extract the transient address from its status.
//! 2. **Remediate** — connect to the guest over SSH at the discovered
//!    address and converge the machine-network interface to its declared
//!    static configuration (address/prefix, gateway, name servers),
//!    reporting `Changed` or `Unchanged`.
//!
//! Each run is independent and idempotent; nothing is persisted between
//! runs, so a re-launched run always re-discovers before it reconnects.
//!
//! ## Modules
//!
//! - [`config`] - Run file schema, loading, and validation
//! - [`discovery`] - Endpoint discovery against the Kubernetes API
//! - [`selector`] - Label selector matching and query-string conversion
//! - [`vmi`] - Typed view of the consumed VirtualMachineInstance resource
//! - [`inventory`] - Run-scoped registry of discovered targets
//! - [`netstate`] - Interface state model and desired-state diffing
//! - [`nmcli`] - NetworkManager command generation and output parsing
//! - [`session`] - Remote session transport (SSH) behind a test seam
//! - [`remediate`] - Desired-state convergence of the guest interface
//! - [`workflow`] - The two-stage pipeline and concurrent multi-target runs
//!
//! ## Example
//!
//! ```rust
//! use mendy::netstate::DesiredInterfaceState;
//! use mendy::selector::LabelSelector;
//! use std::collections::BTreeMap;
//!
//! // The desired state a recovery run converges the guest interface to
//! let desired = DesiredInterfaceState {
//!     interface: "eth1".to_string(),
//!     address: "192.168.160.120/24".parse().unwrap(),
//!     gateway: "192.168.160.1".parse().unwrap(),
//!     nameservers: vec!["8.8.8.8".parse().unwrap()],
//! };
//!
//! // The selector that must match exactly one VirtualMachineInstance
//! let mut labels = BTreeMap::new();
//! labels.insert("vm.kubevirt.io/name".to_string(), "db-vm".to_string());
//! let selector = LabelSelector {
//!     match_labels: Some(labels),
//!     match_expressions: None,
//! };
//!
//! assert_eq!(
//!     selector.to_api_selector().unwrap(),
//!     "vm.kubevirt.io/name=db-vm"
//! );
//! assert_eq!(desired.address.to_string(), "192.168.160.120/24");
//! ```

pub mod config;
pub mod constants;
pub mod discovery;
pub mod errors;
pub mod inventory;
pub mod netstate;
pub mod nmcli;
pub mod remediate;
pub mod retry;
pub mod selector;
pub mod session;
pub mod vmi;
pub mod workflow;
