// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common defaults and well-known identifiers used across the workflow.
//!
//! This module defines the KubeVirt API coordinates, conventional labels, and
//! tuning defaults so they stay consistent between configuration, discovery,
//! and remediation.

// ============================================================================
// KubeVirt API coordinates
// ============================================================================

/// API group of the VirtualMachineInstance resource
pub const KUBEVIRT_GROUP: &str = "kubevirt.io";

/// API version of the VirtualMachineInstance resource
pub const KUBEVIRT_VERSION: &str = "v1";

/// Kind of the queried resource
pub const KIND_VMI: &str = "VirtualMachineInstance";

/// Conventional label KubeVirt stamps on a VMI with the owning VM name.
///
/// Recovery configurations usually select on this label.
pub const KUBEVIRT_VM_NAME_LABEL: &str = "vm.kubevirt.io/name";

// ============================================================================
// Connection defaults
// ============================================================================

/// Default SSH port on the remediation target
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default TCP connect timeout for the remediation session (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Discovery retry defaults
// ============================================================================

/// Maximum total time to wait for a VMI status address to populate (seconds).
///
/// Address assignment is asynchronous relative to resource creation, so the
/// missing-address case is retried until this budget is exhausted.
pub const DEFAULT_DISCOVERY_MAX_ELAPSED_SECS: u64 = 120;

/// Initial interval between discovery retries (milliseconds)
pub const DEFAULT_DISCOVERY_INITIAL_INTERVAL_MILLIS: u64 = 500;

/// Maximum interval between discovery retries (seconds)
pub const DEFAULT_DISCOVERY_MAX_INTERVAL_SECS: u64 = 15;

// ============================================================================
// Backoff shape
// ============================================================================

/// Backoff multiplier (exponential growth factor)
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
pub const RANDOMIZATION_FACTOR: f64 = 0.1;
