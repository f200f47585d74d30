// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-local inventory of discovered remediation targets.
//!
//! The discovery stage registers its result here as a named, addressable
//! entry that the remediation stage consumes immediately. The inventory is
//! owned by a single run and dropped with it — nothing is shared across
//! concurrent runs and nothing survives the process, which is what keeps
//! re-running the workflow safe after the address changes again.

use crate::discovery::DiscoveredEndpoint;
use crate::netstate::DesiredInterfaceState;
use crate::session::ConnectionParams;
use std::collections::BTreeMap;
use tracing::debug;

/// A discovered endpoint bound to its connection parameters and desired
/// state — everything the remediation stage needs.
///
/// Exists only in memory for the duration of the run.
#[derive(Clone, Debug)]
pub struct RemediationTarget {
    /// Configured target name
    pub name: String,
    /// The freshly discovered endpoint
    pub endpoint: DiscoveredEndpoint,
    /// Connection parameters (identity and key path, never key material)
    pub connection: ConnectionParams,
    /// Declarative target configuration for the interface
    pub desired: DesiredInterfaceState,
}

/// Run-scoped registry of remediation targets.
#[derive(Debug, Default)]
pub struct Inventory {
    entries: BTreeMap<String, RemediationTarget>,
}

impl Inventory {
    /// Create an empty inventory for a fresh run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target under its name and return the stored entry.
    ///
    /// Registering the same name twice replaces the previous entry:
    /// re-discovery within a run always wins over an earlier address.
    pub fn register(&mut self, target: RemediationTarget) -> &RemediationTarget {
        debug!(
            target = %target.name,
            address = %target.endpoint.address,
            "Registered remediation target"
        );

        let name = target.name.clone();
        self.entries.insert(name.clone(), target);
        // Just inserted under this key
        &self.entries[&name]
    }

    /// Look up a registered target by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RemediationTarget> {
        self.entries.get(name)
    }

    /// Number of registered targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod inventory_tests;
