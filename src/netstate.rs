// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Interface state model and desired-state diffing.
//!
//! The remediation stage is desired-state convergence, not imperative
//! scripting: it reads the live configuration of the target interface,
//! computes the difference against the declared state, and applies exactly
//! the declared state when anything differs. This module holds the typed
//! state on both sides of that comparison and the diff itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// An address with prefix length, e.g. `192.168.160.120/24`.
///
/// Serialized as the usual slash notation in configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CidrAddress {
    /// The address part
    pub addr: IpAddr,
    /// The prefix length
    pub prefix: u8,
}

/// Error parsing a `CidrAddress` from slash notation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid CIDR address '{input}': {reason}")]
pub struct CidrParseError {
    /// The rejected input
    pub input: String,
    /// What was wrong with it
    pub reason: String,
}

impl FromStr for CidrAddress {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| CidrParseError {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (addr_part, prefix_part) = s
            .split_once('/')
            .ok_or_else(|| err("expected address/prefix notation"))?;

        let addr: IpAddr = addr_part
            .trim()
            .parse()
            .map_err(|_| err("address part is not a valid IP address"))?;

        let prefix: u8 = prefix_part
            .trim()
            .parse()
            .map_err(|_| err("prefix part is not a number"))?;

        let max_prefix = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max_prefix {
            return Err(err("prefix length out of range for address family"));
        }

        Ok(Self { addr, prefix })
    }
}

impl TryFrom<String> for CidrAddress {
    type Error = CidrParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CidrAddress> for String {
    fn from(value: CidrAddress) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CidrAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// The declarative target configuration for the remediated interface.
///
/// Supplied from static configuration, never discovered; immutable for the
/// run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredInterfaceState {
    /// Name of the interface inside the guest (e.g. "eth1")
    pub interface: String,
    /// Static address with prefix length
    pub address: CidrAddress,
    /// Gateway address
    pub gateway: IpAddr,
    /// Ordered name-server addresses
    pub nameservers: Vec<IpAddr>,
}

/// The live configuration of an interface as read from the target.
///
/// Every field is optional in practice: a freshly restored guest interface
/// may carry no address, no gateway, and no name servers at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CurrentInterfaceState {
    /// Addresses currently assigned to the interface
    pub addresses: Vec<CidrAddress>,
    /// Current gateway, if any
    pub gateway: Option<IpAddr>,
    /// Current name servers, in order
    pub nameservers: Vec<IpAddr>,
    /// NetworkManager connection profile bound to the device, if any
    pub connection: Option<String>,
}

/// Which parts of the interface configuration differ from the desired state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterfaceDiff {
    /// The assigned address set is not exactly the desired address
    pub address: bool,
    /// The gateway differs
    pub gateway: bool,
    /// The name-server list differs (order matters)
    pub nameservers: bool,
}

impl InterfaceDiff {
    /// True when nothing differs and the interface can be reported unchanged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.address || self.gateway || self.nameservers)
    }

    /// Human-readable list of the differing parts, for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.address {
            parts.push("address");
        }
        if self.gateway {
            parts.push("gateway");
        }
        if self.nameservers {
            parts.push("nameservers");
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Compute the difference between the live and the desired configuration.
///
/// Convergence is exact: the interface must carry the desired address and
/// nothing else, the desired gateway, and the desired name servers in order.
/// Any extra or stale value counts as drift and is replaced on apply.
#[must_use]
pub fn diff(current: &CurrentInterfaceState, desired: &DesiredInterfaceState) -> InterfaceDiff {
    InterfaceDiff {
        address: current.addresses != vec![desired.address],
        gateway: current.gateway != Some(desired.gateway),
        nameservers: current.nameservers != desired.nameservers,
    }
}

#[cfg(test)]
#[path = "netstate_tests.rs"]
mod netstate_tests;
