// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Static run configuration: loading, schema, and validation.
//!
//! A run file declares one or more remediation targets — each a discovery
//! query (namespace + label selector), connection parameters, and the
//! desired interface state — plus optional discovery-retry tuning. The file
//! is YAML; every field is validated up front so a broken configuration
//! fails before any network call is made.
//!
//! ```yaml
//! targets:
//!   - name: db-vm
//!     discovery:
//!       namespace: dr-recovery
//!       selector:
//!         matchLabels:
//!           vm.kubevirt.io/name: db-vm
//!     connection:
//!       username: cloud-user
//!       privateKeyPath: /etc/mendy/keys/id_ed25519
//!     interface:
//!       name: eth1
//!       address: 192.168.160.120/24
//!       gateway: 192.168.160.1
//!       nameservers: [8.8.8.8]
//! ```

use crate::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_SSH_PORT};
use crate::discovery::DiscoveryQuery;
use crate::errors::ConfigError;
use crate::netstate::{CidrAddress, DesiredInterfaceState};
use crate::retry::RetryTuning;
use crate::selector::LabelSelector;
use crate::session::ConnectionParams;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Maximum kernel interface name length (IFNAMSIZ minus the terminator).
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// The run file as written on disk. All leaf fields are optional so that
/// validation, not the YAML parser, reports what is missing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFile {
    /// Remediation targets, one per virtual machine being recovered
    #[serde(default)]
    pub targets: Vec<TargetConfig>,

    /// Optional discovery retry tuning shared by all targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_retry: Option<RetryConfig>,
}

/// One remediation target as configured.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    /// Name of the target, used in logs and summaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// How to find the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryConfig>,

    /// How to reach the guest once found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,

    /// Desired state of the machine-network interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<InterfaceConfig>,
}

/// Discovery query configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfig {
    /// Namespace holding the VirtualMachineInstance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Label selector that must match exactly one instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

/// Guest connection configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Username to authenticate as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Path to the SSH private key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,

    /// SSH port (default 22)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// TCP connect timeout in seconds (default 30)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

/// Desired interface state as configured.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceConfig {
    /// Interface name inside the guest (e.g. "eth1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Static address in slash notation (e.g. "192.168.160.120/24")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Gateway address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,

    /// Ordered name-server addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Vec<String>>,
}

/// Discovery retry tuning as configured.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Total retry budget in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_elapsed_secs: Option<u64>,

    /// Initial retry interval in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_interval_millis: Option<u64>,

    /// Maximum retry interval in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interval_secs: Option<u64>,
}

/// A fully validated remediation target, ready to run.
#[derive(Clone, Debug)]
pub struct TargetPlan {
    /// Target name
    pub name: String,
    /// Validated discovery query
    pub query: DiscoveryQuery,
    /// Validated connection parameters
    pub connection: ConnectionParams,
    /// Validated desired interface state
    pub desired: DesiredInterfaceState,
}

/// A fully validated run: every target plus shared retry tuning.
#[derive(Clone, Debug)]
pub struct RunPlan {
    /// Validated targets
    pub targets: Vec<TargetPlan>,
    /// Discovery retry tuning
    pub retry: RetryTuning,
}

/// Read a run file from disk.
///
/// # Errors
///
/// [`ConfigError::UnreadableFile`] for I/O failures and
/// [`ConfigError::Malformed`] when the YAML does not fit the schema.
pub fn load(path: &Path) -> Result<RunFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::UnreadableFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let file: RunFile = serde_yaml::from_str(&raw).map_err(|e| ConfigError::Malformed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    debug!(path = %path.display(), targets = file.targets.len(), "Loaded run configuration");

    Ok(file)
}

/// Read and validate a run file in one step.
///
/// # Errors
///
/// Any [`ConfigError`]; nothing network-facing has happened yet when this
/// fails.
pub fn load_and_validate(path: &Path) -> Result<RunPlan, ConfigError> {
    load(path)?.validate()
}

impl RunFile {
    /// Validate the file and produce typed run plans.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered; targets are checked in
    /// declaration order.
    pub fn validate(&self) -> Result<RunPlan, ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.targets.len());

        for (index, target) in self.targets.iter().enumerate() {
            let plan = validate_target(index, target)?;

            if !seen.insert(plan.name.clone()) {
                return Err(ConfigError::DuplicateTarget { name: plan.name });
            }
            targets.push(plan);
        }

        Ok(RunPlan {
            targets,
            retry: self.retry_tuning(),
        })
    }

    /// Resolve the discovery retry tuning, falling back to defaults.
    #[must_use]
    pub fn retry_tuning(&self) -> RetryTuning {
        let defaults = RetryTuning::default();
        let Some(ref retry) = self.discovery_retry else {
            return defaults;
        };

        RetryTuning {
            initial_interval: retry
                .initial_interval_millis
                .map_or(defaults.initial_interval, Duration::from_millis),
            max_interval: retry
                .max_interval_secs
                .map_or(defaults.max_interval, Duration::from_secs),
            max_elapsed: retry
                .max_elapsed_secs
                .map_or(defaults.max_elapsed, Duration::from_secs),
        }
    }
}

/// Validate one target into a plan.
fn validate_target(index: usize, target: &TargetConfig) -> Result<TargetPlan, ConfigError> {
    let fallback = format!("targets[{index}]");
    let name = required_string(&fallback, "name", target.name.as_deref())?;

    let discovery = target
        .discovery
        .as_ref()
        .ok_or_else(|| missing(&name, "discovery"))?;
    let connection = target
        .connection
        .as_ref()
        .ok_or_else(|| missing(&name, "connection"))?;
    let interface = target
        .interface
        .as_ref()
        .ok_or_else(|| missing(&name, "interface"))?;

    Ok(TargetPlan {
        query: validate_discovery(&name, discovery)?,
        connection: validate_connection(&name, connection)?,
        desired: validate_interface(&name, interface)?,
        name,
    })
}

fn validate_discovery(
    target: &str,
    discovery: &DiscoveryConfig,
) -> Result<DiscoveryQuery, ConfigError> {
    let namespace = required_string(target, "discovery.namespace", discovery.namespace.as_deref())?;

    let selector = discovery
        .selector
        .clone()
        .ok_or_else(|| missing(target, "discovery.selector"))?;
    if selector.is_empty() {
        // An empty selector matches every instance in the namespace, which
        // can never satisfy the exactly-one contract
        return Err(invalid(
            target,
            "discovery.selector",
            "selector is empty; it must narrow the query to exactly one instance",
        ));
    }

    let selector_string = selector
        .to_api_selector()
        .map_err(|e| invalid(target, "discovery.selector", &e.to_string()))?;

    Ok(DiscoveryQuery {
        namespace,
        selector,
        selector_string,
    })
}

fn validate_connection(
    target: &str,
    connection: &ConnectionConfig,
) -> Result<ConnectionParams, ConfigError> {
    let username = required_string(target, "connection.username", connection.username.as_deref())?;

    let private_key_path = connection
        .private_key_path
        .clone()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| missing(target, "connection.privateKeyPath"))?;

    let port = connection.port.unwrap_or(DEFAULT_SSH_PORT);
    if port == 0 {
        return Err(invalid(target, "connection.port", "port must be non-zero"));
    }

    let timeout_secs = connection
        .connect_timeout_secs
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(invalid(
            target,
            "connection.connectTimeoutSecs",
            "timeout must be non-zero",
        ));
    }

    Ok(ConnectionParams {
        username,
        private_key_path,
        port,
        connect_timeout: Duration::from_secs(timeout_secs),
    })
}

fn validate_interface(
    target: &str,
    interface: &InterfaceConfig,
) -> Result<DesiredInterfaceState, ConfigError> {
    let name = required_string(target, "interface.name", interface.name.as_deref())?;
    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(invalid(
            target,
            "interface.name",
            "interface names are limited to 15 characters",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid(
            target,
            "interface.name",
            "interface names may only contain alphanumerics, '-', '_' and '.'",
        ));
    }

    let address_raw = required_string(target, "interface.address", interface.address.as_deref())?;
    let address: CidrAddress = address_raw
        .parse()
        .map_err(|e: crate::netstate::CidrParseError| {
            invalid(target, "interface.address", &e.to_string())
        })?;
    require_ipv4(target, "interface.address", address.addr)?;

    let gateway_raw = required_string(target, "interface.gateway", interface.gateway.as_deref())?;
    let gateway: IpAddr = gateway_raw
        .parse()
        .map_err(|_| invalid(target, "interface.gateway", "not a valid IP address"))?;
    require_ipv4(target, "interface.gateway", gateway)?;

    let nameservers_raw = interface
        .nameservers
        .as_ref()
        .filter(|servers| !servers.is_empty())
        .ok_or_else(|| missing(target, "interface.nameservers"))?;

    let mut nameservers = Vec::with_capacity(nameservers_raw.len());
    for raw in nameservers_raw {
        let server: IpAddr = raw.parse().map_err(|_| {
            invalid(
                target,
                "interface.nameservers",
                &format!("'{raw}' is not a valid IP address"),
            )
        })?;
        require_ipv4(target, "interface.nameservers", server)?;
        nameservers.push(server);
    }

    Ok(DesiredInterfaceState {
        interface: name,
        address,
        gateway,
        nameservers,
    })
}

/// Machine-network remediation drives the IPv4 configuration of the guest
/// interface; v6 desired state is rejected up front rather than half-applied.
fn require_ipv4(target: &str, field: &str, addr: IpAddr) -> Result<(), ConfigError> {
    if addr.is_ipv4() {
        Ok(())
    } else {
        Err(invalid(
            target,
            field,
            "machine-network remediation requires IPv4 addresses",
        ))
    }
}

fn required_string(
    target: &str,
    field: &str,
    value: Option<&str>,
) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(missing(target, field)),
    }
}

fn missing(target: &str, field: &str) -> ConfigError {
    ConfigError::MissingField {
        target: target.to_string(),
        field: field.to_string(),
    }
}

fn invalid(target: &str, field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        target: target.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
