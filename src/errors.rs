// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the discovery and remediation workflow.
//!
//! This module provides specialized error types for:
//! - Static configuration loading and validation
//! - VirtualMachineInstance endpoint discovery
//! - Remote sessions and interface convergence
//!
//! Every error carries enough context (selector, namespace, target interface,
//! address) to diagnose a failed run without re-running it. All errors are
//! terminal for their run; the only condition absorbed internally is the
//! missing-address case within its bounded retry window.

use thiserror::Error;

/// Errors raised while loading or validating the static run configuration.
///
/// Configuration errors always fail before any network call is made.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The run file could not be read from disk
    #[error("Failed to read run configuration '{path}': {reason}")]
    UnreadableFile {
        /// Path to the configuration file
        path: String,
        /// Underlying I/O failure
        reason: String,
    },

    /// The run file is not valid YAML for the expected schema
    #[error("Failed to parse run configuration '{path}': {reason}")]
    Malformed {
        /// Path to the configuration file
        path: String,
        /// Parser failure detail
        reason: String,
    },

    /// The run file defines no remediation targets
    #[error("Run configuration defines no targets")]
    NoTargets,

    /// Two targets share the same name
    #[error("Duplicate target name '{name}' in run configuration")]
    DuplicateTarget {
        /// The duplicated target name
        name: String,
    },

    /// A required field is absent or empty
    #[error("Target '{target}': required field '{field}' is missing or empty")]
    MissingField {
        /// The target the field belongs to
        target: String,
        /// Dotted path of the offending field
        field: String,
    },

    /// A field is present but its value is not usable
    #[error("Target '{target}': invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The target the field belongs to
        target: String,
        /// Dotted path of the offending field
        field: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// Errors raised by the endpoint discovery stage.
///
/// Zero or multiple selector matches fail the run rather than guess; only the
/// unpopulated-address case is retried, because address assignment is
/// asynchronous relative to resource creation.
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    /// No VirtualMachineInstance matched the selector
    ///
    /// Not retried: an operator must confirm the target is actually running
    /// before remediation.
    #[error("No VirtualMachineInstance matched selector '{selector}' in namespace '{namespace}'")]
    NotFound {
        /// The label selector string that was queried
        selector: String,
        /// The namespace that was queried
        namespace: String,
    },

    /// More than one VirtualMachineInstance matched the selector
    ///
    /// Not retried: a selector that matches several instances is a
    /// configuration fix, not something to resolve automatically.
    #[error(
        "Selector '{selector}' in namespace '{namespace}' matched {count} \
         VirtualMachineInstances ({names:?}); exactly one is required"
    )]
    Ambiguous {
        /// The label selector string that was queried
        selector: String,
        /// The namespace that was queried
        namespace: String,
        /// How many instances matched
        count: usize,
        /// Names of the matched instances
        names: Vec<String>,
    },

    /// The instance exists but its status carries no usable address yet
    ///
    /// The only retryable discovery condition. Raised after the retry budget
    /// is exhausted.
    #[error(
        "VirtualMachineInstance '{namespace}/{name}' has not reported an interface \
         address after {waited_secs}s"
    )]
    MissingAddress {
        /// Name of the matched instance
        name: String,
        /// Namespace of the matched instance
        namespace: String,
        /// Total seconds spent waiting for the address
        waited_secs: u64,
    },

    /// The Kubernetes API query itself failed
    #[error("Failed to query VirtualMachineInstances with selector '{selector}' in namespace '{namespace}': {reason}")]
    QueryFailed {
        /// The label selector string that was queried
        selector: String,
        /// The namespace that was queried
        namespace: String,
        /// Underlying API failure
        reason: String,
    },
}

/// Errors raised by the remote session transport.
///
/// These are transport-level failures; the remediation stage maps them onto
/// the interface being converged before surfacing them.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// TCP connection or SSH handshake to the target failed
    #[error("Failed to connect to {address}:{port}: {reason}")]
    ConnectFailed {
        /// Target address
        address: String,
        /// Target port
        port: u16,
        /// Underlying failure
        reason: String,
    },

    /// The target refused the supplied credentials
    #[error("Authentication as '{username}' to {address}:{port} failed: {reason}")]
    AuthFailed {
        /// Target address
        address: String,
        /// Target port
        port: u16,
        /// Username presented to the target
        username: String,
        /// Underlying failure
        reason: String,
    },

    /// A remote command could not be executed or its channel broke
    #[error("Failed to execute remote command '{command}': {reason}")]
    ExecFailed {
        /// The command that was being run
        command: String,
        /// Underlying failure
        reason: String,
    },
}

/// Errors raised by the remediation stage.
///
/// Fatal for the run and surfaced verbatim; the calling automation layer may
/// re-launch the whole workflow later, by which time the address may have
/// changed again — discovery and remediation always run together.
#[derive(Error, Debug, Clone)]
pub enum RemediationError {
    /// A session to the discovered address could not be established
    #[error("Cannot establish a session to {address}:{port}: {reason}")]
    ConnectFailure {
        /// The discovered transient address
        address: String,
        /// Target port
        port: u16,
        /// Underlying failure
        reason: String,
    },

    /// The current configuration of the interface could not be read
    #[error("Failed to inspect interface '{interface}': {reason}")]
    InspectFailure {
        /// The interface being converged
        interface: String,
        /// Underlying failure
        reason: String,
    },

    /// The desired state could not be committed to the interface
    #[error("Failed to apply desired state to interface '{interface}': {reason}")]
    ApplyFailure {
        /// The interface being converged
        interface: String,
        /// Underlying failure
        reason: String,
    },
}

/// Composite error type for a single workflow run.
///
/// This is the primary error type returned by [`crate::workflow`] functions.
/// It provides a unified interface over the configuration, discovery, and
/// remediation stages.
#[derive(Error, Debug, Clone)]
pub enum RunError {
    /// Static configuration error (fails before any network call)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Endpoint discovery error
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Remediation error
    #[error(transparent)]
    Remediation(#[from] RemediationError),
}

impl RemediationError {
    /// Map a connect-phase session failure onto the remediation taxonomy.
    ///
    /// Authentication rejections count as connection failures: either way no
    /// usable session to the discovered address exists.
    #[must_use]
    pub fn from_session_connect(err: SessionError) -> Self {
        match err {
            SessionError::ConnectFailed {
                address,
                port,
                reason,
            } => Self::ConnectFailure {
                address,
                port,
                reason,
            },
            SessionError::AuthFailed {
                address,
                port,
                username,
                reason,
            } => Self::ConnectFailure {
                address,
                port,
                reason: format!("authentication as '{username}' failed: {reason}"),
            },
            SessionError::ExecFailed { command, reason } => Self::ConnectFailure {
                address: String::new(),
                port: 0,
                reason: format!("session failed before use ('{command}'): {reason}"),
            },
        }
    }
}

impl RunError {
    /// Returns true if this error is transient and the whole workflow may be
    /// re-launched with a reasonable chance of success.
    ///
    /// Only discovery-time conditions qualify: an address that has not
    /// populated yet, or an API query failure. Configuration errors and
    /// remediation failures need operator attention first.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Discovery(
                DiscoveryError::MissingAddress { .. } | DiscoveryError::QueryFailed { .. },
            ) => true,

            Self::Config(_)
            | Self::Discovery(DiscoveryError::NotFound { .. } | DiscoveryError::Ambiguous { .. })
            | Self::Remediation(_) => false,
        }
    }

    /// Returns a short reason code for this error.
    ///
    /// Used in run summaries so outcomes can be matched without parsing
    /// message strings.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigurationError",

            Self::Discovery(DiscoveryError::NotFound { .. }) => "NotFound",
            Self::Discovery(DiscoveryError::Ambiguous { .. }) => "Ambiguous",
            Self::Discovery(DiscoveryError::MissingAddress { .. }) => "MissingAddress",
            Self::Discovery(DiscoveryError::QueryFailed { .. }) => "QueryFailed",

            Self::Remediation(RemediationError::ConnectFailure { .. }) => "ConnectFailure",
            Self::Remediation(RemediationError::InspectFailure { .. }) => "InspectFailure",
            Self::Remediation(RemediationError::ApplyFailure { .. }) => "ApplyFailure",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
