// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state convergence of the target interface.
//!
//! The remediation stage inspects the live configuration of the named
//! interface, computes the difference against the declared state, and — only
//! when something differs — applies exactly the declared state and brings
//! the interface up. Applying the same desired state twice therefore yields
//! `Changed` then `Unchanged`.
//!
//! Check mode inspects and diffs but never applies, reporting what a real
//! run would have done.

use crate::errors::RemediationError;
use crate::netstate::{self, CurrentInterfaceState, DesiredInterfaceState};
use crate::nmcli;
use crate::session::CommandRunner;
use std::fmt;
use tracing::{debug, info};

/// Whether the interface had to be touched to reach the desired state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergenceState {
    /// The desired state was applied
    Changed,
    /// The interface already matched the desired state
    Unchanged,
}

impl fmt::Display for ConvergenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changed => write!(f, "Changed"),
            Self::Unchanged => write!(f, "Unchanged"),
        }
    }
}

/// Converge the named interface's live configuration to the desired state.
///
/// # Errors
///
/// [`RemediationError::InspectFailure`] when the current configuration
/// cannot be read, [`RemediationError::ApplyFailure`] when the desired state
/// cannot be committed. Both are fatal for the run and surfaced verbatim.
pub async fn remediate(
    runner: &mut dyn CommandRunner,
    desired: &DesiredInterfaceState,
    check_mode: bool,
) -> Result<ConvergenceState, RemediationError> {
    let current = inspect(runner, desired).await?;
    let diff = netstate::diff(&current, desired);

    if diff.is_empty() {
        info!(
            interface = %desired.interface,
            "Interface already matches desired state"
        );
        return Ok(ConvergenceState::Unchanged);
    }

    info!(
        interface = %desired.interface,
        differs = %diff.summary(),
        "Interface drifted from desired state"
    );

    if check_mode {
        info!(
            interface = %desired.interface,
            "Check mode: skipping apply"
        );
        return Ok(ConvergenceState::Changed);
    }

    apply(runner, current.connection.as_deref(), desired).await?;

    info!(
        interface = %desired.interface,
        address = %desired.address,
        "Applied desired state and activated interface"
    );

    Ok(ConvergenceState::Changed)
}

/// Read the live configuration of the interface.
async fn inspect(
    runner: &mut dyn CommandRunner,
    desired: &DesiredInterfaceState,
) -> Result<CurrentInterfaceState, RemediationError> {
    let command = nmcli::device_show_command(&desired.interface);
    let inspect_err = |reason: String| RemediationError::InspectFailure {
        interface: desired.interface.clone(),
        reason,
    };

    let output = runner
        .run(&command)
        .await
        .map_err(|e| inspect_err(e.to_string()))?;
    nmcli::check_exit(&command, output.exit_code, &output.stderr)
        .map_err(|e| inspect_err(e.to_string()))?;

    let current =
        nmcli::parse_device_show(&output.stdout).map_err(|e| inspect_err(e.to_string()))?;

    debug!(
        interface = %desired.interface,
        addresses = ?current.addresses,
        gateway = ?current.gateway,
        "Inspected interface"
    );

    Ok(current)
}

/// Commit the desired state and bring the interface up.
async fn apply(
    runner: &mut dyn CommandRunner,
    connection: Option<&str>,
    desired: &DesiredInterfaceState,
) -> Result<(), RemediationError> {
    let apply_err = |reason: String| RemediationError::ApplyFailure {
        interface: desired.interface.clone(),
        reason,
    };

    for command in nmcli::apply_commands(connection, desired) {
        debug!(command = %command, "Applying");

        let output = runner
            .run(&command)
            .await
            .map_err(|e| apply_err(e.to_string()))?;
        nmcli::check_exit(&command, output.exit_code, &output.stderr)
            .map_err(|e| apply_err(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "remediate_tests.rs"]
mod remediate_tests;
