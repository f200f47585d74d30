// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NetworkManager CLI command generation and output parsing.
//!
//! The remediation stage drives the guest through `nmcli`:
//! - Inspection runs `nmcli -t ... device show <iface>` and parses the terse
//!   `KEY:value` output into a [`CurrentInterfaceState`].
//! - Convergence modifies (or creates) the connection profile bound to the
//!   device and brings it up.
//!
//! Everything in this module is pure string work so the exact wire commands
//! are unit-testable without a guest.
//!
//! Remediation targets the IPv4 configuration of the machine network; the
//! profile is pinned to `ipv4.method manual` so a stale DHCP lease cannot
//! resurface after the next reboot.

use crate::netstate::{CidrAddress, CurrentInterfaceState, DesiredInterfaceState};
use anyhow::{bail, Context, Result};

/// Terse fields requested from `device show`.
const DEVICE_SHOW_FIELDS: &str = "GENERAL.CONNECTION,IP4.ADDRESS,IP4.GATEWAY,IP4.DNS";

/// Build the inspection command for a device.
///
/// Terse mode (`-t`) prints one `KEY:value` line per field, with multi-value
/// fields indexed (`IP4.ADDRESS[1]:...`), which is what
/// [`parse_device_show`] consumes.
#[must_use]
pub fn device_show_command(interface: &str) -> String {
    format!(
        "nmcli -t -f {DEVICE_SHOW_FIELDS} device show {}",
        shell_quote(interface)
    )
}

/// Parse terse `device show` output into the live interface state.
///
/// # Errors
///
/// Returns an error when a value that should be an address does not parse;
/// unknown keys are ignored so newer NetworkManager releases don't break
/// inspection.
pub fn parse_device_show(output: &str) -> Result<CurrentInterfaceState> {
    let mut state = CurrentInterfaceState::default();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        if key == "GENERAL.CONNECTION" {
            // nmcli prints an empty value ("--" in pretty mode) when the
            // device has no profile
            if !value.is_empty() && value != "--" {
                state.connection = Some(value.to_string());
            }
        } else if key.starts_with("IP4.ADDRESS") {
            if value.is_empty() {
                continue;
            }
            let addr: CidrAddress = value
                .parse()
                .with_context(|| format!("unparseable address in '{line}'"))?;
            state.addresses.push(addr);
        } else if key.starts_with("IP4.GATEWAY") {
            if value.is_empty() {
                continue;
            }
            let gateway = value
                .parse()
                .with_context(|| format!("unparseable gateway in '{line}'"))?;
            state.gateway = Some(gateway);
        } else if key.starts_with("IP4.DNS") {
            if value.is_empty() {
                continue;
            }
            let server = value
                .parse()
                .with_context(|| format!("unparseable name server in '{line}'"))?;
            state.nameservers.push(server);
        }
    }

    Ok(state)
}

/// Build the command sequence that converges a device to the desired state.
///
/// When the device already has a connection profile it is modified in place;
/// otherwise a profile named after the interface is created. The final
/// `connection up` activates the profile and brings the interface to its
/// "up" operational state.
#[must_use]
pub fn apply_commands(connection: Option<&str>, desired: &DesiredInterfaceState) -> Vec<String> {
    let dns = desired
        .nameservers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let settings = format!(
        "ipv4.method manual ipv4.addresses {} ipv4.gateway {} ipv4.dns {}",
        shell_quote(&desired.address.to_string()),
        shell_quote(&desired.gateway.to_string()),
        shell_quote(&dns),
    );

    let profile = connection.unwrap_or(desired.interface.as_str());

    let configure = match connection {
        Some(existing) => format!(
            "nmcli connection modify {} {settings}",
            shell_quote(existing)
        ),
        None => format!(
            "nmcli connection add type ethernet ifname {} con-name {} autoconnect yes {settings}",
            shell_quote(&desired.interface),
            shell_quote(profile),
        ),
    };

    let activate = format!("nmcli connection up {}", shell_quote(profile));

    vec![configure, activate]
}

/// Interpret an `nmcli` exit code, turning failures into errors that carry
/// the remote stderr.
///
/// # Errors
///
/// Returns an error for any non-zero exit code.
pub fn check_exit(command: &str, exit_code: i32, stderr: &str) -> Result<()> {
    if exit_code == 0 {
        return Ok(());
    }

    let detail = stderr.trim();
    if detail.is_empty() {
        bail!("'{command}' exited with status {exit_code}");
    }
    bail!("'{command}' exited with status {exit_code}: {detail}");
}

/// Quote a value for a POSIX shell command line.
///
/// Values are wrapped in single quotes with embedded single quotes escaped,
/// so profile names with spaces ("Wired connection 1") survive intact.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
#[path = "nmcli_tests.rs"]
mod nmcli_tests;
