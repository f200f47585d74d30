// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `nmcli.rs`

use super::*;

fn desired() -> DesiredInterfaceState {
    DesiredInterfaceState {
        interface: "eth1".to_string(),
        address: "192.168.160.120/24".parse().unwrap(),
        gateway: "192.168.160.1".parse().unwrap(),
        nameservers: vec!["8.8.8.8".parse().unwrap()],
    }
}

#[test]
fn test_device_show_command() {
    assert_eq!(
        device_show_command("eth1"),
        "nmcli -t -f GENERAL.CONNECTION,IP4.ADDRESS,IP4.GATEWAY,IP4.DNS device show 'eth1'"
    );
}

#[test]
fn test_parse_device_show_full_state() {
    let output = "\
GENERAL.CONNECTION:eth1
IP4.ADDRESS[1]:192.168.160.120/24
IP4.GATEWAY:192.168.160.1
IP4.DNS[1]:8.8.8.8
IP4.DNS[2]:8.8.4.4
";

    let state = parse_device_show(output).unwrap();
    assert_eq!(state.connection.as_deref(), Some("eth1"));
    assert_eq!(state.addresses, vec!["192.168.160.120/24".parse().unwrap()]);
    assert_eq!(state.gateway, Some("192.168.160.1".parse().unwrap()));
    assert_eq!(
        state.nameservers,
        vec![
            "8.8.8.8".parse::<std::net::IpAddr>().unwrap(),
            "8.8.4.4".parse().unwrap()
        ]
    );
}

#[test]
fn test_parse_device_show_bare_interface() {
    // A freshly restored interface: no profile, no address, no gateway
    let output = "\
GENERAL.CONNECTION:
IP4.GATEWAY:
";

    let state = parse_device_show(output).unwrap();
    assert_eq!(state.connection, None);
    assert!(state.addresses.is_empty());
    assert_eq!(state.gateway, None);
    assert!(state.nameservers.is_empty());
}

#[test]
fn test_parse_device_show_treats_dashes_as_no_connection() {
    let state = parse_device_show("GENERAL.CONNECTION:--\n").unwrap();
    assert_eq!(state.connection, None);
}

#[test]
fn test_parse_device_show_multiple_addresses() {
    let output = "\
GENERAL.CONNECTION:Wired connection 1
IP4.ADDRESS[1]:192.168.160.120/24
IP4.ADDRESS[2]:10.0.0.9/16
";

    let state = parse_device_show(output).unwrap();
    assert_eq!(state.connection.as_deref(), Some("Wired connection 1"));
    assert_eq!(state.addresses.len(), 2);
}

#[test]
fn test_parse_device_show_rejects_garbage_address() {
    let err = parse_device_show("IP4.ADDRESS[1]:not-an-address\n").unwrap_err();
    assert!(err.to_string().contains("unparseable address"));
}

#[test]
fn test_parse_device_show_ignores_unknown_fields() {
    let output = "\
GENERAL.CONNECTION:eth1
WIRED-PROPERTIES.CARRIER:on
IP4.ADDRESS[1]:192.168.160.120/24
";

    let state = parse_device_show(output).unwrap();
    assert_eq!(state.addresses.len(), 1);
}

#[test]
fn test_apply_commands_modifies_existing_profile() {
    let commands = apply_commands(Some("eth1"), &desired());

    assert_eq!(commands.len(), 2);
    assert_eq!(
        commands[0],
        "nmcli connection modify 'eth1' ipv4.method manual \
         ipv4.addresses '192.168.160.120/24' ipv4.gateway '192.168.160.1' ipv4.dns '8.8.8.8'"
    );
    assert_eq!(commands[1], "nmcli connection up 'eth1'");
}

#[test]
fn test_apply_commands_creates_profile_when_device_has_none() {
    let commands = apply_commands(None, &desired());

    assert!(commands[0].starts_with(
        "nmcli connection add type ethernet ifname 'eth1' con-name 'eth1' autoconnect yes"
    ));
    assert!(commands[0].contains("ipv4.method manual"));
    assert!(commands[0].contains("ipv4.addresses '192.168.160.120/24'"));
    assert_eq!(commands[1], "nmcli connection up 'eth1'");
}

#[test]
fn test_apply_commands_joins_nameservers_with_commas() {
    let mut want = desired();
    want.nameservers = vec!["8.8.8.8".parse().unwrap(), "8.8.4.4".parse().unwrap()];

    let commands = apply_commands(Some("eth1"), &want);
    assert!(commands[0].contains("ipv4.dns '8.8.8.8,8.8.4.4'"));
}

#[test]
fn test_apply_commands_quotes_profile_with_spaces() {
    let commands = apply_commands(Some("Wired connection 1"), &desired());

    assert!(commands[0].contains("modify 'Wired connection 1'"));
    assert_eq!(commands[1], "nmcli connection up 'Wired connection 1'");
}

#[test]
fn test_check_exit_passes_zero() {
    assert!(check_exit("nmcli connection up 'eth1'", 0, "").is_ok());
}

#[test]
fn test_check_exit_carries_stderr() {
    let err = check_exit(
        "nmcli connection up 'eth1'",
        4,
        "Error: Connection activation failed",
    )
    .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("status 4"));
    assert!(msg.contains("Connection activation failed"));
}

#[test]
fn test_check_exit_without_stderr() {
    let err = check_exit("nmcli device show 'eth1'", 10, "  ").unwrap_err();
    assert_eq!(
        err.to_string(),
        "'nmcli device show 'eth1'' exited with status 10"
    );
}
