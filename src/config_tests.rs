// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

use super::*;
use crate::errors::ConfigError;
use std::io::Write;

const VALID_RUN_FILE: &str = r"
targets:
  - name: db-vm
    discovery:
      namespace: dr-recovery
      selector:
        matchLabels:
          vm.kubevirt.io/name: db-vm
    connection:
      username: cloud-user
      privateKeyPath: /etc/mendy/keys/id_ed25519
    interface:
      name: eth1
      address: 192.168.160.120/24
      gateway: 192.168.160.1
      nameservers: [8.8.8.8]
";

fn parse(yaml: &str) -> RunFile {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn test_valid_run_file_produces_plan() {
    let plan = parse(VALID_RUN_FILE).validate().unwrap();

    assert_eq!(plan.targets.len(), 1);
    let target = &plan.targets[0];
    assert_eq!(target.name, "db-vm");
    assert_eq!(target.query.namespace, "dr-recovery");
    assert_eq!(target.query.selector_string, "vm.kubevirt.io/name=db-vm");
    assert_eq!(target.connection.username, "cloud-user");
    assert_eq!(target.connection.port, 22);
    assert_eq!(target.connection.connect_timeout, Duration::from_secs(30));
    assert_eq!(target.desired.interface, "eth1");
    assert_eq!(
        target.desired.address,
        "192.168.160.120/24".parse().unwrap()
    );
    assert_eq!(plan.retry, RetryTuning::default());
}

#[test]
fn test_load_and_validate_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(VALID_RUN_FILE.as_bytes()).unwrap();

    let plan = load_and_validate(file.path()).unwrap();
    assert_eq!(plan.targets[0].name, "db-vm");
}

#[test]
fn test_load_missing_file_is_unreadable() {
    let err = load(Path::new("/nonexistent/mendy-run.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::UnreadableFile { .. }));
}

#[test]
fn test_load_invalid_yaml_is_malformed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"targets: [not, {a: run, file").unwrap();

    let err = load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { .. }));
}

#[test]
fn test_empty_targets_rejected() {
    let err = parse("targets: []").validate().unwrap_err();
    assert!(matches!(err, ConfigError::NoTargets));
}

#[test]
fn test_duplicate_target_names_rejected() {
    let yaml = format!(
        "{VALID_RUN_FILE}
  - name: db-vm
    discovery:
      namespace: dr-recovery
      selector:
        matchLabels:
          app: other
    connection:
      username: cloud-user
      privateKeyPath: /etc/mendy/keys/id_ed25519
    interface:
      name: eth1
      address: 192.168.161.120/24
      gateway: 192.168.161.1
      nameservers: [8.8.8.8]
"
    );

    let err = parse(&yaml).validate().unwrap_err();
    match err {
        ConfigError::DuplicateTarget { name } => assert_eq!(name, "db-vm"),
        other => panic!("expected DuplicateTarget, got {other:?}"),
    }
}

#[test]
fn test_missing_name_reports_index() {
    let yaml = r"
targets:
  - discovery:
      namespace: dr-recovery
";

    let err = parse(yaml).validate().unwrap_err();
    match err {
        ConfigError::MissingField { target, field } => {
            assert_eq!(target, "targets[0]");
            assert_eq!(field, "name");
        }
        other => panic!("expected MissingField, got {other:?}"),
    }
}

#[test]
fn test_missing_sections_reported_per_target() {
    let yaml = r"
targets:
  - name: db-vm
    discovery:
      namespace: dr-recovery
      selector:
        matchLabels:
          app: db
";

    let err = parse(yaml).validate().unwrap_err();
    match err {
        ConfigError::MissingField { target, field } => {
            assert_eq!(target, "db-vm");
            assert_eq!(field, "connection");
        }
        other => panic!("expected MissingField, got {other:?}"),
    }
}

#[test]
fn test_empty_selector_rejected() {
    let yaml = VALID_RUN_FILE.replace(
        "      selector:
        matchLabels:
          vm.kubevirt.io/name: db-vm",
        "      selector: {}",
    );

    let err = parse(&yaml).validate().unwrap_err();
    match err {
        ConfigError::InvalidValue { field, reason, .. } => {
            assert_eq!(field, "discovery.selector");
            assert!(reason.contains("exactly one"));
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn test_bad_address_rejected() {
    let yaml = VALID_RUN_FILE.replace("192.168.160.120/24", "192.168.160.120");

    let err = parse(&yaml).validate().unwrap_err();
    match err {
        ConfigError::InvalidValue { field, .. } => assert_eq!(field, "interface.address"),
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn test_ipv6_desired_state_rejected() {
    let yaml = VALID_RUN_FILE.replace("192.168.160.120/24", "2001:db8::10/64");

    let err = parse(&yaml).validate().unwrap_err();
    match err {
        ConfigError::InvalidValue { field, reason, .. } => {
            assert_eq!(field, "interface.address");
            assert!(reason.contains("IPv4"));
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn test_missing_nameservers_rejected() {
    let yaml = VALID_RUN_FILE.replace("      nameservers: [8.8.8.8]\n", "");

    let err = parse(&yaml).validate().unwrap_err();
    match err {
        ConfigError::MissingField { field, .. } => assert_eq!(field, "interface.nameservers"),
        other => panic!("expected MissingField, got {other:?}"),
    }
}

#[test]
fn test_overlong_interface_name_rejected() {
    let yaml = VALID_RUN_FILE.replace("name: eth1", "name: a-very-long-interface");

    let err = parse(&yaml).validate().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn test_interface_name_charset_enforced() {
    let yaml = VALID_RUN_FILE.replace("name: eth1", "name: 'eth1; rm -rf'");

    let err = parse(&yaml).validate().unwrap_err();
    match err {
        ConfigError::InvalidValue { field, .. } => assert_eq!(field, "interface.name"),
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn test_retry_tuning_overrides() {
    let yaml = format!(
        "{VALID_RUN_FILE}
discoveryRetry:
  maxElapsedSecs: 60
  initialIntervalMillis: 250
"
    );

    let plan = parse(&yaml).validate().unwrap();
    assert_eq!(plan.retry.max_elapsed, Duration::from_secs(60));
    assert_eq!(plan.retry.initial_interval, Duration::from_millis(250));
    // Unset knob keeps its default
    assert_eq!(plan.retry.max_interval, Duration::from_secs(15));
}

#[test]
fn test_connection_defaults_and_overrides() {
    let yaml = VALID_RUN_FILE.replace(
        "      privateKeyPath: /etc/mendy/keys/id_ed25519",
        "      privateKeyPath: /etc/mendy/keys/id_ed25519
      port: 2222
      connectTimeoutSecs: 5",
    );

    let plan = parse(&yaml).validate().unwrap();
    assert_eq!(plan.targets[0].connection.port, 2222);
    assert_eq!(
        plan.targets[0].connection.connect_timeout,
        Duration::from_secs(5)
    );
}

#[test]
fn test_zero_port_rejected() {
    let yaml = VALID_RUN_FILE.replace(
        "      privateKeyPath: /etc/mendy/keys/id_ed25519",
        "      privateKeyPath: /etc/mendy/keys/id_ed25519
      port: 0",
    );

    let err = parse(&yaml).validate().unwrap_err();
    match err {
        ConfigError::InvalidValue { field, .. } => assert_eq!(field, "connection.port"),
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}
