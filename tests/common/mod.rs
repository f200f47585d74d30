// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities: an in-memory guest farm standing in for SSH-reachable
//! virtual machines, plus a scripted endpoint discoverer.
//!
//! The fake guest understands exactly the NetworkManager commands mendy
//! generates — `device show`, `connection modify`, `connection add`,
//! `connection up` — and mutates its state accordingly, so the full
//! discover/remediate pipeline can be exercised without a cluster or a
//! guest.

use async_trait::async_trait;
use mendy::discovery::{DiscoveredEndpoint, DiscoveryQuery, EndpointDiscoverer};
use mendy::errors::{DiscoveryError, SessionError};
use mendy::retry::RetryTuning;
use mendy::session::{CommandOutput, CommandRunner, ConnectionParams, Connector};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

/// Live network state of one fake guest interface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuestState {
    pub connection: Option<String>,
    pub addresses: Vec<String>,
    pub gateway: Option<String>,
    pub nameservers: Vec<String>,
    pub up: bool,
}

/// One fake guest: an interface name plus its mutable state.
#[derive(Clone)]
pub struct FakeGuest {
    pub interface: String,
    pub state: Arc<Mutex<GuestState>>,
}

impl FakeGuest {
    pub fn bare(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            state: Arc::new(Mutex::new(GuestState::default())),
        }
    }

    pub fn with_state(interface: &str, state: GuestState) -> Self {
        Self {
            interface: interface.to_string(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn snapshot(&self) -> GuestState {
        self.state.lock().unwrap().clone()
    }
}

/// A set of fake guests addressable by IP, plus a record of who connected.
#[derive(Default)]
pub struct GuestFarm {
    guests: BTreeMap<String, FakeGuest>,
    connects: Mutex<Vec<(String, String)>>,
}

impl GuestFarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_guest(&mut self, address: &str, guest: FakeGuest) {
        self.guests.insert(address.to_string(), guest);
    }

    pub fn connects(&self) -> Vec<(String, String)> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for GuestFarm {
    type Runner = GuestRunner;

    async fn connect(
        &self,
        address: IpAddr,
        params: &ConnectionParams,
    ) -> Result<Self::Runner, SessionError> {
        let key = address.to_string();

        let Some(guest) = self.guests.get(&key) else {
            return Err(SessionError::ConnectFailed {
                address: key,
                port: params.port,
                reason: "no route to host".to_string(),
            });
        };

        self.connects
            .lock()
            .unwrap()
            .push((key, params.username.clone()));

        Ok(GuestRunner {
            guest: guest.clone(),
        })
    }
}

/// Command runner bound to one fake guest.
pub struct GuestRunner {
    guest: FakeGuest,
}

#[async_trait]
impl CommandRunner for GuestRunner {
    async fn run(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
        Ok(self.guest.handle(command))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}

impl FakeGuest {
    /// Interpret one nmcli invocation against the guest state.
    fn handle(&self, command: &str) -> CommandOutput {
        if command.starts_with("nmcli -t -f") && command.contains(" device show ") {
            return self.handle_device_show(command);
        }
        if command.starts_with("nmcli connection modify ") {
            return self.handle_modify(command);
        }
        if command.starts_with("nmcli connection add ") {
            return self.handle_add(command);
        }
        if command.starts_with("nmcli connection up ") {
            return self.handle_up(command);
        }

        failure(2, &format!("Error: unknown command: {command}"))
    }

    fn handle_device_show(&self, command: &str) -> CommandOutput {
        if !command.ends_with(&format!("device show '{}'", self.interface)) {
            return failure(10, "Error: Device not found.");
        }

        let state = self.state.lock().unwrap();
        let mut out = String::new();
        out.push_str(&format!(
            "GENERAL.CONNECTION:{}\n",
            state.connection.as_deref().unwrap_or("")
        ));
        for (i, addr) in state.addresses.iter().enumerate() {
            out.push_str(&format!("IP4.ADDRESS[{}]:{addr}\n", i + 1));
        }
        out.push_str(&format!(
            "IP4.GATEWAY:{}\n",
            state.gateway.as_deref().unwrap_or("")
        ));
        for (i, server) in state.nameservers.iter().enumerate() {
            out.push_str(&format!("IP4.DNS[{}]:{server}\n", i + 1));
        }

        success(&out)
    }

    fn handle_modify(&self, command: &str) -> CommandOutput {
        let mut state = self.state.lock().unwrap();
        let Some(profile) = first_quoted(command) else {
            return failure(2, "Error: no connection given.");
        };
        if state.connection.as_deref() != Some(profile.as_str()) {
            return failure(10, "Error: unknown connection.");
        }

        apply_settings(&mut state, command);
        success("")
    }

    fn handle_add(&self, command: &str) -> CommandOutput {
        let mut state = self.state.lock().unwrap();

        let Some(ifname) = quoted_arg(command, "ifname") else {
            return failure(2, "Error: ifname is required.");
        };
        if ifname != self.interface {
            return failure(10, "Error: Device not found.");
        }
        let Some(profile) = quoted_arg(command, "con-name") else {
            return failure(2, "Error: con-name is required.");
        };

        state.connection = Some(profile);
        apply_settings(&mut state, command);
        success("")
    }

    fn handle_up(&self, command: &str) -> CommandOutput {
        let mut state = self.state.lock().unwrap();
        let Some(profile) = first_quoted(command) else {
            return failure(2, "Error: no connection given.");
        };
        if state.connection.as_deref() != Some(profile.as_str()) {
            return failure(10, "Error: unknown connection.");
        }

        state.up = true;
        success("Connection successfully activated")
    }
}

/// Copy the ipv4.* settings out of a modify/add command into the state.
fn apply_settings(state: &mut GuestState, command: &str) {
    if let Some(address) = quoted_arg(command, "ipv4.addresses") {
        state.addresses = vec![address];
    }
    if let Some(gateway) = quoted_arg(command, "ipv4.gateway") {
        state.gateway = Some(gateway);
    }
    if let Some(dns) = quoted_arg(command, "ipv4.dns") {
        state.nameservers = dns
            .split(',')
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();
    }
}

/// Extract the single-quoted value following `key `, e.g. `ifname 'eth1'`.
fn quoted_arg(command: &str, key: &str) -> Option<String> {
    let marker = format!("{key} '");
    let start = command.find(&marker)? + marker.len();
    let rest = &command[start..];
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

/// Extract the first single-quoted value in the command.
fn first_quoted(command: &str) -> Option<String> {
    let start = command.find('\'')? + 1;
    let rest = &command[start..];
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

fn success(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn failure(exit_code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Endpoint discoverer answering from a fixed selector → result table.
#[derive(Default)]
pub struct TableDiscoverer {
    results: BTreeMap<String, Result<DiscoveredEndpoint, DiscoveryError>>,
}

impl TableDiscoverer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, selector: &str, vmi_name: &str, address: &str) -> Self {
        self.results.insert(
            selector.to_string(),
            Ok(DiscoveredEndpoint {
                name: vmi_name.to_string(),
                address: address.parse().unwrap(),
            }),
        );
        self
    }

    pub fn error(mut self, selector: &str, error: DiscoveryError) -> Self {
        self.results.insert(selector.to_string(), Err(error));
        self
    }
}

#[async_trait]
impl EndpointDiscoverer for TableDiscoverer {
    async fn discover(
        &self,
        query: &DiscoveryQuery,
        _tuning: &RetryTuning,
    ) -> Result<DiscoveredEndpoint, DiscoveryError> {
        self.results
            .get(&query.selector_string)
            .cloned()
            .unwrap_or_else(|| {
                Err(DiscoveryError::NotFound {
                    selector: query.selector_string.clone(),
                    namespace: query.namespace.clone(),
                })
            })
    }
}
