// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Endpoint discovery: label selector → exactly one transient address.
//!
//! The discovery stage queries the Kubernetes API for the
//! VirtualMachineInstance matching the configured selector and extracts the
//! transient pod-network address from its status. The contract is strict:
//! zero matches and multiple matches both fail the run — guessing at a
//! recovery target is worse than stopping. The one retried condition is an
//! instance whose status has not populated an address yet, since address
//! assignment is asynchronous relative to resource creation.

use crate::errors::DiscoveryError;
use crate::retry::{discovery_backoff, RetryTuning};
use crate::selector::LabelSelector;
use crate::vmi::VirtualMachineInstance;
use async_trait::async_trait;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// The orchestration query interface consumed by the workflow.
///
/// The workflow depends only on "selector + namespace → exactly one
/// endpoint"; production runs use [`KubeDiscoverer`], tests substitute an
/// in-memory implementation.
#[async_trait]
pub trait EndpointDiscoverer: Send + Sync {
    /// Resolve a query to exactly one endpoint, or fail.
    async fn discover(
        &self,
        query: &DiscoveryQuery,
        tuning: &RetryTuning,
    ) -> Result<DiscoveredEndpoint, DiscoveryError>;
}

/// Kubernetes-backed [`EndpointDiscoverer`].
#[derive(Clone)]
pub struct KubeDiscoverer {
    client: Client,
}

impl KubeDiscoverer {
    /// Wrap a Kubernetes client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EndpointDiscoverer for KubeDiscoverer {
    async fn discover(
        &self,
        query: &DiscoveryQuery,
        tuning: &RetryTuning,
    ) -> Result<DiscoveredEndpoint, DiscoveryError> {
        discover(self.client.clone(), query, tuning).await
    }
}

/// A label selector plus namespace identifying exactly one live instance.
///
/// Immutable, constructed from validated static configuration at run start.
#[derive(Clone, Debug)]
pub struct DiscoveryQuery {
    /// Namespace to query
    pub namespace: String,
    /// The selector as configured
    pub selector: LabelSelector,
    /// The selector rendered in list-API syntax
    pub selector_string: String,
}

/// Result of a successful discovery: a transient address bound to the
/// matched instance.
///
/// Created fresh each run, never persisted, discarded at end of run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredEndpoint {
    /// Name of the matched VirtualMachineInstance
    pub name: String,
    /// The transient pod-network address extracted from its status
    pub address: IpAddr,
}

/// Discover the remediation endpoint for a query.
///
/// Retries only the missing-address case, with bounded exponential backoff;
/// `NotFound` and `Ambiguous` fail immediately since both need an operator
/// (confirm the instance is running, or narrow the selector) rather than a
/// retry.
///
/// # Errors
///
/// See [`DiscoveryError`]; every variant is terminal for the run.
pub async fn discover(
    client: Client,
    query: &DiscoveryQuery,
    tuning: &RetryTuning,
) -> Result<DiscoveredEndpoint, DiscoveryError> {
    let api: Api<VirtualMachineInstance> = Api::namespaced(client, &query.namespace);
    let mut backoff = discovery_backoff(tuning);

    loop {
        match discover_once(&api, query).await {
            Ok(endpoint) => {
                info!(
                    vmi = %endpoint.name,
                    namespace = %query.namespace,
                    address = %endpoint.address,
                    "Discovered remediation endpoint"
                );
                return Ok(endpoint);
            }
            Err(DiscoveryError::MissingAddress {
                name, namespace, ..
            }) => match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        vmi = %name,
                        namespace = %namespace,
                        retry_after = ?delay,
                        "Instance found but status has no address yet, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(DiscoveryError::MissingAddress {
                        name,
                        namespace,
                        waited_secs: backoff.elapsed().as_secs(),
                    });
                }
            },
            Err(e) => return Err(e),
        }
    }
}

/// One discovery attempt: list, enforce exactly-one, extract the address.
async fn discover_once(
    api: &Api<VirtualMachineInstance>,
    query: &DiscoveryQuery,
) -> Result<DiscoveredEndpoint, DiscoveryError> {
    debug!(
        selector = %query.selector_string,
        namespace = %query.namespace,
        "Listing VirtualMachineInstances"
    );

    let lp = ListParams::default().labels(&query.selector_string);
    let instances = api
        .list(&lp)
        .await
        .map_err(|e| DiscoveryError::QueryFailed {
            selector: query.selector_string.clone(),
            namespace: query.namespace.clone(),
            reason: e.to_string(),
        })?;

    classify(instances.items, query)
}

/// Enforce the exactly-one contract on a list result.
fn classify(
    mut items: Vec<VirtualMachineInstance>,
    query: &DiscoveryQuery,
) -> Result<DiscoveredEndpoint, DiscoveryError> {
    match items.len() {
        0 => Err(DiscoveryError::NotFound {
            selector: query.selector_string.clone(),
            namespace: query.namespace.clone(),
        }),
        1 => {
            let vmi = items.remove(0);
            let name = vmi.name_any();

            match vmi.transient_address() {
                Some(address) => Ok(DiscoveredEndpoint { name, address }),
                None => {
                    debug!(
                        vmi = %name,
                        phase = %vmi.phase(),
                        "Matched instance has no status address"
                    );
                    Err(DiscoveryError::MissingAddress {
                        name,
                        namespace: query.namespace.clone(),
                        waited_secs: 0,
                    })
                }
            }
        }
        count => Err(DiscoveryError::Ambiguous {
            selector: query.selector_string.clone(),
            namespace: query.namespace.clone(),
            count,
            names: items.iter().map(ResourceExt::name_any).collect(),
        }),
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod discovery_tests;
