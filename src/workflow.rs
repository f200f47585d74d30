// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The two-stage recovery pipeline: discover, then remediate.
//!
//! Control flows strictly Discoverer → Remediator. The discovered endpoint
//! is registered in a run-scoped inventory and consumed directly by the
//! remediation stage — there is no shared global state, no feedback loop,
//! and nothing survives the run. Re-running the workflow restores the same
//! desired state regardless of what the interface looks like at the time.
//!
//! Targets are independent: [`run_all`] executes every configured target
//! concurrently, each with its own query, inventory, and session, and one
//! failed target never cancels the others.

use crate::config::{RunPlan, TargetPlan};
use crate::discovery::EndpointDiscoverer;
use crate::errors::{RemediationError, RunError};
use crate::inventory::{Inventory, RemediationTarget};
use crate::remediate::{remediate, ConvergenceState};
use crate::retry::RetryTuning;
use crate::session::{CommandRunner, Connector};
use tracing::{error, info, warn};

/// Result of one target's run: the pass/fail outcome plus, on success,
/// whether the interface was `Changed` or `Unchanged`.
#[derive(Debug)]
pub struct TargetOutcome {
    /// Configured target name
    pub target: String,
    /// The run result
    pub result: Result<ConvergenceState, RunError>,
}

impl TargetOutcome {
    /// True when the run completed (changed or unchanged).
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run the full pipeline for a single target.
///
/// The session is released on every exit path: explicitly after remediation
/// (success or failure), and by the session's own drop backstop if the run
/// is cancelled mid-flight.
///
/// # Errors
///
/// Any [`RunError`]; discovery failures (`NotFound`, `Ambiguous`, exhausted
/// `MissingAddress`) are returned before any connection attempt is made.
pub async fn run_target<D, C>(
    discoverer: &D,
    connector: &C,
    plan: &TargetPlan,
    retry: &RetryTuning,
    check_mode: bool,
) -> Result<ConvergenceState, RunError>
where
    D: EndpointDiscoverer,
    C: Connector,
{
    info!(
        target = %plan.name,
        namespace = %plan.query.namespace,
        selector = %plan.query.selector_string,
        interface = %plan.desired.interface,
        "Starting recovery run"
    );

    let endpoint = discoverer.discover(&plan.query, retry).await?;

    // Register the discovered address as this run's addressable entity; the
    // inventory lives and dies with the run.
    let mut inventory = Inventory::new();
    let target = inventory.register(RemediationTarget {
        name: plan.name.clone(),
        endpoint,
        connection: plan.connection.clone(),
        desired: plan.desired.clone(),
    });

    let mut runner = connector
        .connect(target.endpoint.address, &target.connection)
        .await
        .map_err(|e| RunError::Remediation(RemediationError::from_session_connect(e)))?;

    let result = remediate(&mut runner, &target.desired, check_mode).await;

    if let Err(e) = runner.close().await {
        warn!(target = %plan.name, error = %e, "Failed to close remediation session cleanly");
    }

    Ok(result?)
}

/// Run every target in the plan as an independent concurrent run.
///
/// Returns one [`TargetOutcome`] per target, in plan order.
pub async fn run_all<D, C>(
    discoverer: &D,
    connector: &C,
    plan: &RunPlan,
    check_mode: bool,
) -> Vec<TargetOutcome>
where
    D: EndpointDiscoverer,
    C: Connector,
{
    let runs = plan.targets.iter().map(|target| async {
        let result = run_target(discoverer, connector, target, &plan.retry, check_mode).await;

        match &result {
            Ok(state) => info!(target = %target.name, state = %state, "Recovery run finished"),
            Err(e) => error!(
                target = %target.name,
                reason = e.reason(),
                error = %e,
                "Recovery run failed"
            ),
        }

        TargetOutcome {
            target: target.name.clone(),
            result,
        }
    });

    futures::future::join_all(runs).await
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod workflow_tests;
