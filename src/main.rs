// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use kube::Client;
use mendy::{config, discovery::KubeDiscoverer, session::SshConnector, workflow};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Machine-network recovery for KubeVirt guests.
#[derive(Parser)]
#[command(name = "mendy", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover each target's transient address and converge its
    /// machine-network interface to the configured static state
    Run(RunArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to the run configuration file
    #[arg(short, long, default_value = "mendy.yaml")]
    config: PathBuf,

    /// Inspect and report what would change without applying anything
    #[arg(long)]
    check: bool,

    /// Only run the named target (repeatable); defaults to every target
    #[arg(long = "target", value_name = "NAME")]
    targets: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "mendy",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        Command::Run(args) => {
            // Build Tokio runtime with custom thread names
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .thread_name("mendy-run")
                .enable_all()
                .build()?;

            runtime.block_on(run(args))
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    init_logging();

    info!("Starting machine-network recovery");
    debug!(config = %args.config.display(), check = args.check, "Run parameters");

    let mut plan = config::load_and_validate(&args.config)?;

    if !args.targets.is_empty() {
        let known: HashSet<&str> = plan.targets.iter().map(|t| t.name.as_str()).collect();
        for name in &args.targets {
            if !known.contains(name.as_str()) {
                anyhow::bail!(
                    "unknown target '{name}': not defined in {}",
                    args.config.display()
                );
            }
        }
        plan.targets.retain(|t| args.targets.contains(&t.name));
    }

    info!(targets = plan.targets.len(), "Run configuration validated");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let discoverer = KubeDiscoverer::new(client);
    let connector = SshConnector;

    let outcomes = workflow::run_all(&discoverer, &connector, &plan, args.check).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(state) => info!(target = %outcome.target, state = %state, "Target recovered"),
            Err(e) => {
                failed += 1;
                error!(
                    target = %outcome.target,
                    reason = e.reason(),
                    error = %e,
                    "Target failed"
                );
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} recovery run(s) failed", outcomes.len());
    }

    info!("All recovery runs finished");
    Ok(())
}

/// Initialize logging with custom format
///
/// Format: timestamp file:line LEVEL message
/// Example: 2025-11-29T23:45:00.123456Z main.rs:49 INFO Starting machine-network recovery
///
/// Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
/// Example: RUST_LOG=debug mendy run
///
/// Respects RUST_LOG_FORMAT environment variable for output format
/// Example: RUST_LOG_FORMAT=json mendy run
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}
