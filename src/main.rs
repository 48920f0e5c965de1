// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{routing::get, Router};
use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use kube_lease_manager::{LeaseManager, LeaseManagerBuilder};
use rcm::{
    constants::{
        CONDITION_STATUS_TRUE, CONDITION_TYPE_READY, DEFAULT_LEASE_DURATION_SECS,
        DEFAULT_LEASE_RETRY_PERIOD_SECS, ERROR_REQUEUE_DURATION_SECS, KIND_SHIM,
        METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT,
        REQUEUE_WHEN_NOT_READY_SECS, REQUEUE_WHEN_READY_SECS, TOKIO_WORKER_THREADS,
    },
    crd::Shim,
    metrics,
    reconcilers::{reconcile_shim, watch_node_labels},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("rcm-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
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

    info!("Starting Runtime Class Manager");
}

/// Start the Prometheus metrics HTTP server
///
/// Serves metrics on the configured port and path (default: 0.0.0.0:8080/metrics)
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Leader election configuration
struct LeaderElectionConfig {
    enabled: bool,
    lease_name: String,
    lease_namespace: String,
    identity: String,
    lease_duration: u64,
    retry_period: u64,
}

/// Load leader election configuration from environment variables
fn load_leader_election_config() -> LeaderElectionConfig {
    let enabled = std::env::var("RCM_ENABLE_LEADER_ELECTION")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .unwrap_or(true);

    let lease_name = std::env::var("RCM_LEASE_NAME").unwrap_or_else(|_| "rcm-leader".to_string());

    let lease_namespace = std::env::var("RCM_LEASE_NAMESPACE")
        .or_else(|_| std::env::var("POD_NAMESPACE"))
        .unwrap_or_else(|_| "rcm-system".to_string());

    let lease_duration = std::env::var("RCM_LEASE_DURATION_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_DURATION_SECS);

    let retry_period = std::env::var("RCM_LEASE_RETRY_PERIOD_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_RETRY_PERIOD_SECS);

    let identity = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("rcm-{}", rand::random::<u32>()));

    LeaderElectionConfig {
        enabled,
        lease_name,
        lease_namespace,
        identity,
        lease_duration,
        retry_period,
    }
}

async fn async_main() -> Result<()> {
    initialize_logging();

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let _metrics_handle = start_metrics_server();

    let config = load_leader_election_config();

    if config.enabled {
        info!(
            lease_name = %config.lease_name,
            lease_namespace = %config.lease_namespace,
            identity = %config.identity,
            lease_duration_secs = config.lease_duration,
            "Leader election enabled"
        );

        info!("Starting leader election, waiting to acquire leadership...");

        let lease_manager = LeaseManagerBuilder::new(client.clone(), &config.lease_name)
            .with_namespace(&config.lease_namespace)
            .with_identity(&config.identity)
            .with_duration(config.lease_duration)
            .with_grace(config.retry_period)
            .build()
            .await?;

        let (leader_rx, lease_handle) = lease_manager.watch().await;

        // Wait until we become leader
        let mut rx = leader_rx.clone();
        while !*rx.borrow_and_update() {
            rx.changed().await?;
        }

        info!("Leadership acquired! Starting controller...");
        metrics::record_leader_elected(&config.identity);

        run_with_leader_election(client, config.identity, leader_rx, lease_handle).await?;
    } else {
        run_without_leader_election(client).await?;
    }

    Ok(())
}

/// Monitor leadership status - returns when leadership is lost or an error occurs
async fn monitor_leadership(
    mut leader_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    loop {
        leader_rx.changed().await?;
        if !*leader_rx.borrow() {
            return Ok(());
        }
    }
}

/// Run the shim controller racing SIGINT/SIGTERM handlers
async fn run_without_leader_election(client: Client) -> Result<()> {
    warn!("Leader election DISABLED - running without high availability");
    info!("Starting controller with signal handling");

    let shutdown_result: Result<()> = tokio::select! {
        // Monitor for SIGINT (Ctrl+C)
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        // Monitor for SIGTERM (Kubernetes sends this when deleting pods)
        result = sigterm() => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = run_shim_controller(client) => {
            error!("CRITICAL: Shim controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Shim controller exited unexpectedly without error")
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully");

    Ok(())
}

/// Run the shim controller while monitoring leadership and signals.
///
/// If leadership is lost or SIGTERM/SIGINT is received, the controller stops
/// and the process exits gracefully.
async fn run_with_leader_election(
    client: Client,
    identity: String,
    leader_rx: tokio::sync::watch::Receiver<bool>,
    _lease_handle: tokio::task::JoinHandle<
        Result<LeaseManager, kube_lease_manager::LeaseManagerError>,
    >,
) -> Result<()> {
    info!("Running controller with leader election and signal handling");

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            info!("Stopping controller and releasing leader election lease...");
            result.map_err(anyhow::Error::from)
        }

        result = sigterm() => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            info!("Stopping controller and releasing leader election lease...");
            result
        }

        result = monitor_leadership(leader_rx) => {
            match result {
                Ok(()) => {
                    warn!("Leadership lost! Stopping controller...");
                    metrics::record_leader_lost(&identity);
                    anyhow::bail!("Leadership lost - stepping down")
                }
                Err(e) => {
                    error!("Leadership monitor error: {:?}", e);
                    anyhow::bail!("Leadership monitoring failed: {e}")
                }
            }
        }

        result = run_shim_controller(client) => {
            error!("CRITICAL: Shim controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Shim controller exited unexpectedly without error")
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully, leader election lease released");
    Ok(())
}

/// Wait for SIGTERM (Unix only; pends forever elsewhere)
async fn sigterm() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        sigterm.recv().await;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Run the `Shim` controller
///
/// The controller watches Shims, owns the install jobs it materializes, and
/// re-reconciles every shim whenever any node's labels change; that is how
/// the external `pending` to `provisioned` label flip is observed.
async fn run_shim_controller(client: Client) -> Result<()> {
    info!("Starting Shim controller");

    let api = Api::<Shim>::all(client.clone());
    let job_api = Api::<Job>::all(client.clone());

    // Node label changes pulse this channel; reconcile_all_on re-enqueues
    // every shim the controller knows about.
    let (trigger_tx, trigger_rx) = futures::channel::mpsc::channel::<()>(16);
    tokio::spawn(watch_node_labels(client.clone(), trigger_tx));

    Controller::new(api, Config::default())
        .owns(job_api, Config::default())
        .reconcile_all_on(trigger_rx)
        .run(reconcile_shim_wrapper, error_policy, Arc::new(client))
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Shim`
async fn reconcile_shim_wrapper(
    shim: Arc<Shim>,
    ctx: Arc<Client>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    debug!(shim = %shim.name_any(), "Reconcile wrapper called for Shim");

    let result = reconcile_shim((*ctx).clone(), (*shim).clone()).await;
    let duration = start.elapsed();

    match result {
        Ok(()) => {
            info!("Successfully reconciled Shim: {}", shim.name_any());
            metrics::record_reconciliation_success(KIND_SHIM, duration);

            // Requeue slowly once every candidate node is provisioned, fast
            // while installs are still converging.
            let is_ready = shim
                .status
                .as_ref()
                .and_then(|status| status.conditions.first())
                .is_some_and(|condition| {
                    condition.r#type == CONDITION_TYPE_READY
                        && condition.status == CONDITION_STATUS_TRUE
                });

            if is_ready {
                debug!("Shim ready, requeueing in 5 minutes");
                Ok(Action::requeue(Duration::from_secs(REQUEUE_WHEN_READY_SECS)))
            } else {
                debug!("Shim not ready, requeueing in 30 seconds");
                Ok(Action::requeue(Duration::from_secs(
                    REQUEUE_WHEN_NOT_READY_SECS,
                )))
            }
        }
        Err(e) => {
            error!("Failed to reconcile Shim: {}", e);
            metrics::record_reconciliation_error(KIND_SHIM, duration);
            metrics::record_error(KIND_SHIM, "reconcile_error");
            Err(e.into())
        }
    }
}

/// Error policy: requeue after a fixed delay.
fn error_policy(_shim: Arc<Shim>, _err: &ReconcileError, _ctx: Arc<Client>) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

// Tests are in main_tests.rs
#[cfg(test)]
mod main_tests;
