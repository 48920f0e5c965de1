// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shim reconciliation logic.
//!
//! The control-loop core: for each `Shim`, list the candidate nodes, keep
//! the status current, materialize the RuntimeClass, and drive per-node
//! install and uninstall jobs through the label-based state machine.
//!
//! Per node and shim, the lifecycle label (key = shim name) traces
//! `pending` → `provisioned`; the flip to `provisioned` is performed by the
//! provisioning job itself, not by this reconciler. Deletion dispatches
//! uninstall jobs to every labeled candidate node before the finalizer is
//! released.
//!
//! ## Module Structure
//!
//! - [`artifacts`] - Per-node artifact resolution
//! - [`jobs`] - Provisioning job manifests
//! - [`runtime_class`] - RuntimeClass manifests
//! - [`status_helpers`] - Status calculation and updates
//! - [`types`] - Shared imports

pub mod artifacts;
pub mod jobs;
pub mod runtime_class;
pub mod status_helpers;
pub mod types;

use kube::api::{Patch, PatchParams};
use serde_json::json;

use artifacts::resolve_artifact;
use jobs::{build_job, controller_namespace, Operation};
use runtime_class::build_runtime_class;
#[allow(clippy::wildcard_imports)]
use types::*;

use crate::crd::RolloutStrategyType;
use crate::labels::{
    FINALIZER_SHIM, PROVISIONING_STATUS_FAILED, PROVISIONING_STATUS_PENDING,
    PROVISIONING_STATUS_PROVISIONED, PROVISIONING_STATUS_UNINSTALL,
};
use crate::metrics;
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use crate::reconcilers::resources::apply;

/// Dispatch uninstall jobs to every labeled candidate node when the shim is
/// deleted. Runs before the finalizer is removed.
#[async_trait::async_trait]
impl FinalizerCleanup for Shim {
    async fn cleanup(&self, client: &Client) -> Result<()> {
        let nodes = list_candidate_nodes(client, self).await?;
        handle_delete_shim(client, self, &nodes).await
    }
}

/// Reconcile a `Shim` resource.
///
/// The workflow, in order:
/// 1. Ensure the finalizer is present (non-fatal on failure, skipped while
///    deleting)
/// 2. List candidate nodes by the shim's node selector
/// 3. Update status from lifecycle labels and re-fetch the shim
/// 4. On deletion, dispatch uninstall jobs and release the finalizer
/// 5. Ensure the RuntimeClass exists
/// 6. Dispatch install jobs per the rollout strategy
///
/// # Errors
///
/// Returns an error if Kubernetes API operations fail or the rollout cannot
/// be dispatched.
pub async fn reconcile_shim(client: Client, shim: Shim) -> Result<()> {
    let name = shim.name_any();
    info!("Reconciling Shim: {}", name);

    if shim.metadata.deletion_timestamp.is_none() {
        if let Err(err) = ensure_finalizer(&client, &shim, FINALIZER_SHIM).await {
            error!("Failed to ensure finalizer: {err}");
        }
    }

    let nodes = list_candidate_nodes(&client, &shim).await?;

    // Persist node counts first, then work from the re-fetched object so
    // later updates in this reconcile do not hit stale-object conflicts.
    let shim = status_helpers::update_status(&client, &shim, &nodes).await?;

    if shim.metadata.deletion_timestamp.is_some() {
        debug!("Deleting shim {}", name);
        return handle_deletion(&client, &shim, FINALIZER_SHIM).await;
    }

    ensure_runtime_class(&client, &shim).await?;

    if nodes.is_empty() {
        info!("No nodes found");
        return Ok(());
    }

    handle_install_shim(&client, &shim, &nodes).await
}

/// List the nodes a shim's selector matches. An empty selector selects all
/// nodes.
async fn list_candidate_nodes(client: &Client, shim: &Shim) -> Result<Vec<Node>> {
    let api: Api<Node> = Api::all(client.clone());

    let params = match &shim.spec.node_selector {
        Some(selector) if !selector.is_empty() => {
            let labels = selector
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(",");
            ListParams::default().labels(&labels)
        }
        _ => ListParams::default(),
    };

    let nodes = api
        .list(&params)
        .await
        .context("failed to get node list")?;
    Ok(nodes.items)
}

/// Ensure the shim's RuntimeClass exists, materializing it when missing.
async fn ensure_runtime_class(client: &Client, shim: &Shim) -> Result<()> {
    let api: Api<RuntimeClass> = Api::all(client.clone());
    let rc_name = jobs::truncate_name(&shim.spec.runtime_class.name);

    match api.get(&rc_name).await {
        Ok(rc) => {
            debug!("RuntimeClass found: {}", rc.name_any());
            Ok(())
        }
        Err(_) => {
            info!("RuntimeClass '{}' not found", rc_name);
            let runtime_class = build_runtime_class(shim)?;
            apply(&api, &runtime_class)
                .await
                .context("failed to reconcile RuntimeClass")
        }
    }
}

/// Dispatch installs per the shim's rollout strategy.
async fn handle_install_shim(client: &Client, shim: &Shim, nodes: &[Node]) -> Result<()> {
    match shim.spec.rollout_strategy.r#type {
        RolloutStrategyType::Rolling => {
            let max_update = shim
                .spec
                .rollout_strategy
                .rolling
                .as_ref()
                .map_or(0, |rolling| rolling.max_update);
            debug!("Rolling strategy selected: maxUpdate={max_update}");
            anyhow::bail!("rolling strategy not implemented yet")
        }
        RolloutStrategyType::Recreate => {
            debug!("Recreate strategy selected");
            recreate_strategy_rollout(client, shim, nodes).await
        }
    }
}

/// Candidate nodes whose lifecycle label is neither `provisioned` nor
/// `pending` for this shim, so an install job must be dispatched.
///
/// Unlabeled nodes count, as do nodes at `failed` or `uninstall`.
fn nodes_needing_install<'a>(nodes: &'a [Node], shim_name: &str) -> Vec<&'a Node> {
    nodes
        .iter()
        .filter(|node| {
            let label = node.labels().get(shim_name).map(String::as_str);
            label != Some(PROVISIONING_STATUS_PROVISIONED)
                && label != Some(PROVISIONING_STATUS_PENDING)
        })
        .collect()
}

/// Candidate nodes still carrying the shim's lifecycle label, so an
/// uninstall job must be dispatched before the shim goes away.
fn nodes_needing_uninstall<'a>(nodes: &'a [Node], shim_name: &str) -> Vec<&'a Node> {
    nodes
        .iter()
        .filter(|node| node.labels().contains_key(shim_name))
        .collect()
}

/// Install on every candidate node not already provisioned or pending.
///
/// One node's failure does not stop the others; errors are collected and
/// joined so the reconcile retries everything that did not stick.
async fn recreate_strategy_rollout(client: &Client, shim: &Shim, nodes: &[Node]) -> Result<()> {
    let shim_name = shim.name_any();
    let mut errors = Vec::new();

    for node in nodes {
        if node.labels().get(&shim_name).map(String::as_str)
            == Some(PROVISIONING_STATUS_PROVISIONED)
        {
            info!(
                "Shim {} already provisioned on Node {}",
                shim_name,
                node.name_any()
            );
        }
    }

    for node in nodes_needing_install(nodes, &shim_name) {
        if let Err(err) = deploy_job_on_node(client, shim, node, Operation::Install).await {
            errors.push(err);
        }
    }

    join_errors(errors)
}

/// Dispatch an uninstall job to every candidate node carrying the shim's
/// lifecycle label. NotFound failures are tolerated.
async fn handle_delete_shim(client: &Client, shim: &Shim, nodes: &[Node]) -> Result<()> {
    let shim_name = shim.name_any();

    for node in nodes {
        if !node.labels().contains_key(&shim_name) {
            info!(
                "Shim {} has no label on Node {}",
                shim_name,
                node.name_any()
            );
        }
    }

    for node in nodes_needing_uninstall(nodes, &shim_name) {
        if let Err(err) = deploy_job_on_node(client, shim, node, Operation::Uninstall).await {
            if !is_not_found(&err) {
                return Err(err);
            }
        }
    }

    Ok(())
}

/// Materialize one provisioning job on a node.
///
/// The node is re-fetched so the lifecycle label lands on current state. The
/// label is set before the job applies; a job apply failure downgrades the
/// label to `failed` and surfaces the error.
async fn deploy_job_on_node(
    client: &Client,
    shim: &Shim,
    node: &Node,
    operation: Operation,
) -> Result<()> {
    let node_api: Api<Node> = Api::all(client.clone());
    let node = node_api
        .get(&node.name_any())
        .await
        .context("failed to fetch node")?;
    let node_name = node.name_any();
    let shim_name = shim.name_any();

    info!(
        "Deploying {}-Job for Shim {} on node: {}",
        operation, shim_name, node_name
    );

    let artifact = match operation {
        Operation::Install => Some(
            resolve_artifact(shim, &node)
                .with_context(|| format!("failed to resolve artifact for node {node_name}"))?,
        ),
        Operation::Uninstall => None,
    };

    let status = match operation {
        Operation::Install => PROVISIONING_STATUS_PENDING,
        Operation::Uninstall => PROVISIONING_STATUS_UNINSTALL,
    };
    if let Err(err) = update_node_label(client, &node_name, &shim_name, status).await {
        error!("Unable to update node label {}: {}", shim_name, err);
    }

    let job = build_job(shim, &node, operation, artifact.as_ref())?;

    let job_api: Api<Job> = Api::namespaced(client.clone(), &controller_namespace());
    if let Err(err) = apply(&job_api, &job).await {
        error!("Unable to reconcile Job: {err}");
        if let Err(label_err) =
            update_node_label(client, &node_name, &shim_name, PROVISIONING_STATUS_FAILED).await
        {
            error!("Unable to update node label {}: {}", shim_name, label_err);
        }
        return Err(err.context("failed to reconcile job"));
    }

    metrics::record_job_dispatched(operation.as_str());

    Ok(())
}

/// Set a node's lifecycle label for a shim.
async fn update_node_label(
    client: &Client,
    node_name: &str,
    shim_name: &str,
    status: &str,
) -> Result<()> {
    let api: Api<Node> = Api::all(client.clone());
    let patch = json!({ "metadata": { "labels": { shim_name: status } } });
    api.patch(node_name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .context("failed to update node labels")?;
    Ok(())
}

/// Whether any error in the chain is a Kubernetes NotFound.
fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<kube::Error>(),
            Some(kube::Error::Api(api_err)) if api_err.code == 404
        )
    })
}

/// Collapse per-node errors into a single failure, or success when empty.
fn join_errors(errors: Vec<anyhow::Error>) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    let joined = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    anyhow::bail!("{joined}")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
