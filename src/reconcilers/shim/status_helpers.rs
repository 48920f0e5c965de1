// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status calculation and update helpers for `Shim` resources.
//!
//! Status derives solely from node lifecycle labels: the candidate count and
//! how many candidates read `provisioned` for this shim, summarized in a
//! single `Ready` condition.

use k8s_openapi::chrono::Utc;
use kube::api::{Patch, PatchParams};
use serde_json::json;

#[allow(clippy::wildcard_imports)]
use super::types::*;
use crate::constants::{CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY};
use crate::crd::Condition;
use crate::labels::PROVISIONING_STATUS_PROVISIONED;

/// Compute a shim's status from the candidate node list.
#[must_use]
pub fn calculate_status(shim: &Shim, nodes: &[Node]) -> ShimStatus {
    let shim_name = shim.name_any();

    let node_count = i32::try_from(nodes.len()).unwrap_or(i32::MAX);
    let node_ready_count = i32::try_from(
        nodes
            .iter()
            .filter(|node| {
                node.labels().get(&shim_name).map(String::as_str)
                    == Some(PROVISIONING_STATUS_PROVISIONED)
            })
            .count(),
    )
    .unwrap_or(i32::MAX);

    ShimStatus {
        conditions: vec![ready_condition(node_count, node_ready_count)],
        node_count,
        node_ready_count,
    }
}

/// The `Ready` condition for the given node counts.
fn ready_condition(node_count: i32, node_ready_count: i32) -> Condition {
    let (status, reason, message) = if node_count == 0 {
        (
            CONDITION_STATUS_FALSE,
            "NoNodes",
            "no nodes match the node selector".to_string(),
        )
    } else if node_ready_count == node_count {
        (
            CONDITION_STATUS_TRUE,
            "AllNodesReady",
            format!("{node_ready_count}/{node_count} nodes provisioned"),
        )
    } else {
        (
            CONDITION_STATUS_FALSE,
            "NodesPending",
            format!("{node_ready_count}/{node_count} nodes provisioned"),
        )
    };

    Condition {
        r#type: CONDITION_TYPE_READY.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Persist a shim's status, then re-fetch the shim.
///
/// The status patch failing is logged but not fatal; the re-fetch is what
/// guards later updates in the same reconcile against stale-object
/// conflicts, so its failure is.
pub async fn update_status(client: &Client, shim: &Shim, nodes: &[Node]) -> Result<Shim> {
    let api: Api<Shim> = Api::all(client.clone());
    let name = shim.name_any();

    let status = calculate_status(shim, nodes);
    debug!(
        shim = %name,
        nodes = status.node_count,
        nodes_ready = status.node_ready_count,
        "Updating shim status"
    );

    let patch = json!({ "status": status });
    if let Err(err) = api
        .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        error!("Unable to update status: {err}");
    }

    api.get(&name)
        .await
        .with_context(|| format!("failed to re-fetch shim {name}"))
}

#[cfg(test)]
#[path = "status_helpers_tests.rs"]
mod status_helpers_tests;
