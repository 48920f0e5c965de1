// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node label watch.
//!
//! The lifecycle label flip from `pending` to `provisioned` happens outside
//! the controller, so shim reconciliation must be re-triggered whenever a
//! node's labels change. This task watches nodes through a label-change
//! predicate and pulses a trigger channel; the shim controller consumes the
//! channel via `reconcile_all_on`, re-enqueueing every known shim. The shim
//! reconciler does the selector filtering, and node state is never mutated
//! here.

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::runtime::{predicates, watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, warn};

/// Watch node label changes and pulse `trigger` on each one.
///
/// Runs until the watch stream ends or the receiving side of the channel is
/// dropped. Watch errors are logged and the watch resumes with backoff.
pub async fn watch_node_labels(client: Client, mut trigger: mpsc::Sender<()>) {
    let nodes: Api<Node> = Api::all(client);

    let stream = watcher(nodes, watcher::Config::default())
        .default_backoff()
        .touched_objects()
        .predicate_filter(predicates::labels);
    let mut stream = std::pin::pin!(stream);

    while let Some(event) = stream.next().await {
        match event {
            Ok(node) => {
                debug!(node = %node.name_any(), "Node labels changed, triggering shim reconciliation");
                if trigger.send(()).await.is_err() {
                    // Controller gone; nothing left to trigger.
                    return;
                }
            }
            Err(err) => warn!(error = ?err, "Node watch error"),
        }
    }
}
