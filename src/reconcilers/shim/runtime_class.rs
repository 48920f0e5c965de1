// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RuntimeClass manifests.

use k8s_openapi::api::node::v1::Scheduling;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

use super::jobs::{owner_reference, truncate_name};
#[allow(clippy::wildcard_imports)]
use super::types::*;

/// Build the RuntimeClass manifest for a shim.
///
/// The shim's node selector is copied into the scheduling constraints so
/// pods selecting this runtime class only land where the shim is installed.
/// The resource is owned by the Shim and garbage-collected with it.
pub fn build_runtime_class(shim: &Shim) -> Result<RuntimeClass> {
    let name = truncate_name(&shim.spec.runtime_class.name);

    let node_selector = shim.spec.node_selector.clone().unwrap_or_default();

    Ok(RuntimeClass {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: Some(BTreeMap::from([(name, "true".to_string())])),
            owner_references: Some(vec![owner_reference(shim)?]),
            ..Default::default()
        },
        handler: shim.spec.runtime_class.handler.clone(),
        scheduling: Some(Scheduling {
            node_selector: Some(node_selector),
            tolerations: None,
        }),
        overhead: None,
    })
}

#[cfg(test)]
#[path = "runtime_class_tests.rs"]
mod runtime_class_tests;
