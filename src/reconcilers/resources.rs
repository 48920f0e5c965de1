// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Server-side apply helpers for Kubernetes resources.
//!
//! Jobs and RuntimeClasses are declared, not edited: every reconcile applies
//! the full desired manifest through server-side apply with a stable field
//! manager, forcing conflicts in our favor. The API server resolves creation
//! versus update, which keeps repeated reconciles idempotent.

use anyhow::{Context, Result};
use kube::api::{Patch, PatchParams};
use kube::{Api, Resource, ResourceExt};
use tracing::debug;

use crate::constants::FIELD_MANAGER;

/// Apply a resource with server-side apply, forcing field ownership.
///
/// The typed `k8s-openapi` structs carry no `apiVersion`/`kind`, which
/// server-side apply requires, so the manifest is serialized and stamped
/// before patching.
///
/// # Errors
///
/// Returns an error if the resource has no name or the patch fails.
pub async fn apply<T>(api: &Api<T>, resource: &T) -> Result<()>
where
    T: Resource<DynamicType = ()>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let name = resource
        .meta()
        .name
        .clone()
        .context("resource must have a name")?;

    let manifest = manifest_with_type_meta(resource)?;

    debug!(name = %name, kind = %T::kind(&()), "Applying resource");

    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&manifest),
    )
    .await
    .with_context(|| format!("failed to apply {} {name}", T::kind(&())))?;

    Ok(())
}

/// Serialize a typed resource and stamp its `apiVersion` and `kind`.
pub(crate) fn manifest_with_type_meta<T>(resource: &T) -> Result<serde_json::Value>
where
    T: Resource<DynamicType = ()> + serde::Serialize,
{
    let mut manifest = serde_json::to_value(resource)?;
    manifest["apiVersion"] = serde_json::Value::String(T::api_version(&()).into_owned());
    manifest["kind"] = serde_json::Value::String(T::kind(&()).into_owned());
    Ok(manifest)
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
