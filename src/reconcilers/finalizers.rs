// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for cluster-scoped resources.
//!
//! `Shim` is cluster-scoped, and its deletion must dispatch uninstall jobs
//! before Kubernetes is allowed to drop the object. These helpers add and
//! remove the finalizer idempotently and run the resource's cleanup hook
//! ahead of removal.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::core::ClusterResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::info;

/// Cleanup operations a resource must run before its finalizer is removed.
#[async_trait::async_trait]
pub trait FinalizerCleanup: Resource + ResourceExt + Clone {
    /// Perform cleanup before the finalizer is removed.
    ///
    /// Returning an error keeps the finalizer in place and blocks deletion
    /// until a later reconcile succeeds.
    async fn cleanup(&self, client: &Client) -> Result<()>;
}

/// Whether a resource currently carries the given finalizer.
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Add a finalizer to a cluster-scoped resource if not already present.
///
/// Idempotent: a present finalizer makes this a no-op.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let name = resource.name_any();

    if !has_finalizer(resource, finalizer) {
        info!("Adding finalizer {} to {} {}", finalizer, T::kind(&()), name);

        let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
        finalizers.push(finalizer.to_string());

        let api: Api<T> = Api::all(client.clone());
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
    }

    Ok(())
}

/// Remove a finalizer from a cluster-scoped resource.
///
/// Idempotent: an absent finalizer makes this a no-op. Prefer
/// [`handle_deletion`], which runs cleanup first.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn remove_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let name = resource.name_any();

    if has_finalizer(resource, finalizer) {
        info!(
            "Removing finalizer {} from {} {}",
            finalizer,
            T::kind(&()),
            name
        );

        let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
        finalizers.retain(|f| f != finalizer);

        let api: Api<T> = Api::all(client.clone());
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
    }

    Ok(())
}

/// Handle deletion of a cluster-scoped resource: run its cleanup hook, then
/// remove the finalizer so Kubernetes can delete the object.
///
/// Call this when the resource has a deletion timestamp.
///
/// # Errors
///
/// Returns an error if cleanup or finalizer removal fails; the finalizer
/// then stays on the resource and deletion is retried on a later reconcile.
pub async fn handle_deletion<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + ResourceExt
        + FinalizerCleanup
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let name = resource.name_any();

    info!("{} {} is being deleted", T::kind(&()), name);

    if has_finalizer(resource, finalizer) {
        info!("Running cleanup for {} {}", T::kind(&()), name);

        resource.cleanup(client).await?;
        remove_finalizer(client, resource, finalizer).await?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
