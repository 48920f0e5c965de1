// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provisioning job manifests.
//!
//! One job exists per (node, shim, operation), named deterministically so
//! repeated reconciles apply the same manifest instead of stacking new jobs.
//! The pod is pinned to the target node, privileged, and host-PID, with the
//! node root mounted at `/mnt/node-root`. Install jobs carry a downloader
//! init container writing into a scratch volume shared with the provisioner.
//!
//! Install jobs are owned by the Shim so they are garbage-collected with it;
//! uninstall jobs deliberately are not, because they must outlive the Shim
//! they clean up after.

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, HostPathVolumeSource, PodSpec, PodTemplateSpec,
    SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

use super::artifacts::ResolvedArtifact;
#[allow(clippy::wildcard_imports)]
use super::types::*;
use crate::constants::{
    CONTROLLER_NAMESPACE_ENV, DOWNLOADER_IMAGE_ENV, JOB_TTL_ENV, K8S_NAME_MAX_LENGTH,
    NODE_INSTALLER_IMAGE_ENV,
};
use crate::labels;

/// Mount point of the node root inside the provisioning pod.
const NODE_ROOT_MOUNT: &str = "/mnt/node-root";

/// Mount point of the scratch volume shared by downloader and provisioner.
const ASSETS_MOUNT: &str = "/assets";

/// Name of the scratch volume.
const DOWNLOAD_VOLUME: &str = "shim-download";

/// Name of the host root volume.
const ROOT_VOLUME: &str = "root-mount";

/// A provisioning operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Install,
    Uninstall,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Install => "install",
            Operation::Uninstall => "uninstall",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truncate a name to the Kubernetes object name limit.
#[must_use]
pub fn truncate_name(name: &str) -> String {
    name.chars().take(K8S_NAME_MAX_LENGTH).collect()
}

/// Deterministic job name for a (node, shim, operation) triple.
#[must_use]
pub fn job_name(node_name: &str, shim_name: &str, operation: Operation) -> String {
    truncate_name(&format!("{node_name}-{shim_name}-{operation}"))
}

/// Namespace provisioning jobs are materialized into.
#[must_use]
pub fn controller_namespace() -> String {
    std::env::var(CONTROLLER_NAMESPACE_ENV).unwrap_or_default()
}

/// Build the job manifest for one provisioning operation on one node.
///
/// `artifact` is required for installs (the downloader init container needs
/// a source) and ignored for uninstalls.
pub fn build_job(
    shim: &Shim,
    node: &Node,
    operation: Operation,
    artifact: Option<&ResolvedArtifact>,
) -> Result<Job> {
    let node_name = node.name_any();
    let shim_name = shim.name_any();
    let name = job_name(&node_name, &shim_name, operation);

    let annotations = BTreeMap::from([
        (labels::ANNOTATION_NODE_NAME.to_string(), node_name.clone()),
        (labels::ANNOTATION_SHIM_NAME.to_string(), shim_name.clone()),
        (
            labels::ANNOTATION_OPERATION.to_string(),
            operation.to_string(),
        ),
    ]);
    let job_labels = BTreeMap::from([
        (name.clone(), "true".to_string()),
        (labels::LABEL_SHIM_NAME.to_string(), shim_name.clone()),
        (labels::LABEL_OPERATION.to_string(), operation.to_string()),
        (labels::LABEL_JOB.to_string(), "true".to_string()),
    ]);

    let init_containers = match operation {
        Operation::Install => {
            let artifact = artifact.context("install job requires a resolved artifact")?;
            Some(vec![downloader_container(&shim_name, artifact)])
        }
        Operation::Uninstall => None,
    };

    let owner_references = match operation {
        Operation::Install => Some(vec![owner_reference(shim)?]),
        Operation::Uninstall => None,
    };

    let mut job = Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(controller_namespace()),
            annotations: Some(annotations),
            labels: Some(job_labels),
            owner_references,
            ..Default::default()
        },
        spec: Some(JobSpec {
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    node_name: Some(node_name),
                    host_pid: Some(true),
                    volumes: Some(vec![
                        Volume {
                            name: DOWNLOAD_VOLUME.to_string(),
                            empty_dir: Some(EmptyDirVolumeSource::default()),
                            ..Default::default()
                        },
                        Volume {
                            name: ROOT_VOLUME.to_string(),
                            host_path: Some(HostPathVolumeSource {
                                path: "/".to_string(),
                                type_: None,
                            }),
                            ..Default::default()
                        },
                    ]),
                    init_containers,
                    containers: vec![provisioner_container(shim, &shim_name, operation)],
                    restart_policy: Some("Never".to_string()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    };

    if let Some(ttl) = job_ttl() {
        if let Some(spec) = job.spec.as_mut() {
            spec.ttl_seconds_after_finished = Some(ttl);
        }
    }

    Ok(job)
}

/// The downloader init container, fetching the artifact into `/assets`.
fn downloader_container(shim_name: &str, artifact: &ResolvedArtifact) -> Container {
    let mut env = vec![
        EnvVar {
            name: "SHIM_NAME".to_string(),
            value: Some(shim_name.to_string()),
            value_from: None,
        },
        EnvVar {
            name: "SHIM_LOCATION".to_string(),
            value: Some(artifact.location.clone()),
            value_from: None,
        },
    ];
    if let Some(sha256) = &artifact.sha256 {
        env.push(EnvVar {
            name: "SHIM_SHA256".to_string(),
            value: Some(sha256.clone()),
            value_from: None,
        });
    }

    Container {
        name: "downloader".to_string(),
        image: Some(std::env::var(DOWNLOADER_IMAGE_ENV).unwrap_or_default()),
        security_context: Some(privileged()),
        env: Some(env),
        volume_mounts: Some(vec![VolumeMount {
            name: DOWNLOAD_VOLUME.to_string(),
            mount_path: ASSETS_MOUNT.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// The provisioner container running the node installer against the host.
fn provisioner_container(shim: &Shim, shim_name: &str, operation: Operation) -> Container {
    let mut env = vec![EnvVar {
        name: "HOST_ROOT".to_string(),
        value: Some(NODE_ROOT_MOUNT.to_string()),
        value_from: None,
    }];

    if let Some(options) = &shim.spec.containerd_runtime_options {
        match serde_json::to_string(options) {
            Ok(options_json) => env.push(EnvVar {
                name: "RUNTIME_OPTIONS".to_string(),
                value: Some(options_json),
                value_from: None,
            }),
            Err(err) => error!("Unable to marshal runtime options: {err}"),
        }
    }

    Container {
        name: "provisioner".to_string(),
        image: Some(std::env::var(NODE_INSTALLER_IMAGE_ENV).unwrap_or_default()),
        args: Some(vec![
            operation.to_string(),
            "-H".to_string(),
            NODE_ROOT_MOUNT.to_string(),
            "-r".to_string(),
            shim_name.to_string(),
        ]),
        security_context: Some(privileged()),
        env: Some(env),
        volume_mounts: Some(vec![
            VolumeMount {
                name: ROOT_VOLUME.to_string(),
                mount_path: NODE_ROOT_MOUNT.to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: DOWNLOAD_VOLUME.to_string(),
                mount_path: ASSETS_MOUNT.to_string(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}

fn privileged() -> SecurityContext {
    SecurityContext {
        privileged: Some(true),
        ..Default::default()
    }
}

/// Optional TTL for finished jobs, applied only when the environment
/// carries a positive integer.
fn job_ttl() -> Option<i32> {
    std::env::var(JOB_TTL_ENV)
        .ok()
        .and_then(|ttl| ttl.parse::<i32>().ok())
        .filter(|ttl| *ttl > 0)
}

/// Owner reference marking a resource as controlled by the Shim.
pub(super) fn owner_reference(shim: &Shim) -> Result<OwnerReference> {
    Ok(OwnerReference {
        api_version: Shim::api_version(&()).into_owned(),
        kind: Shim::kind(&()).into_owned(),
        name: shim.name_any(),
        uid: shim.uid().context("shim has no uid")?,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod jobs_tests;
