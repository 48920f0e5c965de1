// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions for runtime class management.
//!
//! The single CRD here is [`Shim`]: a cluster-scoped declaration of a
//! containerd shim that should exist on a set of nodes, together with the
//! RuntimeClass that exposes it to workloads.
//!
//! # Example: declaring a shim
//!
//! ```rust,no_run
//! use rcm::crd::{FetchStrategy, PlatformArtifact, RuntimeClassSpec, ShimSpec};
//!
//! let spec = ShimSpec {
//!     node_selector: None,
//!     fetch_strategy: FetchStrategy {
//!         anon_http: None,
//!         platforms: Some(vec![PlatformArtifact {
//!             os: "linux".to_string(),
//!             arch: "amd64".to_string(),
//!             location: "https://example.com/shim-x86_64.tar.gz".to_string(),
//!             sha256: None,
//!         }]),
//!     },
//!     runtime_class: RuntimeClassSpec {
//!         name: "spin".to_string(),
//!         handler: "spin".to_string(),
//!     },
//!     rollout_strategy: Default::default(),
//!     containerd_runtime_options: None,
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `Shim` declares a containerd shim to install across matching nodes.
///
/// The reconciler converges every node matched by the selector: binary
/// installed, containerd configured and restarted, RuntimeClass registered,
/// install state reflected in the node's lifecycle label and the shim
/// status.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "runtime.firestoned.io",
    version = "v1alpha1",
    kind = "Shim",
    plural = "shims",
    status = "ShimStatus",
    printcolumn = r#"{"name":"RuntimeClass","jsonPath":".spec.runtimeClass.name","type":"string"}"#,
    printcolumn = r#"{"name":"Ready","jsonPath":".status.nodesReady","type":"integer"}"#,
    printcolumn = r#"{"name":"Nodes","jsonPath":".status.nodes","type":"integer"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ShimSpec {
    /// Label constraints selecting target nodes. Empty selects all nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Where to fetch the shim binary from.
    pub fetch_strategy: FetchStrategy,

    /// The RuntimeClass to register for this shim.
    pub runtime_class: RuntimeClassSpec,

    /// How installs roll out across the selected nodes.
    #[serde(default)]
    pub rollout_strategy: RolloutStrategy,

    /// Containerd runtime options for the shim plugin, emitted into the
    /// options sub-table of the runtime registration (e.g. the cgroup
    /// driver). Values are inserted verbatim; callers own TOML quoting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containerd_runtime_options: Option<BTreeMap<String, String>>,
}

/// Where a shim binary comes from.
///
/// Either a per-platform artifact list, a single legacy URL, or both; the
/// platform list takes precedence. At least one must be present for installs
/// to succeed.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchStrategy {
    /// A single public HTTP(S) artifact URL. Kept for single-architecture
    /// deployments; ignored when `platforms` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon_http: Option<AnonHttpSpec>,

    /// Per-OS/architecture artifact sources. The reconciler selects the
    /// matching entry for each target node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<PlatformArtifact>>,
}

/// A simple anonymous HTTP fetch.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnonHttpSpec {
    /// Direct URL to the artifact archive.
    pub location: String,
}

/// One OS/architecture pair mapped to an artifact URL.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformArtifact {
    /// Operating system. Currently only `linux` is supported.
    pub os: String,

    /// CPU architecture. Accepts canonical (`amd64`, `arm64`) or uname
    /// (`x86_64`, `aarch64`) spellings; matching is case-insensitive.
    pub arch: String,

    /// URL to the artifact archive for this platform. Must be publicly
    /// accessible.
    pub location: String,

    /// Optional hex-encoded SHA-256 digest for verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// The RuntimeClass registered for a shim.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeClassSpec {
    /// Name of the RuntimeClass resource.
    pub name: String,

    /// Handler string dispatching pods to the shim.
    pub handler: String,
}

/// Rollout strategy type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RolloutStrategyType {
    /// Reserved; not implemented yet.
    Rolling,
    /// Install on every eligible node in one reconcile.
    #[default]
    Recreate,
}

/// How installs roll out across the selected nodes.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStrategy {
    #[serde(default)]
    pub r#type: RolloutStrategyType,

    /// Parameters for the `rolling` strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling: Option<RollingSpec>,
}

/// Parameters for the reserved `rolling` strategy.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollingSpec {
    /// Upper bound on nodes updated per reconcile batch.
    pub max_update: i32,
}

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, Progressing, Failed.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Observed state of a `Shim`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ShimStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Number of nodes matched by the selector.
    #[serde(rename = "nodes")]
    pub node_count: i32,

    /// Number of matched nodes whose lifecycle label reads `provisioned`.
    #[serde(rename = "nodesReady")]
    pub node_ready_count: i32,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
