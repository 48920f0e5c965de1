// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-node artifact resolution.
//!
//! A shim's fetch strategy either lists per-platform artifacts or falls back
//! to a single legacy URL. Resolution happens per node, against the OS and
//! architecture the kubelet reports. Nodes report canonical architecture
//! names (`amd64`), while artifact lists frequently use uname spellings
//! (`x86_64`), so matching accepts both.

use crate::crd::{PlatformArtifact, Shim};
use anyhow::Result;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

/// The download source resolved for one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub location: String,
    pub sha256: Option<String>,
}

/// Select the artifact source for a node.
///
/// A non-empty platform list is authoritative: the first entry matching the
/// node's OS and architecture wins, and no entry matching is an error; the
/// legacy URL is not a fallback in that case. Without a platform list, the
/// legacy URL is used with no digest. No source at all is an error.
pub fn resolve_artifact(shim: &Shim, node: &Node) -> Result<ResolvedArtifact> {
    let node_info = node.status.as_ref().and_then(|s| s.node_info.as_ref());
    let node_os = node_info.map_or("", |info| info.operating_system.as_str());
    let node_arch = node_info.map_or("", |info| info.architecture.as_str());

    if let Some(platforms) = shim
        .spec
        .fetch_strategy
        .platforms
        .as_ref()
        .filter(|platforms| !platforms.is_empty())
    {
        for platform in platforms {
            if matches_platform(platform, node_os, node_arch) {
                return Ok(ResolvedArtifact {
                    location: platform.location.clone(),
                    sha256: platform.sha256.clone(),
                });
            }
        }
        anyhow::bail!(
            "no platform artifact matches node {} ({node_os}/{node_arch})",
            node.name_any()
        );
    }

    if let Some(anon_http) = &shim.spec.fetch_strategy.anon_http {
        return Ok(ResolvedArtifact {
            location: anon_http.location.clone(),
            sha256: None,
        });
    }

    anyhow::bail!("no fetch source configured for shim {}", shim.name_any())
}

/// Whether a platform artifact matches a node's OS and architecture.
///
/// Case-insensitive on both; the node architecture also matches after uname
/// normalization.
fn matches_platform(platform: &PlatformArtifact, node_os: &str, node_arch: &str) -> bool {
    let os_match = platform.os.eq_ignore_ascii_case(node_os);
    let arch_match = platform.arch.eq_ignore_ascii_case(node_arch)
        || platform.arch.eq_ignore_ascii_case(normalize_arch(node_arch));
    os_match && arch_match
}

/// Convert a canonical architecture name to its uname spelling.
fn normalize_arch(arch: &str) -> &str {
    match arch {
        "amd64" => "x86_64",
        "arm64" => "aarch64",
        "arm" => "armv7l",
        _ => arch,
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod artifacts_tests;
