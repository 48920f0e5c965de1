// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Host filesystem access for the node installer.
//!
//! The node installer runs inside a container with the node's root
//! filesystem bind-mounted at a known location (`/mnt/node-root` in the
//! provisioning job). All host paths in this codebase (the containerd
//! config, the shim binary directory, the state file) are expressed as
//! host-absolute paths and rebased under the mount point through [`HostFs`].
//!
//! Tests substitute a temporary directory as the host root.

use std::path::{Path, PathBuf};

/// A view of the host filesystem rooted at a mount point.
///
/// `resolve` rebases a host-absolute path (`/etc/containerd/config.toml`)
/// to the real path beneath the root (`/mnt/node-root/etc/containerd/config.toml`).
#[derive(Clone, Debug)]
pub struct HostFs {
    root: PathBuf,
}

impl HostFs {
    /// Create a host filesystem view rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The mount point this view is rooted at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rebase a host-absolute path under the root.
    ///
    /// Relative paths are joined as-is.
    #[must_use]
    pub fn resolve(&self, host_path: impl AsRef<Path>) -> PathBuf {
        let host_path = host_path.as_ref();
        match host_path.strip_prefix("/") {
            Ok(relative) => self.root.join(relative),
            Err(_) => self.root.join(host_path),
        }
    }

    /// Whether a host path exists beneath the root.
    #[must_use]
    pub fn exists(&self, host_path: impl AsRef<Path>) -> bool {
        self.resolve(host_path).exists()
    }
}

#[cfg(test)]
#[path = "hostfs_tests.rs"]
mod hostfs_tests;
