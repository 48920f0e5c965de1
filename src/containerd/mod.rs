// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Containerd configuration management.
//!
//! Registers and deregisters shims in the containerd config file by
//! appending and removing a generated TOML fragment. The fragment bytes are
//! deterministic: removal is a plain string replacement of exactly what an
//! earlier registration appended, so an install followed by an uninstall
//! restores the file bit-for-bit.
//!
//! - [`Config::add_runtime`] / [`Config::remove_runtime`] - fragment editing
//! - [`restart`] - per-distribution runtime restart strategies
//! - [`dbus`] - D-Bus bootstrap for systemd hosts

pub mod dbus;
pub mod restart;

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::hostfs::HostFs;
use crate::shim::runtime_name;
use restart::Restarter;

/// CRI plugin domain for containerd 1.x (config version 2).
const CRI_DOMAIN_V2: &str = "io.containerd.grpc.v1.cri";

/// CRI plugin domain for containerd 2.x (config version 3).
const CRI_DOMAIN_V3: &str = "io.containerd.cri.v1.runtime";

/// Editor for one containerd config file on the host.
pub struct Config {
    host: HostFs,
    config_path: PathBuf,
    restarter: Box<dyn Restarter>,
    runtime_options: BTreeMap<String, String>,
}

impl Config {
    pub fn new(
        host: HostFs,
        config_path: impl Into<PathBuf>,
        restarter: Box<dyn Restarter>,
        runtime_options: BTreeMap<String, String>,
    ) -> Self {
        Self {
            host,
            config_path: config_path.into(),
            restarter,
            runtime_options,
        }
    }

    /// Register a shim in the config file.
    ///
    /// The config file must already exist. When the runtime name already
    /// appears anywhere in the file this is a no-op; presence of the name in
    /// the file bytes is authoritative.
    pub fn add_runtime(&self, shim_path: &Path) -> Result<()> {
        let name = runtime_name_of(shim_path);
        let real_path = self.host.resolve(&self.config_path);

        let data = std::fs::read_to_string(&real_path)
            .with_context(|| format!("failed to read {}", real_path.display()))?;

        if data.contains(&name) {
            info!(runtime = %name, "runtime config already exists, skipping");
            return Ok(());
        }

        let fragment = generate_config(shim_path, &name, &self.runtime_options, &data);

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&real_path)
            .with_context(|| format!("failed to open {} for append", real_path.display()))?;
        file.write_all(fragment.as_bytes())
            .with_context(|| format!("failed to append to {}", real_path.display()))?;

        Ok(())
    }

    /// Deregister a shim from the config file.
    ///
    /// The config file must already exist. Returns whether the file changed;
    /// an absent runtime name is a no-op returning `false`.
    pub fn remove_runtime(&self, shim_path: &Path) -> Result<bool> {
        let name = runtime_name_of(shim_path);
        let real_path = self.host.resolve(&self.config_path);

        let data = std::fs::read_to_string(&real_path)
            .with_context(|| format!("failed to read {}", real_path.display()))?;

        if !data.contains(&name) {
            warn!(runtime = %name, "runtime config does not exist, skipping");
            return Ok(false);
        }

        let fragment = generate_config(shim_path, &name, &self.runtime_options, &data);
        let modified = data.replace(&fragment, "");

        std::fs::write(&real_path, modified)
            .with_context(|| format!("failed to write {}", real_path.display()))?;

        Ok(true)
    }

    /// Restart the runtime through the preset's restarter.
    pub fn restart_runtime(&self) -> Result<()> {
        self.restarter.restart()
    }
}

fn runtime_name_of(shim_path: &Path) -> String {
    let base = shim_path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    runtime_name(&base).to_string()
}

/// Generate the registration fragment for a shim.
///
/// The existing file bytes select the CRI plugin domain: a `version = 3`
/// marker means containerd 2.x. Runtime options render in `BTreeMap` order
/// and values are inserted verbatim; callers own TOML quoting.
fn generate_config(
    shim_path: &Path,
    runtime_name: &str,
    runtime_options: &BTreeMap<String, String>,
    config_data: &str,
) -> String {
    let domain = if config_data.contains("version = 3") {
        CRI_DOMAIN_V3
    } else {
        CRI_DOMAIN_V2
    };

    let mut fragment = format!(
        "\n# RCM runtime config for {runtime_name}\n[plugins.\"{domain}\".containerd.runtimes.{runtime_name}]\nruntime_type = \"{}\"\n",
        shim_path.display()
    );

    if !runtime_options.is_empty() {
        fragment.push_str(&format!(
            "[plugins.\"{domain}\".containerd.runtimes.{runtime_name}.options]"
        ));
        for (key, value) in runtime_options {
            fragment.push_str(&format!("\n{key} = {value}"));
        }
    }

    fragment
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
