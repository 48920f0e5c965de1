// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The node-local uninstall flow.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::info;

use crate::containerd::{self, restart::Restarter};
use crate::hostfs::HostFs;
use crate::installer::cli::Config;
use crate::preset::Settings;
use crate::shim;

/// Remove one shim from the host and deregister it from the runtime config.
///
/// The shim name arrives through the `--runtime` flag, the same way the
/// provisioning job passes it to install. The runtime only restarts when the
/// config actually changed; the host state record keeps its entry either way.
pub fn run_uninstall(
    config: &Config,
    host: &HostFs,
    settings: &Settings,
    restarter: Box<dyn Restarter>,
    runtime_options: BTreeMap<String, String>,
) -> Result<()> {
    let shim_name = &config.runtime;
    info!(shim = %shim_name, "uninstall called");

    let containerd_config = containerd::Config::new(
        host.clone(),
        &settings.config_path,
        restarter,
        runtime_options,
    );
    let shim_config = shim::Config::new(host.clone(), &config.asset_path, &config.rcm_path);

    let bin_path = shim_config
        .uninstall(shim_name)
        .with_context(|| format!("failed to delete shim '{shim_name}'"))?;

    let config_changed = containerd_config
        .remove_runtime(&bin_path)
        .with_context(|| format!("failed to write containerd config for shim '{shim_name}'"))?;

    if !config_changed {
        info!("nothing changed, nothing more to do");
        return Ok(());
    }

    info!("restarting containerd");
    containerd_config
        .restart_runtime()
        .context("failed to restart containerd")?;

    Ok(())
}

#[cfg(test)]
#[path = "uninstall_tests.rs"]
mod uninstall_tests;
