// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The node-local install flow.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::containerd::{self, dbus::install_dbus, restart::list_systemd_units, restart::Restarter};
use crate::hostfs::HostFs;
use crate::installer::cli::Config;
use crate::preset::Settings;
use crate::shim;

/// Install every shim in the asset path onto the host.
///
/// Each asset is copied under `<rcm_path>/bin` and registered in the runtime
/// config. The runtime only restarts when at least one binary actually
/// changed; on systemd hosts a D-Bus bootstrap runs first so `systemctl`
/// can do its job on minimal node images.
pub fn run_install(
    config: &Config,
    host: &HostFs,
    settings: &Settings,
    restarter: Box<dyn Restarter>,
    runtime_options: BTreeMap<String, String>,
) -> Result<()> {
    let (asset_dir, files) = list_assets(&config.asset_path)?;

    let containerd_config = containerd::Config::new(
        host.clone(),
        &settings.config_path,
        restarter,
        runtime_options,
    );
    let shim_config = shim::Config::new(host.clone(), asset_dir, &config.rcm_path);

    let mut anything_changed = false;
    for file_name in files {
        let runtime = shim::runtime_name(&file_name).to_string();

        let (bin_path, changed) = shim_config
            .install(&file_name)
            .with_context(|| format!("failed to install shim '{runtime}'"))?;
        anything_changed = anything_changed || changed;
        info!(shim = %runtime, path = %bin_path.display(), new_version = changed, "shim installed");

        containerd_config
            .add_runtime(&bin_path)
            .context("failed to write containerd config")?;
        info!(shim = %runtime, config = %settings.config_path.display(), "shim configured");
    }

    if !anything_changed {
        info!("nothing changed, nothing more to do");
        return Ok(());
    }

    if list_systemd_units().is_ok() {
        install_dbus().context("failed to install D-Bus")?;
    }

    info!("restarting containerd");
    containerd_config
        .restart_runtime()
        .context("failed to restart containerd")?;

    Ok(())
}

/// Enumerate the asset path as `(directory, file names)`.
///
/// A single file is treated as a one-entry listing rooted at its parent.
/// Names sort so multi-shim installs process in a stable order.
fn list_assets(asset_path: &PathBuf) -> Result<(PathBuf, Vec<String>)> {
    let info = std::fs::metadata(asset_path)
        .with_context(|| format!("failed to stat {}", asset_path.display()))?;

    if info.is_dir() {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(asset_path)? {
            files.push(entry?.file_name().to_string_lossy().to_string());
        }
        files.sort();
        Ok((asset_path.clone(), files))
    } else {
        let name = asset_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .context("asset path has no file name")?;
        let dir = asset_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((dir, vec![name]))
    }
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod install_tests;
