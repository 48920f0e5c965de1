// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Containerd distribution detection.

use anyhow::Result;
use tracing::warn;

use crate::hostfs::HostFs;
use crate::installer::cli::Config;
use crate::preset::{Settings, DETECTION_ORDER};

/// Detect which containerd distribution runs on the host.
///
/// An explicit `--runtime-config` path short-circuits detection: it either
/// matches a known distribution's canonical path or falls back to the
/// default preset with the path substituted. Otherwise the canonical config
/// paths are probed in order, distribution-specific paths before the stock
/// one, because the stock path may also exist on distribution-specific
/// systems.
pub fn detect_distro(config: &Config, host: &HostFs) -> Result<Settings> {
    if let Some(path) = &config.runtime_config {
        if let Some(settings) = Settings::from_config_path(path) {
            return Ok(settings);
        }
        warn!(
            config = %path.display(),
            "could not determine distro from containerd config, falling back to defaults"
        );
        return Ok(Settings::default_with_config_path(path));
    }

    let mut probed = Vec::new();
    for distro in DETECTION_ORDER {
        let canonical = distro.canonical_config_path();
        if host.exists(canonical) {
            return Ok(Settings::for_distro(distro));
        }
        probed.push(canonical);
    }

    anyhow::bail!(
        "failed to detect containerd config path: none of {} exist under {}",
        probed.join(", "),
        host.root().display()
    )
}

#[cfg(test)]
#[path = "detect_tests.rs"]
mod detect_tests;
