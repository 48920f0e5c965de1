// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! D-Bus bootstrap for systemd hosts.
//!
//! `systemctl restart` needs a running system bus. Minimal node images
//! sometimes ship without one, so before restarting the runtime we make sure
//! D-Bus is present: try to start it, and if that fails, install it with
//! whichever package manager the host has.
//!
//! This limits support to hosts that manage systemd through `systemctl`.

use anyhow::{Context, Result};
use tracing::info;

use crate::containerd::restart::nsenter_cmd;

struct PkgManager {
    name: &'static str,
    check: &'static [&'static str],
    update: &'static [&'static str],
    install: &'static [&'static str],
}

const MANAGERS: &[PkgManager] = &[
    PkgManager {
        name: "apt-get",
        check: &["which", "apt-get"],
        update: &["apt-get", "update", "--yes"],
        install: &["apt-get", "install", "--yes", "dbus"],
    },
    PkgManager {
        name: "dnf",
        check: &["which", "dnf"],
        update: &[],
        install: &["dnf", "install", "--yes", "dbus"],
    },
    PkgManager {
        name: "apk",
        check: &["which", "apk"],
        update: &[],
        install: &["apk", "add", "dbus"],
    },
    PkgManager {
        name: "yum",
        check: &["which", "yum"],
        update: &[],
        install: &["yum", "install", "--yes", "dbus"],
    },
];

fn run_quiet(args: &[&str]) -> Result<bool> {
    let status = nsenter_cmd(args)
        .status()
        .with_context(|| format!("failed to run {args:?}"))?;
    Ok(status.success())
}

/// Ensure D-Bus is installed and running on the host.
///
/// Starting the service is attempted first; when that fails, the package
/// managers are probed in a fixed order and the first available one installs
/// the bus. Only when no package manager is found, or the chosen one fails,
/// is this an error.
pub fn install_dbus() -> Result<()> {
    if run_quiet(&["systemctl", "start", "dbus", "--quiet"])? {
        info!("D-Bus is already installed and running");
        return Ok(());
    }
    info!("installing D-Bus");

    let mut installed = false;
    for mgr in MANAGERS {
        if !run_quiet(mgr.check)? {
            continue;
        }
        if !mgr.update.is_empty() && !run_quiet(mgr.update)? {
            anyhow::bail!("failed to update package manager {}", mgr.name);
        }
        if !run_quiet(mgr.install)? {
            anyhow::bail!("failed to install D-Bus with {}", mgr.name);
        }
        installed = true;
        break;
    }

    if !installed {
        anyhow::bail!("could not install D-Bus as no supported package manager found");
    }

    info!("restarting D-Bus");
    if !run_quiet(&["systemctl", "restart", "dbus"])? {
        anyhow::bail!("failed to restart D-Bus");
    }

    Ok(())
}
