// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Distribution presets for containerd-based Kubernetes distributions.
//!
//! Each supported distribution bundles the canonical containerd config path,
//! a pre-install setup hook, and the restart strategy that distribution
//! needs. Detection probes the distribution-specific config paths before the
//! stock containerd path, since the stock path may also exist on
//! distribution-specific systems.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::containerd::restart::{
    DefaultRestarter, K0sRestarter, K3sRestarter, MicroK8sRestarter, Restarter, Rke2Restarter,
};
use crate::hostfs::HostFs;

/// Stock containerd config path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/containerd/config.toml";

/// MicroK8s containerd template path.
pub const MICROK8S_CONFIG_PATH: &str = "/var/snap/microk8s/current/args/containerd-template.toml";

/// RKE2 containerd config template path.
pub const RKE2_CONFIG_PATH: &str = "/var/lib/rancher/rke2/agent/etc/containerd/config.toml.tmpl";

/// K3s containerd config template path.
pub const K3S_CONFIG_PATH: &str = "/var/lib/rancher/k3s/agent/etc/containerd/config.toml.tmpl";

/// K0s containerd drop-in config path.
pub const K0S_CONFIG_PATH: &str = "/etc/k0s/containerd.d/config.toml";

/// A supported containerd distribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Distro {
    Default,
    MicroK8s,
    Rke2,
    K3s,
    K0s,
}

/// Probe order for distribution detection. The stock path comes last.
pub const DETECTION_ORDER: [Distro; 5] = [
    Distro::MicroK8s,
    Distro::Rke2,
    Distro::K3s,
    Distro::K0s,
    Distro::Default,
];

impl Distro {
    /// The canonical config path this distribution's containerd reads.
    #[must_use]
    pub fn canonical_config_path(self) -> &'static str {
        match self {
            Distro::Default => DEFAULT_CONFIG_PATH,
            Distro::MicroK8s => MICROK8S_CONFIG_PATH,
            Distro::Rke2 => RKE2_CONFIG_PATH,
            Distro::K3s => K3S_CONFIG_PATH,
            Distro::K0s => K0S_CONFIG_PATH,
        }
    }
}

/// Resolved preset: a distribution plus the config path to operate on.
///
/// The path usually equals the distribution's canonical path but may be
/// overridden by an explicit `--runtime-config` flag.
#[derive(Clone, Debug)]
pub struct Settings {
    pub distro: Distro,
    pub config_path: PathBuf,
}

impl Settings {
    /// Preset for a distribution at its canonical config path.
    #[must_use]
    pub fn for_distro(distro: Distro) -> Self {
        Self {
            distro,
            config_path: PathBuf::from(distro.canonical_config_path()),
        }
    }

    /// Preset for an explicit config path, when it matches a known
    /// distribution's canonical path.
    #[must_use]
    pub fn from_config_path(path: &Path) -> Option<Self> {
        DETECTION_ORDER
            .iter()
            .find(|distro| Path::new(distro.canonical_config_path()) == path)
            .map(|distro| Self::for_distro(*distro))
    }

    /// The default preset with a substituted config path.
    #[must_use]
    pub fn default_with_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            distro: Distro::Default,
            config_path: path.into(),
        }
    }

    /// Run the distribution's pre-install setup hook.
    ///
    /// RKE2 and K3s read a `.tmpl` config when present; when it does not
    /// exist yet, the non-template sibling is copied to it so the appended
    /// registration survives distribution restarts. K0s reads a drop-in
    /// directory, so an empty config file is created when missing.
    pub fn setup(&self, host: &HostFs) -> Result<()> {
        match self.distro {
            Distro::Default | Distro::MicroK8s => Ok(()),
            Distro::Rke2 | Distro::K3s => self.setup_template_config(host),
            Distro::K0s => self.setup_empty_config(host),
        }
    }

    fn setup_template_config(&self, host: &HostFs) -> Result<()> {
        let real_path = host.resolve(&self.config_path);
        match std::fs::metadata(&real_path) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let src = self
                    .config_path
                    .to_string_lossy()
                    .trim_end_matches(".tmpl")
                    .to_string();
                std::fs::copy(host.resolve(&src), &real_path)
                    .with_context(|| format!("failed to copy {src} to template config"))?;
                Ok(())
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to stat {}", real_path.display()))
            }
        }
    }

    fn setup_empty_config(&self, host: &HostFs) -> Result<()> {
        let real_path = host.resolve(&self.config_path);
        match std::fs::metadata(&real_path) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                std::fs::File::create(&real_path)
                    .with_context(|| format!("failed to create {}", real_path.display()))?;
                Ok(())
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to stat {}", real_path.display()))
            }
        }
    }

    /// The restart strategy for this distribution.
    #[must_use]
    pub fn restarter(&self) -> Box<dyn Restarter> {
        match self.distro {
            Distro::Default => Box::new(DefaultRestarter),
            Distro::MicroK8s => Box::new(MicroK8sRestarter),
            Distro::Rke2 => Box::new(Rke2Restarter),
            Distro::K3s => Box::new(K3sRestarter),
            Distro::K0s => Box::new(K0sRestarter),
        }
    }
}

#[cfg(test)]
#[path = "preset_tests.rs"]
mod preset_tests;
