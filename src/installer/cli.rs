// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line and configuration surface of the node installer.
//!
//! Settings resolve with the precedence: command-line flag, then `RCM_`
//! environment variable (`-` mapped to `_`), then a `rcm.{yaml,toml,json}`
//! config file searched in `.` and `/etc`, then the built-in default.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default container runtime name.
const DEFAULT_RUNTIME: &str = "containerd";

/// Default RCM working directory on the host.
const DEFAULT_RCM_PATH: &str = "/opt/rcm";

/// Default host root mount point.
const DEFAULT_HOST_ROOT: &str = "/";

/// Default asset directory populated by the downloader init container.
const DEFAULT_ASSET_PATH: &str = "/assets";

/// Directories searched for a config file, in order.
const CONFIG_DIRS: [&str; 2] = [".", "/etc"];

/// rcm-node-installer manages containerd shims
#[derive(Debug, Parser)]
#[command(name = "rcm-node-installer")]
pub struct Cli {
    /// Set the container runtime to configure (containerd, cri-o)
    #[arg(short = 'r', long, global = true)]
    pub runtime: Option<String>,

    /// Path to the runtime config file. Will try to autodetect if left empty
    #[arg(short = 'c', long, global = true)]
    pub runtime_config: Option<PathBuf>,

    /// Working directory for the RuntimeClassManager on the host
    #[arg(short = 'k', long, global = true)]
    pub rcm_path: Option<PathBuf>,

    /// Path to the host root path
    #[arg(short = 'H', long, global = true)]
    pub host_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install containerd shims
    Install {
        /// Path to the asset to install
        #[arg(short = 'a', long)]
        asset_path: Option<PathBuf>,
    },
    /// Uninstall containerd shims
    Uninstall,
}

/// Fully resolved installer configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Runtime to configure; the provisioning job passes the shim name here.
    pub runtime: String,
    /// Explicit runtime config path; autodetected when `None`.
    pub runtime_config: Option<PathBuf>,
    /// RCM working directory on the host.
    pub rcm_path: PathBuf,
    /// Host root mount point.
    pub host_root: PathBuf,
    /// Asset file or directory to install from.
    pub asset_path: PathBuf,
}

/// Optional settings read from a config file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub runtime: Option<String>,
    pub runtime_config: Option<PathBuf>,
    pub rcm_path: Option<PathBuf>,
    pub host_root: Option<PathBuf>,
    pub asset_path: Option<PathBuf>,
}

/// Locate and parse `rcm.{yaml,toml,json}` from the search directories.
///
/// The first file found wins; a missing file yields empty settings, a
/// malformed one is an error.
pub fn load_file_config() -> Result<FileConfig> {
    for dir in CONFIG_DIRS {
        for name in ["rcm.yaml", "rcm.toml", "rcm.json"] {
            let path = Path::new(dir).join(name);
            if path.exists() {
                return parse_file_config(&path);
            }
        }
    }
    Ok(FileConfig::default())
}

fn parse_file_config(path: &Path) -> Result<FileConfig> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") => serde_yaml::from_str(&data)?,
        Some("toml") => toml::from_str(&data)?,
        Some("json") => serde_json::from_str(&data)?,
        other => anyhow::bail!("unsupported config file extension: {other:?}"),
    };
    Ok(parsed)
}

/// Resolve the effective configuration from flags, environment, and file.
///
/// `env` maps an `RCM_`-prefixed variable name to its value; production code
/// passes `std::env::var(..).ok()`.
pub fn resolve_config(
    cli: &Cli,
    file: &FileConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Config {
    let asset_path = match &cli.command {
        Command::Install { asset_path } => asset_path.clone(),
        Command::Uninstall => None,
    };

    Config {
        runtime: cli
            .runtime
            .clone()
            .or_else(|| env("RCM_RUNTIME"))
            .or_else(|| file.runtime.clone())
            .unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
        runtime_config: cli
            .runtime_config
            .clone()
            .or_else(|| env("RCM_RUNTIME_CONFIG").map(PathBuf::from))
            .or_else(|| file.runtime_config.clone()),
        rcm_path: cli
            .rcm_path
            .clone()
            .or_else(|| env("RCM_RCM_PATH").map(PathBuf::from))
            .or_else(|| file.rcm_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RCM_PATH)),
        host_root: cli
            .host_root
            .clone()
            .or_else(|| env("RCM_HOST_ROOT").map(PathBuf::from))
            .or_else(|| file.host_root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HOST_ROOT)),
        asset_path: asset_path
            .or_else(|| env("RCM_ASSET_PATH").map(PathBuf::from))
            .or_else(|| file.asset_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_PATH)),
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod cli_tests;
