// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The node installer.
//!
//! This is the node-local half of RCM: a CLI executed inside a privileged
//! provisioning job, mutating the host filesystem through the bind-mounted
//! node root.
//!
//! ## Module Structure
//!
//! - [`cli`] - Command line, config file, and environment resolution
//! - [`detect`] - Containerd distribution detection
//! - [`install`] - The install flow
//! - [`uninstall`] - The uninstall flow

pub mod cli;
pub mod detect;
pub mod install;
pub mod uninstall;

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use crate::hostfs::HostFs;
use cli::{Cli, Command, Config};

/// Environment variable carrying runtime options as a JSON object.
pub const RUNTIME_OPTIONS_ENV: &str = "RUNTIME_OPTIONS";

/// Parse runtime options from the `RUNTIME_OPTIONS` environment variable.
///
/// An unset or empty variable yields an empty map; malformed JSON is an
/// error.
pub fn runtime_options() -> Result<BTreeMap<String, String>> {
    let options_json = std::env::var(RUNTIME_OPTIONS_ENV).unwrap_or_default();
    if options_json.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&options_json)
        .with_context(|| format!("failed to unmarshal runtime options JSON {options_json}"))
}

/// Resolve configuration and dispatch the requested operation.
pub fn run(cli: &Cli) -> Result<()> {
    let file_config = cli::load_file_config()?;
    let config: Config = cli::resolve_config(cli, &file_config, |key| std::env::var(key).ok());

    let host = HostFs::new(&config.host_root);

    let settings =
        detect::detect_distro(&config, &host).context("failed to detect containerd config")?;
    let options = runtime_options().context("failed to get runtime options")?;
    let restarter = settings.restarter();

    match cli.command {
        Command::Install { .. } => {
            settings
                .setup(&host)
                .context("failed to run distro setup")?;
            install::run_install(&config, &host, &settings, restarter, options)
        }
        Command::Uninstall => {
            uninstall::run_uninstall(&config, &host, &settings, restarter, options)
        }
    }
}
