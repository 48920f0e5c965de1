// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node installer binary.
//!
//! Runs inside the privileged provisioning job on a target node and installs
//! or uninstalls containerd shims against the host filesystem.

use clap::Parser;
use rcm::installer::{self, cli::Cli};
use tracing::error;

fn main() {
    initialize_logging();

    let cli = Cli::parse();
    if let Err(err) = installer::run(&cli) {
        error!(error = ?err, "node installer failed");
        std::process::exit(1);
    }
}

/// Initialize logging with the `RUST_LOG` filter, defaulting to INFO.
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
