// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Persistent per-host installation state.
//!
//! The node installer keeps a single JSON file under the RCM working
//! directory on each host, mapping runtime name to the installed binary path
//! and its SHA-256 digest. The record is the source of truth for no-op
//! detection: an install whose destination path and content digest both
//! match the stored entry changes nothing and skips the runtime restart.
//!
//! Uninstall deliberately leaves entries in place; a later re-install of the
//! same bytes is then still detected as a no-op.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::hostfs::HostFs;

/// File name of the state record under the RCM working directory.
const STATE_FILE: &str = "state.json";

/// A single installed shim entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shim {
    /// Host-absolute path of the installed binary.
    pub path: String,
    /// Lowercase hex SHA-256 of the binary's bytes at install time.
    pub sha256: String,
}

/// The per-host state record: runtime name → installed shim.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    shims: BTreeMap<String, Shim>,

    #[serde(skip)]
    file: PathBuf,
}

impl State {
    /// Load the state record from `<rcm_path>/state.json` on the host.
    ///
    /// A missing file yields an empty record; a present but unreadable or
    /// corrupt file is an error (state must never be fabricated).
    pub fn load(host: &HostFs, rcm_path: &Path) -> Result<Self> {
        let file = host.resolve(rcm_path.join(STATE_FILE));

        let mut state = match std::fs::read(&file) {
            Ok(data) => serde_json::from_slice::<Self>(&data)
                .with_context(|| format!("corrupt state file {}", file.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", file.display()))
            }
        };
        state.file = file;

        Ok(state)
    }

    /// Whether the stored entry for `runtime_name` differs from the proposed
    /// `{path, sha256}` pair. A missing entry counts as changed.
    #[must_use]
    pub fn shim_changed(&self, runtime_name: &str, sha256: &str, path: &str) -> bool {
        self.shims
            .get(runtime_name)
            .is_none_or(|shim| shim.sha256 != sha256 || shim.path != path)
    }

    /// Insert or replace the entry for `runtime_name`.
    pub fn update_shim(&mut self, runtime_name: &str, shim: Shim) {
        self.shims.insert(runtime_name.to_string(), shim);
    }

    /// Whether the record contains an entry for `runtime_name`.
    #[must_use]
    pub fn contains(&self, runtime_name: &str) -> bool {
        self.shims.contains_key(runtime_name)
    }

    /// Persist the record as a whole-file replacement.
    ///
    /// Only one installer runs per node at a time, so there is no concurrent
    /// writer to coordinate with.
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(&self.file, data)
            .with_context(|| format!("failed to write {}", self.file.display()))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
