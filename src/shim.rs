// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shim binary installation on the host filesystem.
//!
//! Binaries land under `<rcm_path>/bin/<shim name>` on the host. The install
//! streams the source file into a truncated destination while hashing it, so
//! one pass produces both the installed binary and the content digest used
//! for change detection against the [`crate::state`] record.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::hostfs::HostFs;
use crate::state::{self, State};

/// Prefix stripped from a shim binary name to obtain the runtime name.
const SHIM_PREFIX: &str = "containerd-shim-";

/// Mode for the `bin` directory hierarchy.
const DIR_MODE: u32 = 0o775;

/// Mode for installed shim binaries.
const BIN_MODE: u32 = 0o755;

/// Derive the containerd runtime name from a shim binary name.
///
/// `containerd-shim-spin-v2` registers as runtime `spin-v2`.
#[must_use]
pub fn runtime_name(binary: &str) -> &str {
    binary.strip_prefix(SHIM_PREFIX).unwrap_or(binary)
}

/// Shim file operations bound to an asset directory and the host filesystem.
pub struct Config {
    host: HostFs,
    asset_path: PathBuf,
    rcm_path: PathBuf,
}

impl Config {
    pub fn new(host: HostFs, asset_path: impl Into<PathBuf>, rcm_path: impl Into<PathBuf>) -> Self {
        Self {
            host,
            asset_path: asset_path.into(),
            rcm_path: rcm_path.into(),
        }
    }

    /// Host-absolute path a shim binary installs to.
    #[must_use]
    pub fn bin_path(&self, shim_name: &str) -> PathBuf {
        self.rcm_path.join("bin").join(shim_name)
    }

    /// Install one shim binary from the asset directory onto the host.
    ///
    /// Copies `<asset_path>/<shim_name>` to `<rcm_path>/bin/<shim_name>`,
    /// hashing the bytes en route. When the resulting `{path, digest}` pair
    /// differs from the state record, the record is updated and persisted.
    ///
    /// Returns the host-absolute destination path and whether anything
    /// changed.
    pub fn install(&self, shim_name: &str) -> Result<(PathBuf, bool)> {
        let src_path = self.asset_path.join(shim_name);
        let mut src = std::fs::File::open(&src_path)
            .with_context(|| format!("failed to open asset {}", src_path.display()))?;

        let dst_host_path = self.bin_path(shim_name);
        let dst_real_path = self.host.resolve(&dst_host_path);

        if let Some(parent) = dst_real_path.parent() {
            create_dir_all_with_mode(parent, DIR_MODE)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut dst = open_truncated_with_mode(&dst_real_path, BIN_MODE)
            .with_context(|| format!("failed to create {}", dst_real_path.display()))?;

        let mut state = State::load(&self.host, &self.rcm_path)?;

        let digest = copy_and_hash(&mut src, &mut dst)?;
        let digest_hex = hex::encode(digest);

        let name = runtime_name(shim_name);
        let dst_str = dst_host_path.to_string_lossy().to_string();
        let changed = state.shim_changed(name, &digest_hex, &dst_str);
        if changed {
            state.update_shim(
                name,
                state::Shim {
                    path: dst_str,
                    sha256: digest_hex,
                },
            );
            state.write()?;
        }

        Ok((dst_host_path, changed))
    }

    /// Remove an installed shim binary from the host.
    ///
    /// The shim must be present in the state record; a missing binary on
    /// disk is tolerated. The state entry itself is kept so a later
    /// re-install of identical bytes is still a no-op.
    ///
    /// Returns the host-absolute path the binary was installed at.
    pub fn uninstall(&self, shim_name: &str) -> Result<PathBuf> {
        let state = State::load(&self.host, &self.rcm_path)?;
        let name = runtime_name(shim_name);
        if !state.contains(name) {
            anyhow::bail!("shim '{name}' is not installed");
        }

        let bin_host_path = self.bin_path(shim_name);
        let bin_real_path = self.host.resolve(&bin_host_path);
        match std::fs::remove_file(&bin_real_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to remove {}", bin_real_path.display()))
            }
        }

        Ok(bin_host_path)
    }
}

/// Stream `src` into `dst`, returning the SHA-256 of the copied bytes.
fn copy_and_hash(src: &mut impl Read, dst: &mut impl Write) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        dst.write_all(&buf[..n])?;
    }
    dst.flush()?;
    Ok(hasher.finalize().into())
}

#[cfg(unix)]
fn create_dir_all_with_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
}

#[cfg(unix)]
fn open_truncated_with_mode(path: &Path, mode: u32) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
}

#[cfg(test)]
#[path = "shim_tests.rs"]
mod shim_tests;
