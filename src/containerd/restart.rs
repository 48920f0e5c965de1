// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Container runtime restart strategies.
//!
//! Each distribution preset picks a [`Restarter`]. Restarters prefer the
//! service manager when one is reachable and fall back to signalling the
//! runtime process directly. Every host command runs inside the host's mount
//! namespace via `nsenter`, since the installer itself runs in a container.

use anyhow::{Context, Result};
use regex::Regex;
use std::process::{Command, Output};
use tracing::debug;

/// Environment variable naming the host root mount point, used to reach the
/// host's mount namespace through `/proc/1/ns/mnt`.
pub const HOST_ROOT_ENV: &str = "HOST_ROOT";

/// Restarts the container runtime after a configuration change.
pub trait Restarter {
    fn restart(&self) -> Result<()>;
}

/// Build a command that executes inside the host's mount namespace.
pub fn nsenter_cmd(args: &[&str]) -> Command {
    let host_root = std::env::var(HOST_ROOT_ENV).unwrap_or_default();
    let mut cmd = Command::new("nsenter");
    cmd.arg(format!("-m/{host_root}/proc/1/ns/mnt"));
    cmd.arg("--");
    cmd.args(args);
    cmd
}

/// List systemd service units on the host.
///
/// Success doubles as the probe for "is systemd reachable here".
pub fn list_systemd_units() -> Result<Vec<u8>> {
    let output = nsenter_cmd(&["systemctl", "list-units", "--type", "service"])
        .output()
        .context("failed to run systemctl list-units")?;
    if !output.status.success() {
        anyhow::bail!(
            "systemctl list-units failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output.stdout)
}

/// Run a restart command, surfacing combined output on failure.
fn run_restart(service: &str) -> Result<()> {
    let output: Output = nsenter_cmd(&["systemctl", "restart", service])
        .output()
        .with_context(|| format!("failed to run systemctl restart {service}"))?;
    debug!(
        service,
        stdout = %String::from_utf8_lossy(&output.stdout),
        stderr = %String::from_utf8_lossy(&output.stderr),
        "systemctl restart finished"
    );
    if !output.status.success() {
        anyhow::bail!(
            "unable to restart {service}: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

/// Find the PID of exactly one process whose executable name matches.
///
/// The provisioning pod runs with host PID, so `/proc` enumerates host
/// processes. Any count other than one is an error; signalling the wrong
/// process would be worse than failing.
pub fn get_pid(executable: &str) -> Result<i32> {
    let mut pids = Vec::new();
    for entry in std::fs::read_dir("/proc").context("could not read /proc")? {
        let entry = entry?;
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<i32>() else {
            continue;
        };
        let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) else {
            continue;
        };
        if comm.trim_end() == executable {
            pids.push(pid);
        }
    }

    match pids.as_slice() {
        [pid] => Ok(*pid),
        other => anyhow::bail!(
            "need exactly one {executable} process, found: {}",
            other.len()
        ),
    }
}

/// Send SIGHUP to a host process.
fn send_sighup(pid: i32, executable: &str) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid), Signal::SIGHUP)
        .with_context(|| format!("failed to send SIGHUP to {executable} (pid {pid})"))
}

/// Restart the named service when systemd is reachable, else SIGHUP the
/// single process with the given executable name.
fn restart_service_or_signal(service: &str, executable: &str) -> Result<()> {
    if list_systemd_units().is_ok() {
        run_restart(service)
    } else {
        let pid = get_pid(executable)?;
        debug!(executable, pid, "found runtime process");
        send_sighup(pid, executable)
    }
}

/// Pick the distro service unit out of a systemd unit listing.
pub(crate) fn find_service(units: &[u8], pattern: &str) -> Result<String> {
    let re = Regex::new(pattern).expect("service pattern must be a valid regex");
    let listing = String::from_utf8_lossy(units);
    re.find(&listing)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| anyhow::anyhow!("no service matching '{pattern}' in systemd unit listing"))
}

/// Stock containerd: systemd restart with a SIGHUP fallback.
pub struct DefaultRestarter;

impl Restarter for DefaultRestarter {
    fn restart(&self) -> Result<()> {
        restart_service_or_signal("containerd", "containerd")
    }
}

/// K3s bundles containerd into the `k3s` service. K3d runs without systemd,
/// hence the same process-signal fallback as the default restarter.
pub struct K3sRestarter;

impl Restarter for K3sRestarter {
    fn restart(&self) -> Result<()> {
        restart_service_or_signal("k3s", "k3s")
    }
}

/// MicroK8s always runs containerd as a snap service.
pub struct MicroK8sRestarter;

impl Restarter for MicroK8sRestarter {
    fn restart(&self) -> Result<()> {
        run_restart("snap.microk8s.daemon-containerd")
    }
}

/// RKE2 runs as either `rke2-agent` or `rke2-server`; the unit listing
/// tells us which.
pub struct Rke2Restarter;

impl Restarter for Rke2Restarter {
    fn restart(&self) -> Result<()> {
        let units = list_systemd_units()?;
        let service = find_service(&units, "rke2-agent|rke2-server")?;
        run_restart(&service)
    }
}

/// K0s runs as either `k0sworker` or `k0scontroller`.
pub struct K0sRestarter;

impl Restarter for K0sRestarter {
    fn restart(&self) -> Result<()> {
        let units = list_systemd_units()?;
        let service = find_service(&units, "k0sworker|k0scontroller")?;
        run_restart(&service)
    }
}

#[cfg(test)]
#[path = "restart_tests.rs"]
mod restart_tests;
