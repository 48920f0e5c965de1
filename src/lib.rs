// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # RCM - Runtime Class Manager for Kubernetes
//!
//! RCM is a Kubernetes operator written in Rust that installs and
//! lifecycle-manages containerd shims across cluster nodes, exposing each
//! shim as a selectable RuntimeClass for workloads.
//!
//! ## Overview
//!
//! An operator declares a [`crd::Shim`]: where to fetch the binary, which
//! nodes to target, and the RuntimeClass to register. The controller
//! converges every matching node by dispatching privileged provisioning
//! jobs; inside those jobs the node installer (`rcm-node-installer`) mutates
//! the host: binary installed under the RCM working directory, containerd
//! config amended, runtime restarted. Content-hash change detection
//! keeps re-runs cheap.
//!
//! ## Modules
//!
//! - [`crd`] - The `Shim` Custom Resource Definition
//! - [`reconcilers`] - Controller-side reconciliation logic
//! - [`installer`] - The node-local installer CLI
//! - [`containerd`] - Containerd config editing and restart strategies
//! - [`preset`] - Distribution presets and detection
//! - [`shim`] - Shim binary installation on the host
//! - [`state`] - Per-host install state with digest-based change detection
//! - [`hostfs`] - Host filesystem access through the node-root mount
//!
//! ## Example
//!
//! ```rust,no_run
//! use rcm::crd::{FetchStrategy, AnonHttpSpec, RuntimeClassSpec, ShimSpec};
//!
//! let spec = ShimSpec {
//!     node_selector: None,
//!     fetch_strategy: FetchStrategy {
//!         anon_http: Some(AnonHttpSpec {
//!             location: "https://example.com/containerd-shim-spin-v2.tar.gz".to_string(),
//!         }),
//!         platforms: None,
//!     },
//!     runtime_class: RuntimeClassSpec {
//!         name: "spin".to_string(),
//!         handler: "spin".to_string(),
//!     },
//!     rollout_strategy: Default::default(),
//!     containerd_runtime_options: None,
//! };
//! ```

pub mod constants;
pub mod containerd;
pub mod crd;
pub mod hostfs;
pub mod installer;
pub mod labels;
pub mod metrics;
pub mod preset;
pub mod reconcilers;
pub mod shim;
pub mod state;
