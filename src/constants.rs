// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the RCM operator.
//!
//! This module contains the numeric and string constants used throughout the
//! codebase, organized by category.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the RCM CRDs
pub const API_GROUP: &str = "runtime.firestoned.io";

/// API version for the RCM CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Kind name for the `Shim` resource
pub const KIND_SHIM: &str = "Shim";

/// Maximum length of a Kubernetes object name
pub const K8S_NAME_MAX_LENGTH: usize = 63;

/// Field manager identity for server-side apply
pub const FIELD_MANAGER: &str = "rcm-controller";

// ============================================================================
// Controller Environment Variables
// ============================================================================

/// Image used by the provisioner container in install/uninstall jobs
pub const NODE_INSTALLER_IMAGE_ENV: &str = "SHIM_NODE_INSTALLER_IMAGE";

/// Image used by the downloader init container in install jobs
pub const DOWNLOADER_IMAGE_ENV: &str = "SHIM_DOWNLOADER_IMAGE";

/// Namespace the controller materializes jobs into
pub const CONTROLLER_NAMESPACE_ENV: &str = "CONTROLLER_NAMESPACE";

/// Optional TTL (seconds) applied to finished installer jobs
pub const JOB_TTL_ENV: &str = "SHIM_NODE_INSTALLER_JOB_TTL";

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue interval for shims whose nodes are all provisioned (5 minutes)
pub const REQUEUE_WHEN_READY_SECS: u64 = 300;

/// Requeue interval for shims with pending nodes (30 seconds)
pub const REQUEUE_WHEN_NOT_READY_SECS: u64 = 30;

// ============================================================================
// Condition Constants
// ============================================================================

/// Condition type for shim readiness
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Condition status indicating the condition holds
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status indicating the condition does not hold
pub const CONDITION_STATUS_FALSE: &str = "False";

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election retry period (2 seconds)
pub const DEFAULT_LEASE_RETRY_PERIOD_SECS: u64 = 2;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
