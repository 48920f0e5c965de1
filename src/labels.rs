// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Labels, annotations, and lifecycle markers used across the reconcilers.
//!
//! A node's install state for a shim lives in a *lifecycle label* whose key
//! is the shim's name. The reconciler writes `pending`, `uninstall`, and
//! `failed`; the provisioning job flips `pending` to `provisioned` from the
//! outside.

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `Shim` resources
pub const FINALIZER_SHIM: &str = "runtime.firestoned.io/finalizer";

// ============================================================================
// Job Annotations
// ============================================================================

/// Annotation naming the node a provisioning job targets
pub const ANNOTATION_NODE_NAME: &str = "runtime.firestoned.io/nodeName";

/// Annotation naming the shim a provisioning job installs
pub const ANNOTATION_SHIM_NAME: &str = "runtime.firestoned.io/shimName";

/// Annotation naming the operation a provisioning job performs
pub const ANNOTATION_OPERATION: &str = "runtime.firestoned.io/operation";

// ============================================================================
// Job Labels
// ============================================================================

/// Label naming the shim a provisioning job installs
pub const LABEL_SHIM_NAME: &str = "runtime.firestoned.io/shimName";

/// Label naming the operation a provisioning job performs
pub const LABEL_OPERATION: &str = "runtime.firestoned.io/operation";

/// Marker label identifying RCM provisioning jobs
pub const LABEL_JOB: &str = "runtime.firestoned.io/job";

// ============================================================================
// Lifecycle Label Values
// ============================================================================

/// An install job has been dispatched; the node is converging
pub const PROVISIONING_STATUS_PENDING: &str = "pending";

/// The shim is installed and the runtime restarted on this node
pub const PROVISIONING_STATUS_PROVISIONED: &str = "provisioned";

/// An uninstall job has been dispatched for this node
pub const PROVISIONING_STATUS_UNINSTALL: &str = "uninstall";

/// Dispatching a provisioning job for this node failed
pub const PROVISIONING_STATUS_FAILED: &str = "failed";
