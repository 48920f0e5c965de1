// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared imports for the shim reconciler modules.

pub(super) use crate::crd::{Shim, ShimStatus};
pub(super) use anyhow::{Context as _, Result};
pub(super) use k8s_openapi::api::batch::v1::Job;
pub(super) use k8s_openapi::api::core::v1::Node;
pub(super) use k8s_openapi::api::node::v1::RuntimeClass;
pub(super) use kube::api::ListParams;
pub(super) use kube::{Api, Client, Resource, ResourceExt};
pub(super) use tracing::{debug, error, info};
