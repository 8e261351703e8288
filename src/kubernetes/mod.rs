// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for API discovery and namespace lookups.

pub mod crd;
pub mod discovery;
pub mod namespaces;

pub use crd::wait_for_argocd_crd;
pub use discovery::{discover_capabilities, ClusterCapabilities};
pub use namespaces::{get_namespace, is_namespace_terminating, list_managed_namespaces};
