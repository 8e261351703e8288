// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers for the ArgoCD custom resource and the components it deploys.

pub mod appcontroller;
pub mod argocd;
pub mod common;
pub mod notifications;
pub mod rbac;
pub mod redis;
pub mod reposerver;
pub mod sso;
pub mod tls;

pub use argocd::ArgoCDController;
pub use common::Context;
