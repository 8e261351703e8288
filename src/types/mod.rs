// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resource types owned or consumed by the operator.

pub mod argocd;
pub mod route;
pub mod service_monitor;
pub mod template;

pub use argocd::{ArgoCD, ArgoCDSpec, ArgoCDStatus, SSOProviderType};
pub use route::Route;
pub use service_monitor::ServiceMonitor;
pub use template::TemplateInstance;
