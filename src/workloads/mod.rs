// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed requests for desired objects and kind specific cluster operations.

pub mod deployment;
pub mod request;
pub mod secret;

pub use deployment::{trigger_deployment_rollout, trigger_statefulset_rollout};
pub use request::Request;
pub use secret::{find_secret_owner_instance, NamespacedName};
