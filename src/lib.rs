// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod error;
pub mod kubernetes;
pub mod mutation;
pub mod reconcilers;
pub mod resource;
pub mod types;
pub mod util;
pub mod workloads;

#[cfg(test)]
pub mod test_utils;
