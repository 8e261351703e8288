// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Single sign-on through Dex or Keycloak.
//!
//! Only one provider may be configured at a time. The requested provider is
//! validated before anything is deployed and objects of the other provider
//! are removed.

mod dex;
mod keycloak;

use crate::config::Config;
use crate::error::{ArgoCDOperatorError, Result};
use crate::reconcilers::common::Context;
use crate::types::{ArgoCD, SSOProviderType};
use kube::ResourceExt;
use std::fmt;
use tracing::{debug, instrument};

/// Outcome of the SSO configuration check, recorded in the instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SSOConfigStatus {
    Unknown,
    Success,
    Failed,
}

impl SSOConfigStatus {
    pub fn from_validation(result: &Result<Option<SSOProviderType>>) -> Self {
        match result {
            Ok(None) => Self::Unknown,
            Ok(Some(_)) => Self::Success,
            Err(_) => Self::Failed,
        }
    }
}

impl fmt::Display for SSOConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "Unknown",
            Self::Success => "Success",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

fn illegal(reason: &str) -> ArgoCDOperatorError {
    ArgoCDOperatorError::IllegalSSOConfiguration(reason.to_string())
}

/// Check that the SSO section names exactly one supported provider and only
/// carries configuration for that provider.
///
/// Returns the requested provider, or `None` when SSO is not configured.
pub fn validate_sso_configuration(instance: &ArgoCD, config: &Config) -> Result<Option<SSOProviderType>> {
    let Some(sso) = instance.spec.sso.as_ref() else {
        return Ok(None);
    };
    let provider = sso.provider.as_deref().unwrap_or_default();

    match SSOProviderType::parse(provider) {
        Some(SSOProviderType::Dex) => {
            if !sso.dex.as_ref().is_some_and(|dex| dex.is_usable()) {
                return Err(illegal(
                    "must supply valid dex configuration when requested SSO provider is dex",
                ));
            }
            if sso.keycloak.is_some() {
                return Err(illegal(
                    "cannot supply keycloak configuration in .spec.sso.keycloak when requested SSO provider is dex",
                ));
            }
            if config.disable_dex {
                return Err(illegal(
                    "dex is disabled through DISABLE_DEX but requested SSO provider is dex",
                ));
            }
            Ok(Some(SSOProviderType::Dex))
        }
        Some(SSOProviderType::Keycloak) => {
            if sso.dex.is_some() {
                return Err(illegal(
                    "cannot supply dex configuration when requested SSO provider is keycloak",
                ));
            }
            Ok(Some(SSOProviderType::Keycloak))
        }
        None if provider.trim().is_empty() => {
            if sso.dex.is_some() || sso.keycloak.is_some() {
                return Err(illegal(
                    "Cannot specify SSO provider spec without specifying SSO provider type",
                ));
            }
            Ok(None)
        }
        None => Err(illegal(
            "Unsupported SSO provider type. Supported providers are dex and keycloak",
        )),
    }
}

/// Reconciles the SSO provider of one ArgoCD instance
pub struct SSOReconciler<'a> {
    ctx: &'a Context,
    instance: &'a ArgoCD,
}

impl<'a> SSOReconciler<'a> {
    pub fn new(ctx: &'a Context, instance: &'a ArgoCD) -> Self {
        Self { ctx, instance }
    }

    fn namespace(&self) -> String {
        self.instance.instance_namespace()
    }

    /// Deploy the requested provider and remove the other one
    #[instrument(skip(self), fields(instance = %self.instance.name_any()))]
    pub async fn reconcile(&self) -> Result<()> {
        match validate_sso_configuration(self.instance, &self.ctx.config)? {
            Some(SSOProviderType::Dex) => {
                self.reconcile_dex().await?;
                self.delete_keycloak_resources().await
            }
            Some(SSOProviderType::Keycloak) => {
                self.reconcile_keycloak().await?;
                self.delete_dex_resources().await
            }
            None => {
                debug!("No SSO provider configured");
                self.delete_dex_resources().await?;
                self.delete_keycloak_resources().await
            }
        }
    }

    /// Remove the objects of both providers
    pub async fn delete_resources(&self) -> Result<()> {
        self.delete_dex_resources().await?;
        self.delete_keycloak_resources().await
    }
}
