// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{AUTO_TLS_OPENSHIFT, ARGOCD_DELETION_FINALIZER};
use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ArgoCD is the desired state of a single Argo CD installation
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "ArgoCD", plural = "argocds")]
#[kube(namespaced)]
#[kube(status = "ArgoCDStatus")]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSpec {
    #[serde(default)]
    pub controller: ArgoCDApplicationControllerSpec,
    #[serde(default)]
    pub ha: ArgoCDHASpec,
    #[serde(default)]
    pub redis: ArgoCDRedisSpec,
    #[serde(default)]
    pub repo: ArgoCDRepoSpec,
    #[serde(default)]
    pub notifications: ArgoCDNotificationsSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso: Option<ArgoCDSSOSpec>,
    /// Argo CD container image shared by the Argo CD components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Argo CD image tag or digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<ArgoCDNodePlacementSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDApplicationControllerProcessorsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDApplicationControllerShardSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDApplicationControllerSpec {
    #[serde(default)]
    pub processors: ArgoCDApplicationControllerProcessorsSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Application resync period in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_sync: Option<u64>,
    #[serde(default)]
    pub sharding: ArgoCDApplicationControllerShardSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDHASpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_proxy_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_proxy_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDRedisSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Skip verification of the redis server certificate
    #[serde(default, rename = "disableTLSVerification")]
    pub disable_tls_verification: bool,
    /// Address of an externally managed redis; nothing is deployed when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Provider issuing the redis TLS certificate; only "openshift" is supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autotls: Option<String>,
}

impl ArgoCDRedisSpec {
    pub fn wants_auto_tls(&self) -> bool {
        self.autotls.as_deref() == Some(AUTO_TLS_OPENSHIFT)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDRepoSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, rename = "mountsatoken")]
    pub mount_sa_token: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, rename = "serviceaccount", skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    /// Require clients to verify the repo server certificate
    #[serde(default, rename = "verifytls")]
    pub verify_tls: bool,
    /// Provider issuing the repo server TLS certificate; only "openshift" is supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autotls: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

impl ArgoCDRepoSpec {
    pub fn wants_auto_tls(&self) -> bool {
        self.autotls.as_deref() == Some(AUTO_TLS_OPENSHIFT)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDNotificationsSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

/// Supported SSO providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SSOProviderType {
    Dex,
    Keycloak,
}

impl SSOProviderType {
    /// Parse a provider name, ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "dex" => Some(Self::Dex),
            "keycloak" => Some(Self::Keycloak),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSSOSpec {
    /// Either "dex" or "keycloak"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex: Option<ArgoCDDexSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keycloak: Option<ArgoCDKeycloakSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDDexSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, rename = "openShiftOAuth")]
    pub open_shift_oauth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

impl ArgoCDDexSpec {
    /// A dex spec is usable when it carries a connector config or uses OpenShift OAuth
    pub fn is_usable(&self) -> bool {
        self.open_shift_oauth || self.config.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDKeycloakSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDNodePlacementSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
}

/// Unset fields serialize as `null` so a status merge patch clears them
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub application_controller: Option<String>,
    #[serde(default)]
    pub redis: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub notifications_controller: Option<String>,
    /// Result of the last SSO configuration check
    #[serde(default)]
    pub sso: Option<String>,
    #[serde(default, rename = "repoTLSChecksum")]
    pub repo_tls_checksum: Option<String>,
    #[serde(default, rename = "redisTLSChecksum")]
    pub redis_tls_checksum: Option<String>,
}

impl ArgoCD {
    /// Check if the deletion finalizer is set on this instance
    pub fn is_deletion_finalizer_present(&self) -> bool {
        self.finalizers()
            .iter()
            .any(|f| f == ARGOCD_DELETION_FINALIZER)
    }

    /// Requested SSO provider, `None` when unset or unsupported
    pub fn sso_provider(&self) -> Option<SSOProviderType> {
        self.spec
            .sso
            .as_ref()
            .and_then(|sso| sso.provider.as_deref())
            .and_then(SSOProviderType::parse)
    }

    /// Namespace of this instance, empty for malformed objects
    pub fn instance_namespace(&self) -> String {
        self.namespace().unwrap_or_default()
    }

    /// Node selector applied to every managed pod
    pub fn node_selector(&self) -> BTreeMap<String, String> {
        let mut selector = BTreeMap::from([("kubernetes.io/os".to_string(), "linux".to_string())]);
        if let Some(custom) = self
            .spec
            .node_placement
            .as_ref()
            .and_then(|p| p.node_selector.as_ref())
        {
            selector.extend(custom.clone());
        }
        selector
    }
}
