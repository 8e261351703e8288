// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{env as keys, identifiers, DEFAULT_REDIS_CONFIG_PATH};
use crate::error::{ArgoCDOperatorError, Result};
use std::env;

/// Container image overrides taken from the operator environment
#[derive(Debug, Clone, Default)]
pub struct ImageOverrides {
    pub argocd: Option<String>,
    pub redis: Option<String>,
    pub redis_ha_proxy: Option<String>,
    pub repo_server: Option<String>,
    pub dex: Option<String>,
    pub keycloak: Option<String>,
    pub notifications: Option<String>,
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Dex is never deployed when set
    pub disable_dex: bool,
    /// ClusterRole bound to the application controller instead of the generated Role
    pub controller_cluster_role: Option<String>,
    /// ClusterRole bound to the server instead of the generated Role
    pub server_cluster_role: Option<String>,
    /// Namespaces whose instances get cluster scoped RBAC
    pub cluster_config_namespaces: Vec<String>,
    /// Directory holding the redis configuration templates
    pub redis_config_path: String,
    /// Restricts the watch to a single namespace when set
    pub watch_namespace: Option<String>,
    pub images: ImageOverrides,
    /// Proxy settings forwarded to every managed container
    pub proxy_env: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            disable_dex: false,
            controller_cluster_role: None,
            server_cluster_role: None,
            cluster_config_namespaces: Vec::new(),
            redis_config_path: DEFAULT_REDIS_CONFIG_PATH.to_string(),
            watch_namespace: None,
            images: ImageOverrides::default(),
            proxy_env: Vec::new(),
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "1" => Ok(true),
        "false" | "f" | "0" => Ok(false),
        _ => Err(ArgoCDOperatorError::InvalidConfig {
            key,
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let disable_dex = match non_empty(keys::DISABLE_DEX) {
            Some(value) => parse_bool(keys::DISABLE_DEX, &value)?,
            None => false,
        };

        let cluster_config_namespaces = non_empty(keys::CLUSTER_CONFIG_NAMESPACES)
            .map(|v| {
                v.split(',')
                    .map(|ns| ns.trim().to_string())
                    .filter(|ns| !ns.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let proxy_env = keys::PROXY_VARS
            .iter()
            .filter_map(|key| {
                lookup(key)
                    .or_else(|| lookup(&key.to_lowercase()))
                    .map(|v| (key.to_string(), v))
            })
            .collect();

        Ok(Config {
            disable_dex,
            controller_cluster_role: non_empty(keys::CONTROLLER_CLUSTER_ROLE),
            server_cluster_role: non_empty(keys::SERVER_CLUSTER_ROLE),
            cluster_config_namespaces,
            redis_config_path: non_empty(keys::REDIS_CONFIG_PATH)
                .unwrap_or_else(|| DEFAULT_REDIS_CONFIG_PATH.to_string()),
            watch_namespace: non_empty(keys::WATCH_NAMESPACE),
            images: ImageOverrides {
                argocd: non_empty(keys::ARGOCD_IMAGE),
                redis: non_empty(keys::REDIS_IMAGE),
                redis_ha_proxy: non_empty(keys::REDIS_HA_PROXY_IMAGE),
                repo_server: non_empty(keys::REPOSERVER_IMAGE),
                dex: non_empty(keys::DEX_IMAGE),
                keycloak: non_empty(keys::KEYCLOAK_IMAGE),
                notifications: non_empty(keys::NOTIFICATIONS_IMAGE),
            },
            proxy_env,
        })
    }

    /// Custom ClusterRole configured for a workload identifier, if any
    pub fn custom_cluster_role(&self, identifier: &str) -> Option<&str> {
        match identifier {
            identifiers::APPLICATION_CONTROLLER => self.controller_cluster_role.as_deref(),
            identifiers::SERVER => self.server_cluster_role.as_deref(),
            _ => None,
        }
    }

    /// Whether instances in the namespace get cluster scoped permissions
    pub fn is_cluster_config_namespace(&self, namespace: &str) -> bool {
        self.cluster_config_namespaces
            .iter()
            .any(|ns| ns == "*" || ns == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert!(!config.disable_dex);
        assert_eq!(config.redis_config_path, DEFAULT_REDIS_CONFIG_PATH);
        assert!(config.cluster_config_namespaces.is_empty());
        assert!(config.proxy_env.is_empty());
    }

    #[test]
    fn test_disable_dex_is_case_insensitive() {
        assert!(config_from(&[("DISABLE_DEX", "TRUE")]).disable_dex);
        assert!(!config_from(&[("DISABLE_DEX", "False")]).disable_dex);
        assert!(config_from(&[("DISABLE_DEX", "1")]).disable_dex);
    }

    #[test]
    fn test_invalid_disable_dex_is_rejected() {
        let result = Config::from_lookup(|key| (key == "DISABLE_DEX").then(|| "maybe".to_string()));

        match result {
            Err(ArgoCDOperatorError::InvalidConfig { key, value }) => {
                assert_eq!(key, "DISABLE_DEX");
                assert_eq!(value, "maybe");
            }
            other => panic!("expected invalid config, got {:?}", other.map(|c| c.disable_dex)),
        }
    }

    #[test]
    fn test_custom_cluster_roles() {
        let config = config_from(&[
            ("ARGOCD_CONTROLLER_CLUSTER_ROLE", "custom-controller-role"),
            ("ARGOCD_SERVER_CLUSTER_ROLE", "custom-server-role"),
        ]);

        assert_eq!(
            config.custom_cluster_role(identifiers::APPLICATION_CONTROLLER),
            Some("custom-controller-role")
        );
        assert_eq!(
            config.custom_cluster_role(identifiers::SERVER),
            Some("custom-server-role")
        );
        assert_eq!(config.custom_cluster_role(identifiers::DEX_SERVER), None);
    }

    #[test]
    fn test_cluster_config_namespaces() {
        let config = config_from(&[("ARGOCD_CLUSTER_CONFIG_NAMESPACES", "argocd, openshift-gitops")]);
        assert!(config.is_cluster_config_namespace("openshift-gitops"));
        assert!(!config.is_cluster_config_namespace("other"));

        let wildcard = config_from(&[("ARGOCD_CLUSTER_CONFIG_NAMESPACES", "*")]);
        assert!(wildcard.is_cluster_config_namespace("anything"));
    }

    #[test]
    fn test_proxy_env_accepts_lowercase() {
        let config = config_from(&[("https_proxy", "http://proxy:3128")]);
        assert_eq!(
            config.proxy_env,
            vec![("HTTPS_PROXY".to_string(), "http://proxy:3128".to_string())]
        );
    }
}
