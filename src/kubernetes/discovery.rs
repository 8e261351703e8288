// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Detection of optional APIs served by the cluster

use crate::constants::discovery::{PROMETHEUS_GROUP, ROUTE_GROUP, TEMPLATE_GROUP};
use crate::error::Result;
use kube::{discovery::Discovery, Client};
use tracing::info;

/// Optional APIs the operator integrates with when present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterCapabilities {
    /// OpenShift Routes (route.openshift.io/v1)
    pub route_api: bool,
    /// OpenShift Templates (template.openshift.io/v1)
    pub template_api: bool,
    /// Prometheus operator (monitoring.coreos.com/v1)
    pub prometheus_api: bool,
}

impl ClusterCapabilities {
    fn from_groups<'a>(groups: impl Iterator<Item = (&'a str, Vec<String>)>) -> Self {
        let mut caps = ClusterCapabilities::default();
        for (group, kinds) in groups {
            let has = |kind: &str| kinds.iter().any(|k| k == kind);
            match group {
                ROUTE_GROUP => caps.route_api = has("Route"),
                TEMPLATE_GROUP => caps.template_api = has("TemplateInstance"),
                PROMETHEUS_GROUP => caps.prometheus_api = has("ServiceMonitor"),
                _ => {}
            }
        }
        caps
    }
}

/// Probe the cluster once for the optional API groups
pub async fn discover_capabilities(client: &Client) -> Result<ClusterCapabilities> {
    let discovery = Discovery::new(client.clone())
        .filter(&[ROUTE_GROUP, TEMPLATE_GROUP, PROMETHEUS_GROUP])
        .run()
        .await?;

    let caps = ClusterCapabilities::from_groups(discovery.groups().map(|group| {
        let kinds = group
            .recommended_resources()
            .into_iter()
            .map(|(ar, _)| ar.kind)
            .collect();
        (group.name(), kinds)
    }));

    info!(
        "Detected APIs: route={}, template={}, prometheus={}",
        caps.route_api, caps.template_api, caps.prometheus_api
    );
    Ok(caps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_groups_detects_known_kinds() {
        let groups = vec![
            (ROUTE_GROUP, vec!["Route".to_string()]),
            (PROMETHEUS_GROUP, vec!["Prometheus".to_string(), "ServiceMonitor".to_string()]),
        ];

        let caps = ClusterCapabilities::from_groups(groups.into_iter());

        assert!(caps.route_api);
        assert!(caps.prometheus_api);
        assert!(!caps.template_api);
    }

    #[test]
    fn test_from_groups_requires_kind() {
        let groups = vec![(TEMPLATE_GROUP, vec!["Template".to_string()])];
        let caps = ClusterCapabilities::from_groups(groups.into_iter());
        assert!(!caps.template_api);
    }
}
