// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace lookup utilities

use crate::constants::labels;
use crate::error::{ArgoCDOperatorError, Result};
use crate::resource::{get_cluster_object_opt, list_cluster_objects};
use k8s_openapi::api::core::v1::Namespace;
use kube::{api::ListParams, Client, ResourceExt};
use tracing::{debug, instrument};

/// Get a namespace, failing with `NotFound` when it does not exist
#[instrument(skip(client))]
pub async fn get_namespace(client: &Client, name: &str) -> Result<Namespace> {
    get_cluster_object_opt::<Namespace>(client, name)
        .await?
        .ok_or_else(|| ArgoCDOperatorError::NotFound {
            kind: "Namespace".to_string(),
            namespace: String::new(),
            name: name.to_string(),
        })
}

/// Whether the namespace is being deleted
pub async fn is_namespace_terminating(client: &Client, name: &str) -> Result<bool> {
    let namespace = get_namespace(client, name).await?;
    let terminating = namespace.metadata.deletion_timestamp.is_some();
    if terminating {
        debug!("Namespace {} is terminating", name);
    }
    Ok(terminating)
}

/// Names of the namespaces managed by the instance living in `instance_namespace`,
/// excluding the instance namespace itself
#[instrument(skip(client))]
pub async fn list_managed_namespaces(client: &Client, instance_namespace: &str) -> Result<Vec<String>> {
    let params =
        ListParams::default().labels(&format!("{}={}", labels::NAMESPACE_MANAGED_BY, instance_namespace));
    let namespaces = list_cluster_objects::<Namespace>(client, &params).await?;

    Ok(namespaces
        .iter()
        .map(|ns| ns.name_any())
        .filter(|name| name != instance_namespace)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{namespace_json, namespace_list_json, terminating_namespace_json, MockService};

    #[tokio::test]
    async fn test_namespace_not_terminating() {
        let client = MockService::new()
            .on_get("/api/v1/namespaces/argocd", 200, &namespace_json("argocd"))
            .into_client();

        assert!(!is_namespace_terminating(&client, "argocd").await.unwrap());
    }

    #[tokio::test]
    async fn test_namespace_terminating() {
        let client = MockService::new()
            .on_get("/api/v1/namespaces/argocd", 200, &terminating_namespace_json("argocd"))
            .into_client();

        assert!(is_namespace_terminating(&client, "argocd").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_namespace_is_not_found() {
        let client = MockService::new().into_client();

        let err = get_namespace(&client, "argocd").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_managed_namespaces_excludes_instance_namespace() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces",
                200,
                &namespace_list_json(&["argocd", "team-a", "team-b"]),
            )
            .into_client();

        let managed = list_managed_namespaces(&client, "argocd").await.unwrap();
        assert_eq!(managed, vec!["team-a".to_string(), "team-b".to_string()]);
    }
}
