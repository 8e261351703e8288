// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::Result;
use crate::resource::{get_object, get_object_opt};
use crate::types::ArgoCD;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Client, Resource, ResourceExt};
use std::fmt;
use tracing::{debug, instrument};

/// Name and namespace identifying an object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacedName {
    pub name: String,
    pub namespace: String,
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

fn argocd_owner(owners: &[OwnerReference], namespace: &str) -> Option<NamespacedName> {
    owners
        .iter()
        .find(|o| o.kind == ArgoCD::kind(&()) && o.api_version == ArgoCD::api_version(&()))
        .map(|o| NamespacedName {
            name: o.name.clone(),
            namespace: namespace.to_string(),
        })
}

/// Find the ArgoCD instance owning a secret.
///
/// The owner is either referenced directly by the secret, or by a Service that
/// owns the secret (service serving certificates are owned by their Service).
#[instrument(skip(client))]
pub async fn find_secret_owner_instance(
    client: &Client,
    name: &str,
    namespace: &str,
) -> Result<Option<NamespacedName>> {
    let secret: Secret = get_object(client, name, namespace).await?;

    if let Some(owner) = argocd_owner(secret.owner_references(), namespace) {
        return Ok(Some(owner));
    }

    for service_ref in secret.owner_references().iter().filter(|o| o.kind == "Service") {
        let Some(service) = get_object_opt::<Service>(client, &service_ref.name, namespace).await? else {
            debug!("Owning service {}/{} no longer exists", namespace, service_ref.name);
            continue;
        };
        if let Some(owner) = argocd_owner(service.owner_references(), namespace) {
            return Ok(Some(owner));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockService;
    use kube::api::ObjectMeta;

    const SECRET_PATH: &str = "/api/v1/namespaces/argocd/secrets/argocd-operator-redis-tls";
    const SERVICE_PATH: &str = "/api/v1/namespaces/argocd/services/argocd-redis";

    fn owner(kind: &str, api_version: &str, name: &str) -> OwnerReference {
        OwnerReference {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: "uid".to_string(),
            ..Default::default()
        }
    }

    fn make_secret(owners: Vec<OwnerReference>) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("argocd-operator-redis-tls".to_string()),
                namespace: Some("argocd".to_string()),
                owner_references: Some(owners),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_owner_referenced_directly() {
        let secret = make_secret(vec![owner("ArgoCD", "argoproj.io/v1alpha1", "argocd")]);
        let client = MockService::new().with_object(SECRET_PATH, &secret).into_client();

        let owner = find_secret_owner_instance(&client, "argocd-operator-redis-tls", "argocd")
            .await
            .unwrap();
        assert_eq!(
            owner,
            Some(NamespacedName {
                name: "argocd".to_string(),
                namespace: "argocd".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_owner_through_service() {
        let secret = make_secret(vec![owner("Service", "v1", "argocd-redis")]);
        let service = Service {
            metadata: ObjectMeta {
                name: Some("argocd-redis".to_string()),
                namespace: Some("argocd".to_string()),
                owner_references: Some(vec![owner("ArgoCD", "argoproj.io/v1alpha1", "argocd")]),
                ..Default::default()
            },
            ..Default::default()
        };
        let client = MockService::new()
            .with_object(SECRET_PATH, &secret)
            .with_object(SERVICE_PATH, &service)
            .into_client();

        let owner = find_secret_owner_instance(&client, "argocd-operator-redis-tls", "argocd")
            .await
            .unwrap();
        assert_eq!(owner.unwrap().to_string(), "argocd/argocd");
    }

    #[tokio::test]
    async fn test_unowned_secret() {
        let secret = make_secret(vec![owner("Deployment", "apps/v1", "something")]);
        let client = MockService::new().with_object(SECRET_PATH, &secret).into_client();

        let owner = find_secret_owner_instance(&client, "argocd-operator-redis-tls", "argocd")
            .await
            .unwrap();
        assert!(owner.is_none());
    }

    #[tokio::test]
    async fn test_missing_secret_is_not_found() {
        let client = MockService::new().into_client();

        let err = find_secret_owner_instance(&client, "argocd-operator-redis-tls", "argocd")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
