// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Generic typed CRUD against the cluster.

use crate::error::{ArgoCDOperatorError, Result};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{
    api::{DeleteParams, ListParams, PostParams},
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, instrument};

/// Namespaced objects the operator manages
pub trait NamespacedObject:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> NamespacedObject for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Cluster scoped objects the operator manages
pub trait ClusterObject:
    Resource<Scope = ClusterResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ClusterObject for K where
    K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

fn not_found<K: Resource<DynamicType = ()>>(name: &str, namespace: &str) -> ArgoCDOperatorError {
    ArgoCDOperatorError::NotFound {
        kind: K::kind(&()).to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Get an object, failing with `NotFound` when it does not exist
pub async fn get_object<K: NamespacedObject>(client: &Client, name: &str, namespace: &str) -> Result<K> {
    get_object_opt(client, name, namespace)
        .await?
        .ok_or_else(|| not_found::<K>(name, namespace))
}

/// Get an object if it exists
pub async fn get_object_opt<K: NamespacedObject>(
    client: &Client,
    name: &str,
    namespace: &str,
) -> Result<Option<K>> {
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    Ok(api.get_opt(name).await?)
}

/// List objects in a namespace
pub async fn list_objects<K: NamespacedObject>(
    client: &Client,
    namespace: &str,
    params: &ListParams,
) -> Result<Vec<K>> {
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    Ok(api.list(params).await?.items)
}

/// Create an object in the namespace set on its metadata
#[instrument(skip(client, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
pub async fn create_object<K: NamespacedObject>(client: &Client, obj: &K) -> Result<K> {
    let namespace = obj
        .namespace()
        .ok_or(ArgoCDOperatorError::MissingObjectKey(".metadata.namespace"))?;
    let api: Api<K> = Api::namespaced(client.clone(), &namespace);
    debug!("Creating {} {}/{}", K::kind(&()), namespace, obj.name_any());
    Ok(api.create(&PostParams::default(), obj).await?)
}

/// Replace an existing object with the given state
#[instrument(skip(client, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
pub async fn update_object<K: NamespacedObject>(client: &Client, obj: &K) -> Result<K> {
    let namespace = obj
        .namespace()
        .ok_or(ArgoCDOperatorError::MissingObjectKey(".metadata.namespace"))?;
    let api: Api<K> = Api::namespaced(client.clone(), &namespace);
    debug!("Updating {} {}/{}", K::kind(&()), namespace, obj.name_any());
    Ok(api.replace(&obj.name_any(), &PostParams::default(), obj).await?)
}

/// Delete an object; a missing object is reported as `NotFound`
#[instrument(skip(client), fields(kind = %K::kind(&())))]
pub async fn delete_object<K: NamespacedObject>(client: &Client, name: &str, namespace: &str) -> Result<()> {
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(err)) if err.code == 404 => Err(not_found::<K>(name, namespace)),
        Err(e) => Err(e.into()),
    }
}

/// Get a cluster scoped object if it exists
pub async fn get_cluster_object_opt<K: ClusterObject>(client: &Client, name: &str) -> Result<Option<K>> {
    let api: Api<K> = Api::all(client.clone());
    Ok(api.get_opt(name).await?)
}

/// List cluster scoped objects
pub async fn list_cluster_objects<K: ClusterObject>(client: &Client, params: &ListParams) -> Result<Vec<K>> {
    let api: Api<K> = Api::all(client.clone());
    Ok(api.list(params).await?.items)
}

/// Create a cluster scoped object
#[instrument(skip(client, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
pub async fn create_cluster_object<K: ClusterObject>(client: &Client, obj: &K) -> Result<K> {
    let api: Api<K> = Api::all(client.clone());
    Ok(api.create(&PostParams::default(), obj).await?)
}

/// Replace a cluster scoped object
#[instrument(skip(client, obj), fields(kind = %K::kind(&()), name = %obj.name_any()))]
pub async fn update_cluster_object<K: ClusterObject>(client: &Client, obj: &K) -> Result<K> {
    let api: Api<K> = Api::all(client.clone());
    Ok(api.replace(&obj.name_any(), &PostParams::default(), obj).await?)
}

/// Delete a cluster scoped object; a missing object is reported as `NotFound`
#[instrument(skip(client), fields(kind = %K::kind(&())))]
pub async fn delete_cluster_object<K: ClusterObject>(client: &Client, name: &str) -> Result<()> {
    let api: Api<K> = Api::all(client.clone());
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(err)) if err.code == 404 => Err(not_found::<K>(name, "")),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{not_found_json, MockService};
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
    use kube::api::ObjectMeta;

    const SECRET_PATH: &str = "/api/v1/namespaces/argocd/secrets/my-secret";

    fn make_secret() -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("my-secret".to_string()),
                namespace: Some("argocd".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_object_returns_existing() {
        let body = serde_json::to_string(&make_secret()).unwrap();
        let client = MockService::new().on_get(SECRET_PATH, 200, &body).into_client();

        let secret: Secret = get_object(&client, "my-secret", "argocd").await.unwrap();
        assert_eq!(secret.name_any(), "my-secret");
    }

    #[tokio::test]
    async fn test_get_object_missing_is_not_found() {
        let client = MockService::new()
            .on_get(SECRET_PATH, 404, &not_found_json("secrets", "my-secret"))
            .into_client();

        let err = get_object::<Secret>(&client, "my-secret", "argocd")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_object_posts_to_namespace() {
        let mock = MockService::new();
        let client = mock.clone().into_client();

        create_object(&client, &make_secret()).await.unwrap();

        let requests = mock.requests_matching("POST", "/api/v1/namespaces/argocd/secrets");
        assert_eq!(requests.len(), 1);
        assert!(requests[0].body.contains("my-secret"));
    }

    #[tokio::test]
    async fn test_create_object_requires_namespace() {
        let client = MockService::new().into_client();
        let mut secret = make_secret();
        secret.metadata.namespace = None;

        let err = create_object(&client, &secret).await.unwrap_err();
        assert!(matches!(err, ArgoCDOperatorError::MissingObjectKey(_)));
    }

    #[tokio::test]
    async fn test_update_object_replaces_by_name() {
        let mock = MockService::new();
        let client = mock.clone().into_client();

        update_object(&client, &make_secret()).await.unwrap();

        assert_eq!(mock.requests_matching("PUT", SECRET_PATH).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_object_missing_is_not_found() {
        let client = MockService::new()
            .on_delete(SECRET_PATH, 404, &not_found_json("secrets", "my-secret"))
            .into_client();

        let err = delete_object::<Secret>(&client, "my-secret", "argocd")
            .await
            .unwrap_err();
        assert!(matches!(err, ArgoCDOperatorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_cluster_object() {
        let mock = MockService::new();
        let client = mock.clone().into_client();

        delete_cluster_object::<ClusterRoleBinding>(&client, "argocd-argocd-x")
            .await
            .unwrap();

        assert_eq!(
            mock.requests_matching(
                "DELETE",
                "/apis/rbac.authorization.k8s.io/v1/clusterrolebindings/argocd-argocd-x"
            )
            .len(),
            1
        );
    }
}
