// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Roles, bindings and service accounts for the Argo CD workloads.

use crate::constants::identifiers;
use crate::error::Result;
use crate::kubernetes::{is_namespace_terminating, list_managed_namespaces};
use crate::reconcilers::common::{
    delete_if_exists, reconcile_object, set_controller_reference, sync_field, sync_metadata, sync_metadata_only,
    Context,
};
use crate::resource::{
    create_cluster_object, create_object, delete_cluster_object, get_cluster_object_opt, get_object_opt,
    update_cluster_object, update_object, ClusterObject,
};
use crate::types::ArgoCD;
use crate::util::{cluster_object_meta, generate_unique_resource_name, name_with_suffix, object_meta};
use crate::workloads::Request;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject};
use kube::ResourceExt;
use tracing::{debug, info, instrument};

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(api_groups.iter().map(|s| s.to_string()).collect()),
        resources: Some(resources.iter().map(|s| s.to_string()).collect()),
        verbs: verbs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

fn named_rule(api_groups: &[&str], resources: &[&str], names: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        resource_names: Some(names.iter().map(|s| s.to_string()).collect()),
        ..rule(api_groups, resources, verbs)
    }
}

pub fn policy_rule_for_application_controller() -> Vec<PolicyRule> {
    vec![rule(&["*"], &["*"], &["*"])]
}

pub fn policy_rule_for_server() -> Vec<PolicyRule> {
    vec![
        rule(&["*"], &["*"], &["get", "patch", "delete"]),
        rule(
            &["argoproj.io"],
            &["applications", "appprojects"],
            &["create", "get", "list", "watch", "update", "delete", "patch"],
        ),
        rule(&[""], &["events"], &["create", "list"]),
    ]
}

pub fn policy_rule_for_dex_server() -> Vec<PolicyRule> {
    vec![rule(&[""], &["secrets", "configmaps"], &["get", "list", "watch"])]
}

pub fn policy_rule_for_redis_ha() -> Vec<PolicyRule> {
    vec![rule(&[""], &["endpoints"], &["get"])]
}

pub fn policy_rule_for_repo_server() -> Vec<PolicyRule> {
    vec![rule(&[""], &["secrets", "configmaps"], &["get", "list", "watch"])]
}

pub fn policy_rule_for_notifications_controller(secret_name: &str) -> Vec<PolicyRule> {
    vec![
        rule(
            &["argoproj.io"],
            &["applications", "appprojects"],
            &["get", "list", "watch", "update", "patch"],
        ),
        rule(&[""], &["configmaps", "secrets"], &["list", "watch"]),
        named_rule(&[""], &["configmaps"], &["argocd-notifications-cm"], &["get"]),
        named_rule(&[""], &["secrets"], &[secret_name], &["get"]),
    ]
}

/// Cluster wide permissions for the application controller
pub fn policy_rule_for_cluster_application_controller() -> Vec<PolicyRule> {
    vec![
        rule(&["*"], &["*"], &["*"]),
        PolicyRule {
            non_resource_urls: Some(vec!["*".to_string()]),
            verbs: vec!["*".to_string()],
            ..Default::default()
        },
    ]
}

/// Cluster wide permissions for the server
pub fn policy_rule_for_cluster_server() -> Vec<PolicyRule> {
    vec![
        rule(&["*"], &["*"], &["get", "delete", "patch"]),
        rule(&["argoproj.io"], &["applications"], &["create", "get", "list", "watch", "update", "delete", "patch"]),
        rule(&[""], &["events"], &["list"]),
    ]
}

/// Dex, redis-ha and the repo server only need access to the instance namespace
fn is_instance_namespace_only(identifier: &str) -> bool {
    [identifiers::DEX_SERVER, identifiers::REDIS_HA, identifiers::REPO_SERVER].contains(&identifier)
}

async fn target_namespaces(ctx: &Context, instance: &ArgoCD, identifier: &str) -> Result<Vec<String>> {
    let instance_namespace = instance.instance_namespace();
    let mut namespaces = vec![instance_namespace.clone()];
    if !is_instance_namespace_only(identifier) {
        namespaces.extend(list_managed_namespaces(&ctx.client, &instance_namespace).await?);
    }
    Ok(namespaces)
}

fn is_disabled_dex(ctx: &Context, identifier: &str) -> bool {
    identifier == identifiers::DEX_SERVER && ctx.config.disable_dex
}

/// Reconcile the service account a workload runs as
#[instrument(skip(ctx, instance))]
pub async fn reconcile_service_account(
    ctx: &Context,
    instance: &ArgoCD,
    name: &str,
    component: &str,
) -> Result<ServiceAccount> {
    let desired = Request::new(
        ServiceAccount {
            metadata: object_meta(name, &instance.instance_namespace(), instance, component),
            ..Default::default()
        },
        instance,
    )
    .request()?;

    reconcile_object(ctx, instance, desired.clone(), sync_metadata_only).await?;
    Ok(desired)
}

/// Reconcile the Role `<instance>-<identifier>` in the instance namespace and,
/// for most workloads, in every namespace the instance manages.
#[instrument(skip(ctx, instance, rules))]
pub async fn reconcile_role(
    ctx: &Context,
    instance: &ArgoCD,
    identifier: &str,
    rules: Vec<PolicyRule>,
) -> Result<Vec<Role>> {
    let name = name_with_suffix(instance, identifier);
    let namespaces = target_namespaces(ctx, instance, identifier).await?;

    if is_disabled_dex(ctx, identifier) || ctx.config.custom_cluster_role(identifier).is_some() {
        for namespace in &namespaces {
            delete_if_exists::<Role>(&ctx.client, &name, namespace).await?;
        }
        return Ok(Vec::new());
    }

    let mut roles = Vec::with_capacity(namespaces.len());
    for namespace in namespaces {
        let desired = Request::new(
            Role {
                metadata: object_meta(&name, &namespace, instance, identifier),
                rules: Some(rules.clone()),
            },
            instance,
        )
        .request()?;

        reconcile_object(ctx, instance, desired.clone(), |existing: &mut Role, desired: &Role| {
            let metadata = sync_metadata(&mut existing.metadata, &desired.metadata);
            let rules = sync_field(&mut existing.rules, &desired.rules);
            metadata || rules
        })
        .await?;
        roles.push(desired);
    }
    Ok(roles)
}

fn role_binding_ref(ctx: &Context, identifier: &str, role_name: &str) -> RoleRef {
    match ctx.config.custom_cluster_role(identifier) {
        Some(cluster_role) => RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: cluster_role.to_string(),
        },
        None => RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name: role_name.to_string(),
        },
    }
}

fn service_account_subject(name: &str, namespace: &str) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

/// Reconcile the RoleBinding `<instance>-<identifier>` binding the workload's
/// service account. A changed role reference forces the binding to be recreated.
#[instrument(skip(ctx, instance))]
pub async fn reconcile_role_binding(ctx: &Context, instance: &ArgoCD, identifier: &str) -> Result<()> {
    let name = name_with_suffix(instance, identifier);
    let instance_namespace = instance.instance_namespace();

    if is_disabled_dex(ctx, identifier) {
        delete_if_exists::<RoleBinding>(&ctx.client, &name, &instance_namespace).await?;
        return Ok(());
    }

    for namespace in target_namespaces(ctx, instance, identifier).await? {
        let mut desired = Request::new(
            RoleBinding {
                metadata: object_meta(&name, &namespace, instance, identifier),
                role_ref: role_binding_ref(ctx, identifier, &name),
                subjects: Some(vec![service_account_subject(&name, &instance_namespace)]),
            },
            instance,
        )
        .request()?;

        if is_namespace_terminating(&ctx.client, &namespace).await? {
            delete_if_exists::<RoleBinding>(&ctx.client, &name, &namespace).await?;
            continue;
        }

        match get_object_opt::<RoleBinding>(&ctx.client, &name, &namespace).await? {
            Some(existing) if existing.role_ref != desired.role_ref => {
                info!("Role reference of {}/{} changed, recreating binding", namespace, name);
                delete_if_exists::<RoleBinding>(&ctx.client, &name, &namespace).await?;
                set_controller_reference(instance, &mut desired);
                create_object(&ctx.client, &desired).await?;
            }
            Some(mut existing) => {
                let metadata = sync_metadata(&mut existing.metadata, &desired.metadata);
                let subjects = sync_field(&mut existing.subjects, &desired.subjects);
                if metadata || subjects {
                    update_object(&ctx.client, &existing).await?;
                    info!("RoleBinding {}/{} updated", namespace, name);
                }
            }
            None => {
                set_controller_reference(instance, &mut desired);
                create_object(&ctx.client, &desired).await?;
                info!("RoleBinding {}/{} created", namespace, name);
            }
        }
    }
    Ok(())
}

async fn delete_cluster_if_exists<K: ClusterObject>(ctx: &Context, name: &str) -> Result<()> {
    match delete_cluster_object::<K>(&ctx.client, name).await {
        Ok(()) => {
            info!("{} {} deleted", K::kind(&()), name);
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Reconcile the ClusterRole `<instance>-<namespace>-<identifier>`.
///
/// Only instances in a cluster configuration namespace get one; elsewhere any
/// existing ClusterRole is removed and `None` is returned.
#[instrument(skip(ctx, instance, rules))]
pub async fn reconcile_cluster_role(
    ctx: &Context,
    instance: &ArgoCD,
    identifier: &str,
    rules: Vec<PolicyRule>,
) -> Result<Option<ClusterRole>> {
    let name = generate_unique_resource_name(instance, identifier);

    if !ctx.config.is_cluster_config_namespace(&instance.instance_namespace()) {
        delete_cluster_if_exists::<ClusterRole>(ctx, &name).await?;
        return Ok(None);
    }

    let desired = Request::new(
        ClusterRole {
            metadata: cluster_object_meta(&name, instance, identifier),
            rules: Some(rules),
            ..Default::default()
        },
        instance,
    )
    .request()?;

    match get_cluster_object_opt::<ClusterRole>(&ctx.client, &name).await? {
        Some(mut existing) => {
            let metadata = sync_metadata(&mut existing.metadata, &desired.metadata);
            let rules = sync_field(&mut existing.rules, &desired.rules);
            if metadata || rules {
                update_cluster_object(&ctx.client, &existing).await?;
                info!("ClusterRole {} updated", name);
            }
        }
        None => {
            create_cluster_object(&ctx.client, &desired).await?;
            info!("ClusterRole {} created", name);
        }
    }
    Ok(Some(desired))
}

/// Reconcile the ClusterRoleBinding `<instance>-<namespace>-<identifier>`.
/// Without a cluster role any existing binding is removed.
#[instrument(skip(ctx, instance, cluster_role, service_account))]
pub async fn reconcile_cluster_role_binding(
    ctx: &Context,
    instance: &ArgoCD,
    identifier: &str,
    cluster_role: Option<&ClusterRole>,
    service_account: &ServiceAccount,
) -> Result<()> {
    let name = generate_unique_resource_name(instance, identifier);

    let Some(cluster_role) = cluster_role else {
        return delete_cluster_if_exists::<ClusterRoleBinding>(ctx, &name).await;
    };

    let desired = Request::new(
        ClusterRoleBinding {
            metadata: cluster_object_meta(&name, instance, identifier),
            role_ref: RoleRef {
                api_group: RBAC_API_GROUP.to_string(),
                kind: "ClusterRole".to_string(),
                name: cluster_role.name_any(),
            },
            subjects: Some(vec![service_account_subject(
                &service_account.name_any(),
                &service_account
                    .namespace()
                    .unwrap_or_else(|| instance.instance_namespace()),
            )]),
        },
        instance,
    )
    .request()?;

    match get_cluster_object_opt::<ClusterRoleBinding>(&ctx.client, &name).await? {
        Some(existing) if existing.role_ref != desired.role_ref => {
            info!("Role reference of {} changed, recreating binding", name);
            delete_cluster_if_exists::<ClusterRoleBinding>(ctx, &name).await?;
            create_cluster_object(&ctx.client, &desired).await?;
        }
        Some(mut existing) => {
            let metadata = sync_metadata(&mut existing.metadata, &desired.metadata);
            let subjects = sync_field(&mut existing.subjects, &desired.subjects);
            if metadata || subjects {
                update_cluster_object(&ctx.client, &existing).await?;
                info!("ClusterRoleBinding {} updated", name);
            }
        }
        None => {
            create_cluster_object(&ctx.client, &desired).await?;
            info!("ClusterRoleBinding {} created", name);
        }
    }
    Ok(())
}

/// Remove the cluster scoped RBAC of a workload; these objects carry no owner reference
pub async fn delete_cluster_rbac(ctx: &Context, instance: &ArgoCD, identifier: &str) -> Result<()> {
    let name = generate_unique_resource_name(instance, identifier);
    debug!("Removing cluster RBAC {}", name);
    delete_cluster_if_exists::<ClusterRoleBinding>(ctx, &name).await?;
    delete_cluster_if_exists::<ClusterRole>(ctx, &name).await
}

/// Remove the Role and RoleBinding of a workload from the instance namespace
pub async fn delete_namespaced_rbac(ctx: &Context, instance: &ArgoCD, identifier: &str) -> Result<()> {
    let name = name_with_suffix(instance, identifier);
    let namespace = instance.instance_namespace();
    delete_if_exists::<RoleBinding>(&ctx.client, &name, &namespace).await?;
    delete_if_exists::<Role>(&ctx.client, &name, &namespace).await?;
    Ok(())
}

/// Remove the Roles and RoleBindings an instance placed in the namespaces it
/// manages. Owner references cannot reach across namespaces, so these are
/// not garbage collected with the instance.
pub async fn delete_managed_namespace_rbac(ctx: &Context, instance: &ArgoCD) -> Result<()> {
    for identifier in [
        identifiers::APPLICATION_CONTROLLER,
        identifiers::SERVER,
        identifiers::NOTIFICATIONS_CONTROLLER,
    ] {
        delete_managed_namespace_rbac_for(ctx, instance, identifier).await?;
    }
    Ok(())
}

/// Remove the Role and RoleBinding of one workload from every namespace the instance manages
pub async fn delete_managed_namespace_rbac_for(ctx: &Context, instance: &ArgoCD, identifier: &str) -> Result<()> {
    let name = name_with_suffix(instance, identifier);
    for namespace in list_managed_namespaces(&ctx.client, &instance.instance_namespace()).await? {
        delete_if_exists::<RoleBinding>(&ctx.client, &name, &namespace).await?;
        delete_if_exists::<Role>(&ctx.client, &name, &namespace).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::kubernetes::ClusterCapabilities;
    use crate::test_utils::{make_argocd, namespace_json, namespace_list_json, test_context, test_context_with, MockService};
    use kube::api::ObjectMeta;

    const RB_BASE: &str = "/apis/rbac.authorization.k8s.io/v1";

    fn rb_path(namespace: &str, name: &str) -> String {
        format!("{}/namespaces/{}/rolebindings/{}", RB_BASE, namespace, name)
    }

    fn rb_collection(namespace: &str) -> String {
        format!("{}/namespaces/{}/rolebindings", RB_BASE, namespace)
    }

    fn cluster_mock() -> MockService {
        MockService::new()
            .on_get("/api/v1/namespaces", 200, &namespace_list_json(&["argocd", "team-a"]))
            .on_get("/api/v1/namespaces/argocd", 200, &namespace_json("argocd"))
            .on_get("/api/v1/namespaces/team-a", 200, &namespace_json("team-a"))
    }

    fn existing_binding(namespace: &str, role_name: &str, subject: &str) -> RoleBinding {
        RoleBinding {
            metadata: ObjectMeta {
                name: Some("argocd-xrb".to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: RBAC_API_GROUP.to_string(),
                kind: "Role".to_string(),
                name: role_name.to_string(),
            },
            subjects: Some(vec![service_account_subject(subject, "argocd")]),
        }
    }

    #[tokio::test]
    async fn test_role_binding_created_in_managed_namespaces() {
        let mock = cluster_mock();
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");

        reconcile_role_binding(&ctx, &argocd, "xrb").await.unwrap();

        for namespace in ["argocd", "team-a"] {
            let posts = mock.requests_matching("POST", &rb_collection(namespace));
            assert_eq!(posts.len(), 1, "no binding created in {}", namespace);
            let body = posts[0].json();
            assert_eq!(body["metadata"]["name"], "argocd-xrb");
            assert_eq!(body["roleRef"]["kind"], "Role");
            assert_eq!(body["subjects"][0]["name"], "argocd-xrb");
            assert_eq!(body["subjects"][0]["namespace"], "argocd");
        }
    }

    #[tokio::test]
    async fn test_role_binding_role_ref_drift_recreates() {
        let mock = cluster_mock()
            .with_object(&rb_path("argocd", "argocd-xrb"), &existing_binding("argocd", "not-xrb", "argocd-xrb"))
            .with_object(&rb_path("team-a", "argocd-xrb"), &existing_binding("team-a", "argocd-xrb", "argocd-xrb"));
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");

        reconcile_role_binding(&ctx, &argocd, "xrb").await.unwrap();

        assert_eq!(mock.requests_matching("DELETE", &rb_path("argocd", "argocd-xrb")).len(), 1);
        let posts = mock.requests_matching("POST", &rb_collection("argocd"));
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].json()["roleRef"]["name"], "argocd-xrb");
    }

    #[tokio::test]
    async fn test_role_binding_subject_drift_updates() {
        let mock = cluster_mock()
            .with_object(&rb_path("argocd", "argocd-xrb"), &existing_binding("argocd", "argocd-xrb", "not-xrb"))
            .with_object(&rb_path("team-a", "argocd-xrb"), &existing_binding("team-a", "argocd-xrb", "argocd-xrb"));
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");

        reconcile_role_binding(&ctx, &argocd, "xrb").await.unwrap();

        let puts = mock.requests_matching("PUT", &rb_path("argocd", "argocd-xrb"));
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].json()["subjects"][0]["name"], "argocd-xrb");
        assert!(mock.requests_matching("DELETE", &rb_path("argocd", "argocd-xrb")).is_empty());
    }

    #[tokio::test]
    async fn test_instance_namespace_only_bindings_skip_managed_namespaces() {
        let mock = cluster_mock();
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");

        reconcile_role_binding(&ctx, &argocd, identifiers::DEX_SERVER).await.unwrap();
        reconcile_role_binding(&ctx, &argocd, identifiers::REDIS_HA).await.unwrap();
        reconcile_role_binding(&ctx, &argocd, identifiers::REPO_SERVER).await.unwrap();

        assert_eq!(mock.requests_matching("POST", &rb_collection("argocd")).len(), 3);
        assert!(mock.requests_matching("POST", &rb_collection("team-a")).is_empty());
    }

    #[tokio::test]
    async fn test_dex_disabled_deletes_role_and_binding() {
        let mock = cluster_mock();
        let config = Config {
            disable_dex: true,
            ..Default::default()
        };
        let ctx = test_context_with(mock.clone().into_client(), config, ClusterCapabilities::default());
        let argocd = make_argocd("argocd", "argocd");
        let name = format!("argocd-{}", identifiers::DEX_SERVER);

        let roles = reconcile_role(&ctx, &argocd, identifiers::DEX_SERVER, policy_rule_for_dex_server())
            .await
            .unwrap();
        reconcile_role_binding(&ctx, &argocd, identifiers::DEX_SERVER).await.unwrap();

        assert!(roles.is_empty());
        assert_eq!(
            mock.requests_matching("DELETE", &format!("{}/namespaces/argocd/roles/{}", RB_BASE, name))
                .len(),
            1
        );
        assert_eq!(mock.requests_matching("DELETE", &rb_path("argocd", &name)).len(), 1);
        assert!(mock.requests_matching("POST", &rb_collection("argocd")).is_empty());
    }

    #[tokio::test]
    async fn test_custom_cluster_role_used_as_role_ref() {
        let mock = cluster_mock();
        let config = Config {
            controller_cluster_role: Some("custom-controller-role".to_string()),
            server_cluster_role: Some("custom-server-role".to_string()),
            ..Default::default()
        };
        let ctx = test_context_with(mock.clone().into_client(), config, ClusterCapabilities::default());
        let argocd = make_argocd("argocd", "argocd");

        reconcile_role_binding(&ctx, &argocd, identifiers::APPLICATION_CONTROLLER)
            .await
            .unwrap();
        reconcile_role_binding(&ctx, &argocd, identifiers::SERVER).await.unwrap();

        for namespace in ["argocd", "team-a"] {
            let posts = mock.requests_matching("POST", &rb_collection(namespace));
            assert_eq!(posts.len(), 2);
            assert_eq!(posts[0].json()["roleRef"]["kind"], "ClusterRole");
            assert_eq!(posts[0].json()["roleRef"]["name"], "custom-controller-role");
            assert_eq!(posts[1].json()["roleRef"]["name"], "custom-server-role");
        }
    }

    #[tokio::test]
    async fn test_role_created_with_rules() {
        let mock = cluster_mock();
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");

        let roles = reconcile_role(
            &ctx,
            &argocd,
            identifiers::APPLICATION_CONTROLLER,
            policy_rule_for_application_controller(),
        )
        .await
        .unwrap();

        assert_eq!(roles.len(), 2);
        let posts = mock.requests_matching("POST", &format!("{}/namespaces/team-a/roles", RB_BASE));
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].json()["rules"][0]["verbs"][0], "*");
    }

    #[tokio::test]
    async fn test_cluster_role_binding_created_and_role_ref_drift_recreated() {
        let mock = MockService::new();
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");
        let cluster_role = ClusterRole {
            metadata: ObjectMeta {
                name: Some("x".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let service_account = ServiceAccount {
            metadata: ObjectMeta {
                name: Some("x".to_string()),
                namespace: Some("argocd".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        reconcile_cluster_role_binding(&ctx, &argocd, "x", Some(&cluster_role), &service_account)
            .await
            .unwrap();

        let posts = mock.requests_matching("POST", &format!("{}/clusterrolebindings", RB_BASE));
        assert_eq!(posts.len(), 1);
        let body = posts[0].json();
        assert_eq!(body["metadata"]["name"], "argocd-argocd-x");
        assert!(body["metadata"]["ownerReferences"].is_null());

        let drifted = ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some("argocd-argocd-x".to_string()),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: RBAC_API_GROUP.to_string(),
                kind: "ClusterRole".to_string(),
                name: "not-x".to_string(),
            },
            subjects: Some(vec![service_account_subject("not-x", "argocd")]),
        };
        let path = format!("{}/clusterrolebindings/argocd-argocd-x", RB_BASE);
        let mock = MockService::new().with_object(&path, &drifted);
        let ctx = test_context(mock.clone().into_client());

        reconcile_cluster_role_binding(&ctx, &argocd, "x", Some(&cluster_role), &service_account)
            .await
            .unwrap();

        assert_eq!(mock.requests_matching("DELETE", &path).len(), 1);
        let posts = mock.requests_matching("POST", &format!("{}/clusterrolebindings", RB_BASE));
        assert_eq!(posts[0].json()["roleRef"]["name"], "x");
        assert_eq!(posts[0].json()["subjects"][0]["name"], "x");
    }

    #[tokio::test]
    async fn test_cluster_role_only_in_cluster_config_namespaces() {
        let mock = MockService::new();
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");

        let role = reconcile_cluster_role(
            &ctx,
            &argocd,
            identifiers::APPLICATION_CONTROLLER,
            policy_rule_for_cluster_application_controller(),
        )
        .await
        .unwrap();

        assert!(role.is_none());
        assert!(mock
            .requests_matching("POST", &format!("{}/clusterroles", RB_BASE))
            .is_empty());

        let mock = MockService::new();
        let config = Config {
            cluster_config_namespaces: vec!["argocd".to_string()],
            ..Default::default()
        };
        let ctx = test_context_with(mock.clone().into_client(), config, ClusterCapabilities::default());

        let role = reconcile_cluster_role(
            &ctx,
            &argocd,
            identifiers::APPLICATION_CONTROLLER,
            policy_rule_for_cluster_application_controller(),
        )
        .await
        .unwrap();

        assert_eq!(
            role.unwrap().name_any(),
            "argocd-argocd-argocd-application-controller"
        );
        assert_eq!(
            mock.requests_matching("POST", &format!("{}/clusterroles", RB_BASE)).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_managed_namespace_rbac() {
        let mock = MockService::new().on_get("/api/v1/namespaces", 200, &namespace_list_json(&["argocd", "team-a"]));
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");

        delete_managed_namespace_rbac(&ctx, &argocd).await.unwrap();

        assert_eq!(
            mock.requests_matching("DELETE", &rb_path("team-a", "argocd-argocd-application-controller"))
                .len(),
            1
        );
        assert!(mock
            .requests_matching("DELETE", &rb_path("argocd", "argocd-argocd-application-controller"))
            .is_empty());
    }
}
