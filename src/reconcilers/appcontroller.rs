// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Application controller: a StatefulSet, optionally sharded across replicas.

use crate::constants::{identifiers, images, labels, names, ports};
use crate::error::Result;
use crate::reconcilers::common::{reconcile_object, sync_service, sync_statefulset, Context};
use crate::reconcilers::rbac::{
    policy_rule_for_application_controller, policy_rule_for_cluster_application_controller, reconcile_cluster_role,
    reconcile_cluster_role_binding, reconcile_role, reconcile_role_binding, reconcile_service_account,
};
use crate::reconcilers::redis::RedisReconciler;
use crate::reconcilers::reposerver::RepoServerReconciler;
use crate::types::ArgoCD;
use crate::util::{
    container_image, env_var, name_with_suffix, non_empty, object_meta, proxy_env_vars, restricted_security_context,
};
use crate::workloads::{self, Request};
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, KeyToPath, PodSpec, PodTemplateSpec, SecretVolumeSource, Service, ServicePort,
    ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::instrument;

const COMPONENT: &str = "application-controller";
const REDIS_TLS_PATH: &str = "/app/config/controller/tls/redis";
const DEFAULT_STATUS_PROCESSORS: i32 = 20;
const DEFAULT_OPERATION_PROCESSORS: i32 = 10;

/// Reconciles the application controller objects of one ArgoCD instance
pub struct AppControllerReconciler<'a> {
    ctx: &'a Context,
    instance: &'a ArgoCD,
}

impl<'a> AppControllerReconciler<'a> {
    pub fn new(ctx: &'a Context, instance: &'a ArgoCD) -> Self {
        Self { ctx, instance }
    }

    /// `<instance>-application-controller`
    pub fn resource_name(&self) -> String {
        name_with_suffix(self.instance, COMPONENT)
    }

    /// `<instance>-argocd-application-controller`, bound by the controller's roles
    pub fn service_account_name(&self) -> String {
        name_with_suffix(self.instance, identifiers::APPLICATION_CONTROLLER)
    }

    fn namespace(&self) -> String {
        self.instance.instance_namespace()
    }

    fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(labels::NAME.to_string(), self.resource_name())])
    }

    #[instrument(skip(self), fields(instance = %self.instance.name_any()))]
    pub async fn reconcile(&self) -> Result<()> {
        let service_account =
            reconcile_service_account(self.ctx, self.instance, &self.service_account_name(), COMPONENT).await?;
        reconcile_role(
            self.ctx,
            self.instance,
            identifiers::APPLICATION_CONTROLLER,
            policy_rule_for_application_controller(),
        )
        .await?;
        reconcile_role_binding(self.ctx, self.instance, identifiers::APPLICATION_CONTROLLER).await?;

        let cluster_role = reconcile_cluster_role(
            self.ctx,
            self.instance,
            identifiers::APPLICATION_CONTROLLER,
            policy_rule_for_cluster_application_controller(),
        )
        .await?;
        reconcile_cluster_role_binding(
            self.ctx,
            self.instance,
            identifiers::APPLICATION_CONTROLLER,
            cluster_role.as_ref(),
            &service_account,
        )
        .await?;

        self.reconcile_metrics_service().await?;

        let mut redis = RedisReconciler::new(self.ctx, self.instance);
        let redis_tls = redis.use_tls().await;
        redis.set_tls_enabled(redis_tls);
        let desired = self.desired_statefulset(&redis)?;
        reconcile_object(self.ctx, self.instance, desired, sync_statefulset).await?;
        Ok(())
    }

    /// Number of controller replicas; more than one only when sharding
    pub fn get_replicas(&self) -> i32 {
        let sharding = &self.instance.spec.controller.sharding;
        if sharding.enabled {
            sharding.replicas.filter(|r| *r > 0).unwrap_or(1)
        } else {
            1
        }
    }

    pub fn get_container_image(&self) -> String {
        let spec = &self.instance.spec;
        container_image(
            spec.image.as_ref(),
            spec.version.as_ref(),
            self.ctx.config.images.argocd.as_ref(),
            images::ARGOCD,
            images::ARGOCD_VERSION,
        )
    }

    /// Command line of the controller, wired to redis and the repo server
    pub fn get_command(&self, redis: &RedisReconciler<'_>) -> Vec<String> {
        let controller = &self.instance.spec.controller;
        let repo_server = RepoServerReconciler::new(self.ctx, self.instance);

        let mut cmd = vec![
            "argocd-application-controller".to_string(),
            "--operation-processors".to_string(),
            controller
                .processors
                .operation
                .unwrap_or(DEFAULT_OPERATION_PROCESSORS)
                .to_string(),
            "--redis".to_string(),
            redis.get_server_address(),
        ];

        if redis.tls_enabled() {
            cmd.push("--redis-use-tls".to_string());
            if redis.tls_verification_disabled() {
                cmd.push("--redis-insecure-skip-tls-verify".to_string());
            } else {
                cmd.push("--redis-ca-certificate".to_string());
                cmd.push(format!("{}/tls.crt", REDIS_TLS_PATH));
            }
        }

        cmd.extend([
            "--repo-server".to_string(),
            repo_server.get_server_address(),
            "--status-processors".to_string(),
            controller
                .processors
                .status
                .unwrap_or(DEFAULT_STATUS_PROCESSORS)
                .to_string(),
            "--kubectl-parallelism-limit".to_string(),
            "10".to_string(),
        ]);

        if self.instance.spec.repo.verify_tls {
            cmd.push("--repo-server-strict-tls".to_string());
        }

        if let Some(app_sync) = controller.app_sync {
            cmd.push("--app-resync".to_string());
            cmd.push(app_sync.to_string());
        }

        cmd.extend([
            "--loglevel".to_string(),
            non_empty(controller.log_level.as_ref()).unwrap_or("info").to_string(),
            "--logformat".to_string(),
            "text".to_string(),
        ]);
        cmd
    }

    fn get_env(&self) -> Vec<EnvVar> {
        let mut env = proxy_env_vars(&self.ctx.config);
        env.push(env_var("HOME", "/home/argocd"));
        if self.instance.spec.controller.sharding.enabled {
            env.push(env_var("ARGOCD_CONTROLLER_REPLICAS", &self.get_replicas().to_string()));
        }
        env
    }

    pub(crate) fn desired_statefulset(&self, redis: &RedisReconciler<'_>) -> Result<StatefulSet> {
        let name = self.resource_name();
        let container = Container {
            name: identifiers::APPLICATION_CONTROLLER.to_string(),
            image: Some(self.get_container_image()),
            image_pull_policy: Some("Always".to_string()),
            command: Some(self.get_command(redis)),
            env: Some(self.get_env()),
            ports: Some(vec![ContainerPort {
                container_port: ports::APPLICATION_CONTROLLER_METRICS,
                ..Default::default()
            }]),
            resources: Some(self.instance.spec.controller.resources.clone().unwrap_or_default()),
            security_context: Some(restricted_security_context(None)),
            volume_mounts: Some(vec![VolumeMount {
                name: names::REDIS_TLS_SECRET.to_string(),
                mount_path: REDIS_TLS_PATH.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        };

        Request::new(
            StatefulSet {
                metadata: object_meta(&name, &self.namespace(), self.instance, COMPONENT),
                spec: Some(StatefulSetSpec {
                    replicas: Some(self.get_replicas()),
                    service_name: name.clone(),
                    selector: LabelSelector {
                        match_labels: Some(self.labels()),
                        ..Default::default()
                    },
                    template: PodTemplateSpec {
                        metadata: Some(ObjectMeta {
                            labels: Some(self.labels()),
                            ..Default::default()
                        }),
                        spec: Some(PodSpec {
                            service_account_name: Some(self.service_account_name()),
                            node_selector: Some(self.instance.node_selector()),
                            containers: vec![container],
                            volumes: Some(vec![Volume {
                                name: names::REDIS_TLS_SECRET.to_string(),
                                secret: Some(SecretVolumeSource {
                                    secret_name: Some(names::REDIS_TLS_SECRET.to_string()),
                                    optional: Some(true),
                                    items: Some(vec![KeyToPath {
                                        key: "tls.crt".to_string(),
                                        path: "tls.crt".to_string(),
                                        ..Default::default()
                                    }]),
                                    ..Default::default()
                                }),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }),
                    },
                    ..Default::default()
                }),
                ..Default::default()
            },
            self.instance,
        )
        .request()
    }

    async fn reconcile_metrics_service(&self) -> Result<()> {
        let name = name_with_suffix(self.instance, "metrics");
        let desired = Request::new(
            Service {
                metadata: object_meta(&name, &self.namespace(), self.instance, "metrics"),
                spec: Some(ServiceSpec {
                    selector: Some(self.labels()),
                    ports: Some(vec![ServicePort {
                        name: Some("metrics".to_string()),
                        port: ports::APPLICATION_CONTROLLER_METRICS,
                        target_port: Some(IntOrString::Int(ports::APPLICATION_CONTROLLER_METRICS)),
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            self.instance,
        )
        .request()?;
        reconcile_object(self.ctx, self.instance, desired, sync_service).await?;
        Ok(())
    }

    /// Roll the controller pods by updating the template label `key`
    pub async fn trigger_rollout(&self, key: &str) -> Result<()> {
        workloads::trigger_statefulset_rollout(&self.ctx.client, &self.resource_name(), &self.namespace(), key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_argocd, namespace_json, namespace_list_json, test_context, MockService};

    fn command_value(cmd: &[String], flag: &str) -> Option<String> {
        cmd.iter()
            .position(|c| c == flag)
            .and_then(|i| cmd.get(i + 1).cloned())
    }

    #[tokio::test]
    async fn test_command_defaults() {
        let ctx = test_context(MockService::new().into_client());
        let argocd = make_argocd("argocd", "argocd");
        let redis = RedisReconciler::new(&ctx, &argocd);

        let cmd = AppControllerReconciler::new(&ctx, &argocd).get_command(&redis);

        assert_eq!(command_value(&cmd, "--operation-processors").as_deref(), Some("10"));
        assert_eq!(command_value(&cmd, "--status-processors").as_deref(), Some("20"));
        assert_eq!(
            command_value(&cmd, "--repo-server").as_deref(),
            Some("argocd-repo-server.argocd.svc.cluster.local:8081")
        );
        assert!(command_value(&cmd, "--app-resync").is_none());
        assert!(!cmd.contains(&"--repo-server-strict-tls".to_string()));
    }

    #[tokio::test]
    async fn test_command_verifies_repo_server_tls() {
        let ctx = test_context(MockService::new().into_client());
        let mut argocd = make_argocd("argocd", "argocd");
        argocd.spec.repo.verify_tls = true;
        let redis = RedisReconciler::new(&ctx, &argocd);

        let cmd = AppControllerReconciler::new(&ctx, &argocd).get_command(&redis);

        assert!(cmd.contains(&"--repo-server-strict-tls".to_string()));
    }

    #[tokio::test]
    async fn test_command_with_processors_and_resync() {
        let ctx = test_context(MockService::new().into_client());
        let mut argocd = make_argocd("argocd", "argocd");
        argocd.spec.controller.processors.operation = Some(5);
        argocd.spec.controller.processors.status = Some(7);
        argocd.spec.controller.app_sync = Some(600);
        let redis = RedisReconciler::new(&ctx, &argocd);

        let cmd = AppControllerReconciler::new(&ctx, &argocd).get_command(&redis);

        assert_eq!(command_value(&cmd, "--operation-processors").as_deref(), Some("5"));
        assert_eq!(command_value(&cmd, "--status-processors").as_deref(), Some("7"));
        assert_eq!(command_value(&cmd, "--app-resync").as_deref(), Some("600"));
    }

    #[tokio::test]
    async fn test_sharding_sets_replicas_and_env() {
        let ctx = test_context(MockService::new().into_client());
        let mut argocd = make_argocd("argocd", "argocd");
        argocd.spec.controller.sharding.enabled = true;
        argocd.spec.controller.sharding.replicas = Some(3);
        let redis = RedisReconciler::new(&ctx, &argocd);

        let statefulset = AppControllerReconciler::new(&ctx, &argocd)
            .desired_statefulset(&redis)
            .unwrap();

        let spec = statefulset.spec.unwrap();
        assert_eq!(spec.replicas, Some(3));
        let env = spec.template.spec.unwrap().containers[0].env.clone().unwrap();
        let replicas = env.iter().find(|e| e.name == "ARGOCD_CONTROLLER_REPLICAS").unwrap();
        assert_eq!(replicas.value.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_replicas_without_sharding() {
        let ctx = test_context(MockService::new().into_client());
        let mut argocd = make_argocd("argocd", "argocd");
        argocd.spec.controller.sharding.replicas = Some(3);

        assert_eq!(AppControllerReconciler::new(&ctx, &argocd).get_replicas(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_creates_statefulset() {
        let mock = MockService::new()
            .on_get("/api/v1/namespaces/argocd", 200, &namespace_json("argocd"))
            .on_get("/api/v1/namespaces", 200, &namespace_list_json(&["argocd"]));
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");

        AppControllerReconciler::new(&ctx, &argocd).reconcile().await.unwrap();

        let statefulsets = mock.requests_matching("POST", "/apis/apps/v1/namespaces/argocd/statefulsets");
        assert_eq!(statefulsets.len(), 1);
        let body = statefulsets[0].json();
        assert_eq!(body["metadata"]["name"], "argocd-application-controller");
        assert_eq!(
            body["spec"]["template"]["spec"]["serviceAccountName"],
            "argocd-argocd-application-controller"
        );
        assert_eq!(
            mock.requests_matching(
                "POST",
                "/apis/rbac.authorization.k8s.io/v1/namespaces/argocd/rolebindings"
            )
            .len(),
            1
        );
    }
}
