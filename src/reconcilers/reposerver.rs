// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Repo server: generates manifests from Git for the application controller.

use crate::constants::{annotations, identifiers, images, labels, names, ports};
use crate::error::Result;
use crate::reconcilers::common::{
    delete_if_exists, reconcile_object, sync_deployment, sync_field, sync_metadata, sync_service, Context,
};
use crate::reconcilers::rbac::{
    delete_namespaced_rbac, policy_rule_for_repo_server, reconcile_role, reconcile_role_binding,
    reconcile_service_account,
};
use crate::reconcilers::redis::RedisReconciler;
use crate::types::service_monitor::{ServiceMonitorEndpoint, ServiceMonitorSpec};
use crate::types::{ArgoCD, ServiceMonitor};
use crate::util::{
    container_image, fqdn_service_ref, name_with_suffix, non_empty, object_meta, proxy_env_vars,
    restricted_security_context,
};
use crate::workloads::{self, Request};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, KeyToPath, PodSpec, PodTemplateSpec, Probe, ResourceRequirements,
    SecretVolumeSource, Service, ServiceAccount, ServicePort, ServiceSpec, TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{info, instrument};

const COMPONENT: &str = "repo-server";
const TLS_PATH: &str = "/app/config/reposerver/tls";
const REDIS_TLS_PATH: &str = "/app/config/reposerver/tls/redis";

/// Reconciles the repo server objects of one ArgoCD instance
pub struct RepoServerReconciler<'a> {
    ctx: &'a Context,
    instance: &'a ArgoCD,
}

impl<'a> RepoServerReconciler<'a> {
    pub fn new(ctx: &'a Context, instance: &'a ArgoCD) -> Self {
        Self { ctx, instance }
    }

    /// `<instance>-repo-server`
    pub fn resource_name(&self) -> String {
        name_with_suffix(self.instance, COMPONENT)
    }

    /// `<instance>-repo-server-metrics`
    pub fn metrics_resource_name(&self) -> String {
        name_with_suffix(self.instance, "repo-server-metrics")
    }

    /// Service account bound by the `<instance>-argocd-repo-server` RoleBinding
    pub fn service_account_name(&self) -> String {
        name_with_suffix(self.instance, identifiers::REPO_SERVER)
    }

    fn namespace(&self) -> String {
        self.instance.instance_namespace()
    }

    /// In-cluster address of the repo server
    pub fn get_server_address(&self) -> String {
        fqdn_service_ref(&self.resource_name(), &self.namespace(), ports::REPO_SERVER)
    }

    #[instrument(skip(self), fields(instance = %self.instance.name_any()))]
    pub async fn reconcile(&self) -> Result<()> {
        reconcile_service_account(self.ctx, self.instance, &self.service_account_name(), COMPONENT).await?;
        reconcile_role(self.ctx, self.instance, identifiers::REPO_SERVER, policy_rule_for_repo_server()).await?;
        reconcile_role_binding(self.ctx, self.instance, identifiers::REPO_SERVER).await?;
        self.reconcile_service().await?;

        let mut redis = RedisReconciler::new(self.ctx, self.instance);
        let redis_tls = redis.use_tls().await;
        redis.set_tls_enabled(redis_tls);
        self.reconcile_deployment(&redis).await?;

        if self.ctx.capabilities.prometheus_api {
            self.reconcile_service_monitor().await?;
        }
        Ok(())
    }

    fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(labels::NAME.to_string(), self.resource_name())])
    }

    pub fn get_container_image(&self) -> String {
        let repo = &self.instance.spec.repo;
        let spec = &self.instance.spec;
        let env_override = self
            .ctx
            .config
            .images
            .repo_server
            .as_ref()
            .or(self.ctx.config.images.argocd.as_ref());
        container_image(
            repo.image.as_ref().or(spec.image.as_ref()),
            repo.version.as_ref().or(spec.version.as_ref()),
            env_override,
            images::ARGOCD,
            images::ARGOCD_VERSION,
        )
    }

    pub fn get_resources(&self) -> ResourceRequirements {
        self.instance.spec.repo.resources.clone().unwrap_or_default()
    }

    /// Arguments of the repo server, wired to the redis instance
    pub fn get_args(&self, redis: &RedisReconciler<'_>) -> Vec<String> {
        let mut args = vec![
            "uid_entrypoint.sh".to_string(),
            "argocd-repo-server".to_string(),
            "--redis".to_string(),
            redis.get_server_address(),
        ];

        if redis.tls_enabled() {
            args.push("--redis-use-tls".to_string());
            if redis.tls_verification_disabled() {
                args.push("--redis-insecure-skip-tls-verify".to_string());
            } else {
                args.push("--redis-ca-certificate".to_string());
                args.push(format!("{}/tls.crt", REDIS_TLS_PATH));
            }
        }

        args.push("--loglevel".to_string());
        args.push(
            non_empty(self.instance.spec.repo.log_level.as_ref())
                .unwrap_or("info")
                .to_string(),
        );
        args.push("--logformat".to_string());
        args.push("text".to_string());
        args
    }

    fn tcp_probe(&self, initial_delay: i32) -> Probe {
        Probe {
            tcp_socket: Some(TCPSocketAction {
                port: IntOrString::Int(ports::REPO_SERVER),
                ..Default::default()
            }),
            initial_delay_seconds: Some(initial_delay),
            period_seconds: Some(10),
            ..Default::default()
        }
    }

    pub(crate) fn desired_deployment(&self, redis: &RedisReconciler<'_>) -> Result<Deployment> {
        let name = self.resource_name();
        let repo = &self.instance.spec.repo;

        let container = Container {
            name: "argocd-repo-server".to_string(),
            image: Some(self.get_container_image()),
            image_pull_policy: Some("Always".to_string()),
            command: Some(self.get_args(redis)),
            ports: Some(vec![
                ContainerPort {
                    name: Some("server".to_string()),
                    container_port: ports::REPO_SERVER,
                    ..Default::default()
                },
                ContainerPort {
                    name: Some("metrics".to_string()),
                    container_port: ports::REPO_SERVER_METRICS,
                    ..Default::default()
                },
            ]),
            resources: Some(self.get_resources()),
            env: Some(proxy_env_vars(&self.ctx.config)),
            liveness_probe: Some(self.tcp_probe(5)),
            readiness_probe: Some(self.tcp_probe(5)),
            security_context: Some(restricted_security_context(None)),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: "tmp".to_string(),
                    mount_path: "/tmp".to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: names::REPO_SERVER_TLS_SECRET.to_string(),
                    mount_path: TLS_PATH.to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: names::REDIS_TLS_SECRET.to_string(),
                    mount_path: REDIS_TLS_PATH.to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        let service_account = non_empty(repo.service_account.as_ref())
            .map(str::to_string)
            .unwrap_or_else(|| self.service_account_name());

        Request::new(
            Deployment {
                metadata: object_meta(&name, &self.namespace(), self.instance, COMPONENT),
                spec: Some(DeploymentSpec {
                    replicas: repo.replicas,
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
                            automount_service_account_token: Some(repo.mount_sa_token),
                            service_account_name: Some(service_account),
                            node_selector: Some(self.instance.node_selector()),
                            containers: vec![container],
                            volumes: Some(vec![
                                Volume {
                                    name: "tmp".to_string(),
                                    empty_dir: Some(EmptyDirVolumeSource::default()),
                                    ..Default::default()
                                },
                                Volume {
                                    name: names::REPO_SERVER_TLS_SECRET.to_string(),
                                    secret: Some(SecretVolumeSource {
                                        secret_name: Some(names::REPO_SERVER_TLS_SECRET.to_string()),
                                        optional: Some(true),
                                        ..Default::default()
                                    }),
                                    ..Default::default()
                                },
                                Volume {
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
                                },
                            ]),
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

    async fn reconcile_deployment(&self, redis: &RedisReconciler<'_>) -> Result<()> {
        let desired = self.desired_deployment(redis)?;
        reconcile_object(self.ctx, self.instance, desired, sync_deployment).await?;
        Ok(())
    }

    pub(crate) fn desired_service(&self) -> Result<Service> {
        let name = self.resource_name();
        let mut metadata = object_meta(&name, &self.namespace(), self.instance, COMPONENT);
        if self.instance.spec.repo.wants_auto_tls() {
            metadata.annotations.get_or_insert_with(BTreeMap::new).insert(
                annotations::SERVING_CERT_SECRET_NAME.to_string(),
                names::REPO_SERVER_TLS_SECRET.to_string(),
            );
        }
        Request::new(
            Service {
                metadata,
                spec: Some(ServiceSpec {
                    selector: Some(self.labels()),
                    ports: Some(vec![
                        ServicePort {
                            name: Some("server".to_string()),
                            port: ports::REPO_SERVER,
                            target_port: Some(IntOrString::Int(ports::REPO_SERVER)),
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        },
                        ServicePort {
                            name: Some("metrics".to_string()),
                            port: ports::REPO_SERVER_METRICS,
                            target_port: Some(IntOrString::Int(ports::REPO_SERVER_METRICS)),
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        },
                    ]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            self.instance,
        )
        .request()
    }

    async fn reconcile_service(&self) -> Result<()> {
        let desired = self.desired_service()?;
        reconcile_object(self.ctx, self.instance, desired, sync_service).await?;
        Ok(())
    }

    async fn reconcile_service_monitor(&self) -> Result<()> {
        let name = self.metrics_resource_name();
        let mut monitor = ServiceMonitor::new(
            &name,
            ServiceMonitorSpec {
                selector: LabelSelector {
                    match_labels: Some(self.labels()),
                    ..Default::default()
                },
                endpoints: vec![ServiceMonitorEndpoint {
                    port: Some("metrics".to_string()),
                    ..Default::default()
                }],
            },
        );
        monitor.metadata = object_meta(&name, &self.namespace(), self.instance, COMPONENT);
        monitor
            .labels_mut()
            .insert("release".to_string(), "prometheus-operator".to_string());
        let desired = Request::new(monitor, self.instance).request()?;

        reconcile_object(self.ctx, self.instance, desired, |existing: &mut ServiceMonitor, desired| {
            let metadata = sync_metadata(&mut existing.metadata, &desired.metadata);
            let spec = sync_field(&mut existing.spec, &desired.spec);
            metadata || spec
        })
        .await?;
        Ok(())
    }

    /// Remove every repo server object of the instance
    pub async fn delete_resources(&self) -> Result<()> {
        let name = self.resource_name();
        let namespace = self.namespace();
        let client = &self.ctx.client;

        if self.ctx.capabilities.prometheus_api {
            delete_if_exists::<ServiceMonitor>(client, &self.metrics_resource_name(), &namespace).await?;
        }
        delete_if_exists::<Deployment>(client, &name, &namespace).await?;
        delete_if_exists::<Service>(client, &name, &namespace).await?;
        delete_if_exists::<ServiceAccount>(client, &self.service_account_name(), &namespace).await?;
        delete_namespaced_rbac(self.ctx, self.instance, identifiers::REPO_SERVER).await?;
        info!("Repo server resources of {}/{} deleted", namespace, self.instance.name_any());
        Ok(())
    }

    /// Roll the repo server pods; fails when the Deployment does not exist
    pub async fn trigger_rollout(&self, key: &str) -> Result<()> {
        workloads::trigger_deployment_rollout(&self.ctx.client, &self.resource_name(), &self.namespace(), key).await
    }
}
