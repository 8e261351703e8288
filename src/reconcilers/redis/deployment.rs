// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{RedisReconciler, COMPONENT, HA_REPLICAS, TLS_PATH};
use crate::constants::{labels, names, ports};
use crate::error::Result;
use crate::reconcilers::common::{reconcile_object, sync_deployment};
use crate::util::{object_meta, proxy_env_vars, restricted_security_context};
use crate::workloads::Request;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, PodSpec, PodTemplateSpec,
    SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

const REDIS_CONTAINER: &str = "redis";
const HAPROXY_CONTAINER: &str = "haproxy";

pub(super) fn tls_volume() -> Volume {
    Volume {
        name: names::REDIS_TLS_SECRET.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(names::REDIS_TLS_SECRET.to_string()),
            optional: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(super) fn tls_volume_mount() -> VolumeMount {
    VolumeMount {
        name: names::REDIS_TLS_SECRET.to_string(),
        mount_path: TLS_PATH.to_string(),
        ..Default::default()
    }
}

pub(super) fn pod_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(labels::NAME.to_string(), name.to_string())])
}

impl RedisReconciler<'_> {
    /// Arguments of the standalone redis server
    pub fn get_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["--save", "", "--appendonly", "no", "--requirepass", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();

        if self.tls_enabled {
            args.extend(
                [
                    "--tls-port".to_string(),
                    ports::REDIS.to_string(),
                    "--port".to_string(),
                    "0".to_string(),
                    "--tls-cert-file".to_string(),
                    format!("{}/tls.crt", TLS_PATH),
                    "--tls-key-file".to_string(),
                    format!("{}/tls.key", TLS_PATH),
                    "--tls-auth-clients".to_string(),
                    "no".to_string(),
                ],
            );
        }
        args
    }

    fn deployment(&self, name: &str, pod_spec: PodSpec) -> Result<Deployment> {
        Request::new(
            Deployment {
                metadata: object_meta(name, &self.namespace(), self.instance, COMPONENT),
                spec: Some(DeploymentSpec {
                    selector: LabelSelector {
                        match_labels: Some(pod_labels(name)),
                        ..Default::default()
                    },
                    template: PodTemplateSpec {
                        metadata: Some(ObjectMeta {
                            labels: Some(pod_labels(name)),
                            ..Default::default()
                        }),
                        spec: Some(pod_spec),
                    },
                    ..Default::default()
                }),
                ..Default::default()
            },
            self.instance,
        )
        .request()
    }

    pub(super) fn desired_deployment(&self) -> Result<Deployment> {
        let name = self.resource_name();
        let container = Container {
            name: REDIS_CONTAINER.to_string(),
            image: Some(self.get_container_image()),
            image_pull_policy: Some("Always".to_string()),
            args: Some(self.get_args()),
            ports: Some(vec![ContainerPort {
                container_port: ports::REDIS,
                ..Default::default()
            }]),
            resources: Some(self.get_resources()),
            env: Some(proxy_env_vars(&self.ctx.config)),
            security_context: Some(restricted_security_context(Some(999))),
            volume_mounts: Some(vec![tls_volume_mount()]),
            ..Default::default()
        };

        self.deployment(
            &name,
            PodSpec {
                node_selector: Some(self.instance.node_selector()),
                containers: vec![container],
                service_account_name: Some(name.clone()),
                volumes: Some(vec![tls_volume()]),
                ..Default::default()
            },
        )
    }

    pub(super) fn desired_ha_proxy_deployment(&self) -> Result<Deployment> {
        let name = self.ha_proxy_resource_name();
        let config_volume = Volume {
            name: "config-volume".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: self.ha_configmap_name(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let shared_volume = Volume {
            name: "data".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        };

        let init_container = Container {
            name: "config-init".to_string(),
            image: Some(self.get_ha_container_image()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: Some(vec!["sh".to_string()]),
            args: Some(vec!["/readonly/haproxy_init.sh".to_string()]),
            resources: Some(self.get_ha_resources()),
            env: Some(proxy_env_vars(&self.ctx.config)),
            security_context: Some(restricted_security_context(None)),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: "config-volume".to_string(),
                    mount_path: "/readonly".to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
                VolumeMount {
                    name: "data".to_string(),
                    mount_path: "/data".to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        let container = Container {
            name: HAPROXY_CONTAINER.to_string(),
            image: Some(self.get_ha_proxy_container_image()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            ports: Some(vec![ContainerPort {
                name: Some("redis".to_string()),
                container_port: ports::REDIS,
                ..Default::default()
            }]),
            resources: Some(self.get_ha_resources()),
            env: Some(proxy_env_vars(&self.ctx.config)),
            security_context: Some(restricted_security_context(None)),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: "data".to_string(),
                    mount_path: "/usr/local/etc/haproxy".to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: "shared-socket".to_string(),
                    mount_path: "/run/haproxy".to_string(),
                    ..Default::default()
                },
                tls_volume_mount(),
            ]),
            ..Default::default()
        };

        let mut deployment = self.deployment(
            &name,
            PodSpec {
                node_selector: Some(self.instance.node_selector()),
                init_containers: Some(vec![init_container]),
                containers: vec![container],
                service_account_name: Some(self.ha_service_account_name()),
                volumes: Some(vec![
                    config_volume,
                    shared_volume,
                    Volume {
                        name: "shared-socket".to_string(),
                        empty_dir: Some(EmptyDirVolumeSource::default()),
                        ..Default::default()
                    },
                    tls_volume(),
                ]),
                ..Default::default()
            },
        )?;
        if let Some(spec) = deployment.spec.as_mut() {
            spec.replicas = Some(HA_REPLICAS);
        }
        Ok(deployment)
    }

    pub(super) async fn reconcile_deployment(&self) -> Result<()> {
        let desired = self.desired_deployment()?;
        reconcile_object(self.ctx, self.instance, desired, sync_deployment).await?;
        Ok(())
    }

    pub(super) async fn reconcile_ha_proxy_deployment(&self) -> Result<()> {
        let desired = self.desired_ha_proxy_deployment()?;
        reconcile_object(self.ctx, self.instance, desired, sync_deployment).await?;
        Ok(())
    }
}
