// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::deployment::{pod_labels, tls_volume, tls_volume_mount};
use super::{RedisReconciler, COMPONENT, HA_REPLICAS};
use crate::constants::ports;
use crate::error::Result;
use crate::reconcilers::common::{delete_if_exists, reconcile_object, sync_statefulset};
use crate::util::{object_meta, proxy_env_vars, restricted_security_context};
use crate::workloads::Request;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, ExecAction, PodSecurityContext,
    PodSpec, PodTemplateSpec, Probe, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

const CONFIG_VOLUME: &str = "config";
const HEALTH_VOLUME: &str = "health";
const DATA_VOLUME: &str = "data";

fn exec_probe(script: &str, initial_delay: i32) -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(vec!["sh".to_string(), "-c".to_string(), format!("/health/{}", script)]),
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(15),
        timeout_seconds: Some(15),
        failure_threshold: Some(5),
        success_threshold: Some(1),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn server_mounts() -> Vec<VolumeMount> {
    vec![
        mount(DATA_VOLUME, "/data"),
        mount(HEALTH_VOLUME, "/health"),
        tls_volume_mount(),
    ]
}

impl RedisReconciler<'_> {
    fn ha_server_container(&self, name: &str, command: &str, config: &str, port: i32) -> Container {
        Container {
            name: name.to_string(),
            image: Some(self.get_ha_container_image()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: Some(vec![command.to_string()]),
            args: Some(vec![format!("/data/conf/{}", config)]),
            ports: Some(vec![ContainerPort {
                name: Some(name.to_string()),
                container_port: port,
                ..Default::default()
            }]),
            resources: Some(self.get_ha_resources()),
            env: Some(proxy_env_vars(&self.ctx.config)),
            security_context: Some(restricted_security_context(Some(1000))),
            volume_mounts: Some(server_mounts()),
            ..Default::default()
        }
    }

    pub(super) fn desired_ha_server_statefulset(&self) -> Result<StatefulSet> {
        let name = self.ha_server_resource_name();
        let labels = pod_labels(&self.ha_resource_name());

        let init_container = Container {
            name: "config-init".to_string(),
            image: Some(self.get_ha_container_image()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            command: Some(vec!["sh".to_string()]),
            args: Some(vec!["/readonly-config/init.sh".to_string()]),
            resources: Some(self.get_ha_resources()),
            env: Some(proxy_env_vars(&self.ctx.config)),
            security_context: Some(restricted_security_context(Some(1000))),
            volume_mounts: Some(vec![
                VolumeMount {
                    read_only: Some(true),
                    ..mount(CONFIG_VOLUME, "/readonly-config")
                },
                mount(DATA_VOLUME, "/data"),
                tls_volume_mount(),
            ]),
            ..Default::default()
        };

        let redis = Container {
            liveness_probe: Some(exec_probe("redis_liveness.sh", 30)),
            readiness_probe: Some(exec_probe("redis_readiness.sh", 30)),
            ..self.ha_server_container("redis", "redis-server", "redis.conf", ports::REDIS)
        };
        let sentinel = Container {
            liveness_probe: Some(exec_probe("sentinel_liveness.sh", 30)),
            ..self.ha_server_container("sentinel", "redis-sentinel", "sentinel.conf", ports::REDIS_SENTINEL)
        };

        Request::new(
            StatefulSet {
                metadata: object_meta(&name, &self.namespace(), self.instance, COMPONENT),
                spec: Some(StatefulSetSpec {
                    replicas: Some(HA_REPLICAS),
                    service_name: self.ha_resource_name(),
                    pod_management_policy: Some("OrderedReady".to_string()),
                    selector: LabelSelector {
                        match_labels: Some(labels.clone()),
                        ..Default::default()
                    },
                    template: PodTemplateSpec {
                        metadata: Some(ObjectMeta {
                            labels: Some(labels),
                            ..Default::default()
                        }),
                        spec: Some(PodSpec {
                            node_selector: Some(self.instance.node_selector()),
                            service_account_name: Some(self.ha_service_account_name()),
                            automount_service_account_token: Some(false),
                            termination_grace_period_seconds: Some(60),
                            security_context: Some(PodSecurityContext {
                                fs_group: Some(1000),
                                run_as_non_root: Some(true),
                                run_as_user: Some(1000),
                                ..Default::default()
                            }),
                            init_containers: Some(vec![init_container]),
                            containers: vec![redis, sentinel],
                            volumes: Some(vec![
                                Volume {
                                    name: CONFIG_VOLUME.to_string(),
                                    config_map: Some(ConfigMapVolumeSource {
                                        name: self.ha_configmap_name(),
                                        ..Default::default()
                                    }),
                                    ..Default::default()
                                },
                                Volume {
                                    name: HEALTH_VOLUME.to_string(),
                                    config_map: Some(ConfigMapVolumeSource {
                                        name: self.ha_health_configmap_name(),
                                        default_mode: Some(0o755),
                                        ..Default::default()
                                    }),
                                    ..Default::default()
                                },
                                Volume {
                                    name: DATA_VOLUME.to_string(),
                                    empty_dir: Some(EmptyDirVolumeSource::default()),
                                    ..Default::default()
                                },
                                tls_volume(),
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

    pub(super) async fn reconcile_ha_server_statefulset(&self) -> Result<()> {
        let desired = self.desired_ha_server_statefulset()?;
        reconcile_object(self.ctx, self.instance, desired, sync_statefulset).await?;
        Ok(())
    }

    pub(super) async fn delete_ha_server_statefulset(&self) -> Result<()> {
        delete_if_exists::<StatefulSet>(&self.ctx.client, &self.ha_server_resource_name(), &self.namespace())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_argocd, server_view, test_context, MockService};

    #[tokio::test]
    async fn test_desired_ha_server_statefulset() {
        let ctx = test_context(MockService::new().into_client());
        let argocd = make_argocd("argocd", "argocd");

        let statefulset = RedisReconciler::new(&ctx, &argocd)
            .desired_ha_server_statefulset()
            .unwrap();

        let spec = statefulset.spec.unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.service_name, "argocd-redis-ha");
        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.service_account_name.as_deref(), Some("argocd-argocd-redis-ha"));

        let names: Vec<&str> = pod.containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["redis", "sentinel"]);
        assert_eq!(
            pod.containers[1].args.as_deref(),
            Some(&["/data/conf/sentinel.conf".to_string()][..])
        );
        let init = &pod.init_containers.unwrap()[0];
        assert_eq!(init.args.as_deref(), Some(&["/readonly-config/init.sh".to_string()][..]));
    }

    #[tokio::test]
    async fn test_ha_server_pods_match_announce_selectors() {
        let ctx = test_context(MockService::new().into_client());
        let argocd = make_argocd("argocd", "argocd");
        let reconciler = RedisReconciler::new(&ctx, &argocd);

        let statefulset = reconciler.desired_ha_server_statefulset().unwrap();
        let pod_labels = statefulset.spec.unwrap().template.metadata.unwrap().labels.unwrap();
        let selector = reconciler.desired_ha_announce_service(0).unwrap().spec.unwrap().selector.unwrap();

        assert_eq!(pod_labels.get("app.kubernetes.io/name"), selector.get("app.kubernetes.io/name"));
    }

    #[tokio::test]
    async fn test_server_defaulted_ha_server_statefulset_is_not_drift() {
        let ctx = test_context(MockService::new().into_client());
        let argocd = make_argocd("argocd", "argocd");
        let desired = RedisReconciler::new(&ctx, &argocd)
            .desired_ha_server_statefulset()
            .unwrap();

        let mut stored = server_view(&desired);
        assert!(stored.spec.as_ref().unwrap().template.spec.as_ref().unwrap().init_containers.as_ref().unwrap()[0]
            .termination_message_path
            .is_some());

        assert!(!sync_statefulset(&mut stored, &desired));
    }
}
