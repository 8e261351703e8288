// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{RedisReconciler, COMPONENT, HA_REPLICAS};
use crate::constants::{annotations, labels, names, ports};
use crate::error::Result;
use crate::reconcilers::common::{delete_if_exists, reconcile_object, sync_service};
use crate::util::object_meta;
use crate::workloads::Request;
use k8s_openapi::api::core::v1::{Service, ServiceAccount, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

const STATEFULSET_POD_NAME: &str = "statefulset.kubernetes.io/pod-name";

impl RedisReconciler<'_> {
    /// Client facing redis Service; with `autotls: openshift` the service CA issues its certificate
    fn redis_service(&self, name: &str) -> Result<Service> {
        let mut metadata = object_meta(name, &self.namespace(), self.instance, COMPONENT);
        if self.instance.spec.redis.wants_auto_tls() {
            metadata.annotations.get_or_insert_with(BTreeMap::new).insert(
                annotations::SERVING_CERT_SECRET_NAME.to_string(),
                names::REDIS_TLS_SECRET.to_string(),
            );
        }
        Request::new(
            Service {
                metadata,
                spec: Some(ServiceSpec {
                    selector: Some(BTreeMap::from([(labels::NAME.to_string(), name.to_string())])),
                    ports: Some(vec![ServicePort {
                        name: Some("tcp-redis".to_string()),
                        port: ports::REDIS,
                        target_port: Some(IntOrString::Int(ports::REDIS)),
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            self.instance,
        )
        .request()
    }

    fn ha_server_ports() -> Vec<ServicePort> {
        [("server", ports::REDIS), ("sentinel", ports::REDIS_SENTINEL)]
            .into_iter()
            .map(|(name, port)| ServicePort {
                name: Some(name.to_string()),
                port,
                target_port: Some(IntOrString::Int(port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            })
            .collect()
    }

    /// `<instance>-redis-ha-announce-<n>` for every HA server member
    pub(super) fn ha_announce_service_names(&self) -> Vec<String> {
        (0..HA_REPLICAS)
            .map(|i| format!("{}-announce-{}", self.ha_resource_name(), i))
            .collect()
    }

    /// Headless service through which sentinels are discovered
    pub(super) fn desired_ha_headless_service(&self) -> Result<Service> {
        let name = self.ha_resource_name();
        Request::new(
            Service {
                metadata: object_meta(&name, &self.namespace(), self.instance, COMPONENT),
                spec: Some(ServiceSpec {
                    cluster_ip: Some("None".to_string()),
                    selector: Some(BTreeMap::from([(labels::NAME.to_string(), name.clone())])),
                    ports: Some(Self::ha_server_ports()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            self.instance,
        )
        .request()
    }

    /// Stable per-member address, resolvable before the pod is ready
    pub(super) fn desired_ha_announce_service(&self, index: i32) -> Result<Service> {
        let name = format!("{}-announce-{}", self.ha_resource_name(), index);
        let pod = format!("{}-{}", self.ha_server_resource_name(), index);
        Request::new(
            Service {
                metadata: object_meta(&name, &self.namespace(), self.instance, COMPONENT),
                spec: Some(ServiceSpec {
                    publish_not_ready_addresses: Some(true),
                    selector: Some(BTreeMap::from([
                        (labels::NAME.to_string(), self.ha_resource_name()),
                        (STATEFULSET_POD_NAME.to_string(), pod),
                    ])),
                    ports: Some(Self::ha_server_ports()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            self.instance,
        )
        .request()
    }

    pub(super) async fn reconcile_ha_server_services(&self) -> Result<()> {
        let desired = self.desired_ha_headless_service()?;
        reconcile_object(self.ctx, self.instance, desired, sync_service).await?;
        for index in 0..HA_REPLICAS {
            let desired = self.desired_ha_announce_service(index)?;
            reconcile_object(self.ctx, self.instance, desired, sync_service).await?;
        }
        Ok(())
    }

    pub(super) async fn reconcile_service(&self) -> Result<()> {
        let desired = self.redis_service(&self.resource_name())?;
        reconcile_object(self.ctx, self.instance, desired, sync_service).await?;
        Ok(())
    }

    pub(super) async fn reconcile_ha_proxy_service(&self) -> Result<()> {
        let desired = self.redis_service(&self.ha_proxy_resource_name())?;
        reconcile_object(self.ctx, self.instance, desired, sync_service).await?;
        Ok(())
    }

    pub(super) async fn delete_service(&self, name: &str) -> Result<()> {
        delete_if_exists::<Service>(&self.ctx.client, name, &self.namespace()).await?;
        Ok(())
    }

    pub(super) async fn delete_ha_services(&self) -> Result<()> {
        self.delete_service(&self.ha_proxy_resource_name()).await?;
        self.delete_service(&self.ha_resource_name()).await?;
        for name in self.ha_announce_service_names() {
            self.delete_service(&name).await?;
        }
        Ok(())
    }

    pub(super) async fn delete_service_account(&self, name: &str) -> Result<()> {
        delete_if_exists::<ServiceAccount>(&self.ctx.client, name, &self.namespace()).await?;
        Ok(())
    }
}
