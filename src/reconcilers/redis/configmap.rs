// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{RedisReconciler, COMPONENT};
use crate::error::Result;
use crate::reconcilers::common::{delete_if_exists, reconcile_object, sync_configmap};
use crate::util::{name_with_suffix, object_meta};
use crate::workloads::Request;
use k8s_openapi::api::core::v1::ConfigMap;
use std::collections::BTreeMap;

impl RedisReconciler<'_> {
    /// `<instance>-redis-ha-configmap`
    pub fn ha_configmap_name(&self) -> String {
        name_with_suffix(self.instance, "redis-ha-configmap")
    }

    /// `<instance>-redis-ha-health-configmap`
    pub fn ha_health_configmap_name(&self) -> String {
        name_with_suffix(self.instance, "redis-ha-health-configmap")
    }

    fn configmap(&self, name: &str, data: BTreeMap<String, String>) -> Result<ConfigMap> {
        Request::new(
            ConfigMap {
                metadata: object_meta(name, &self.namespace(), self.instance, COMPONENT),
                data: Some(data),
                ..Default::default()
            },
            self.instance,
        )
        .request()
    }

    pub(super) async fn reconcile_ha_configmap(&self) -> Result<()> {
        let data = BTreeMap::from([
            ("haproxy.cfg".to_string(), self.get_haproxy_config()),
            ("haproxy_init.sh".to_string(), self.get_haproxy_init_script()),
            ("init.sh".to_string(), self.get_init_script()),
            ("redis.conf".to_string(), self.get_conf()),
            ("sentinel.conf".to_string(), self.get_sentinel_conf()),
        ]);
        let desired = self.configmap(&self.ha_configmap_name(), data)?;
        reconcile_object(self.ctx, self.instance, desired, sync_configmap).await?;
        Ok(())
    }

    pub(super) async fn reconcile_ha_health_configmap(&self) -> Result<()> {
        let data = BTreeMap::from([
            ("redis_liveness.sh".to_string(), self.get_liveness_script()),
            ("redis_readiness.sh".to_string(), self.get_readiness_script()),
            ("sentinel_liveness.sh".to_string(), self.get_sentinel_liveness_script()),
        ]);
        let desired = self.configmap(&self.ha_health_configmap_name(), data)?;
        reconcile_object(self.ctx, self.instance, desired, sync_configmap).await?;
        Ok(())
    }

    pub(super) async fn delete_ha_configmaps(&self) -> Result<()> {
        let namespace = self.namespace();
        delete_if_exists::<ConfigMap>(&self.ctx.client, &self.ha_configmap_name(), &namespace).await?;
        delete_if_exists::<ConfigMap>(&self.ctx.client, &self.ha_health_configmap_name(), &namespace).await?;
        Ok(())
    }
}
