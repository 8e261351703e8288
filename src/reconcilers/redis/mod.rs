// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Redis cache used by the repo server and application controller.
//!
//! A single redis Deployment is run by default. With HA enabled a three member
//! redis/sentinel StatefulSet is fronted by an HAProxy Deployment, and their
//! configuration is rendered from templates on disk. A remote redis disables all of it.

mod configmap;
mod deployment;
mod helper;
mod service;
mod statefulset;

use crate::constants::identifiers;
use crate::error::Result;
use crate::reconcilers::common::Context;
use crate::reconcilers::rbac::{
    delete_namespaced_rbac, policy_rule_for_redis_ha, reconcile_role, reconcile_role_binding,
    reconcile_service_account,
};
use crate::types::ArgoCD;
use crate::util::name_with_suffix;
use kube::ResourceExt;
use tracing::{debug, info, instrument};

pub(crate) const COMPONENT: &str = "redis";
pub(crate) const TLS_PATH: &str = "/app/config/redis/tls";
pub(crate) const HA_REPLICAS: i32 = 3;

pub(crate) const REDIS_CONF_TPL: &str = "redis.conf.tpl";
pub(crate) const SENTINEL_CONF_TPL: &str = "sentinel.conf.tpl";
pub(crate) const INIT_SH_TPL: &str = "init.sh.tpl";
pub(crate) const LIVENESS_SH_TPL: &str = "redis_liveness.sh.tpl";
pub(crate) const READINESS_SH_TPL: &str = "redis_readiness.sh.tpl";
pub(crate) const SENTINEL_LIVENESS_SH_TPL: &str = "sentinel_liveness.sh.tpl";
pub(crate) const HAPROXY_CFG_TPL: &str = "haproxy.cfg.tpl";
pub(crate) const HAPROXY_INIT_SH_TPL: &str = "haproxy_init.sh.tpl";

/// Reconciles the redis objects of one ArgoCD instance
pub struct RedisReconciler<'a> {
    ctx: &'a Context,
    instance: &'a ArgoCD,
    /// Whether redis serves TLS; decided once per reconcile
    tls_enabled: bool,
}

impl<'a> RedisReconciler<'a> {
    pub fn new(ctx: &'a Context, instance: &'a ArgoCD) -> Self {
        Self {
            ctx,
            instance,
            tls_enabled: false,
        }
    }

    /// Override the TLS decision, for callers that already resolved it
    pub fn set_tls_enabled(&mut self, enabled: bool) {
        self.tls_enabled = enabled;
    }

    /// `<instance>-redis`
    pub fn resource_name(&self) -> String {
        name_with_suffix(self.instance, "redis")
    }

    /// `<instance>-redis-ha`
    pub fn ha_resource_name(&self) -> String {
        name_with_suffix(self.instance, "redis-ha")
    }

    /// `<instance>-redis-ha-server`
    pub fn ha_server_resource_name(&self) -> String {
        name_with_suffix(self.instance, "redis-ha-server")
    }

    /// `<instance>-argocd-redis-ha`, shared by the HA server and HAProxy pods
    pub fn ha_service_account_name(&self) -> String {
        name_with_suffix(self.instance, identifiers::REDIS_HA)
    }

    /// `<instance>-redis-ha-haproxy`
    pub fn ha_proxy_resource_name(&self) -> String {
        name_with_suffix(self.instance, "redis-ha-haproxy")
    }

    fn namespace(&self) -> String {
        self.instance.instance_namespace()
    }

    fn is_remote(&self) -> bool {
        self.instance
            .spec
            .redis
            .remote
            .as_deref()
            .is_some_and(|r| !r.is_empty())
    }

    /// Bring the redis objects in line with the instance
    #[instrument(skip(self), fields(instance = %self.instance.name_any()))]
    pub async fn reconcile(&mut self) -> Result<()> {
        if self.is_remote() {
            info!("Remote redis configured, removing managed redis");
            return self.delete_resources().await;
        }

        self.tls_enabled = self.use_tls().await;
        debug!("Redis TLS enabled: {}", self.tls_enabled);

        reconcile_service_account(self.ctx, self.instance, &self.resource_name(), COMPONENT).await?;

        if self.instance.spec.ha.enabled {
            self.reconcile_ha().await
        } else {
            self.reconcile_standalone().await
        }
    }

    async fn reconcile_standalone(&self) -> Result<()> {
        self.reconcile_service().await?;
        self.reconcile_deployment().await?;

        self.delete_deployment(&self.ha_proxy_resource_name()).await?;
        self.delete_ha_server_statefulset().await?;
        self.delete_ha_services().await?;
        self.delete_ha_configmaps().await?;
        self.delete_service_account(&self.ha_service_account_name()).await?;
        delete_namespaced_rbac(self.ctx, self.instance, identifiers::REDIS_HA).await
    }

    async fn reconcile_ha(&self) -> Result<()> {
        reconcile_role(self.ctx, self.instance, identifiers::REDIS_HA, policy_rule_for_redis_ha()).await?;
        reconcile_role_binding(self.ctx, self.instance, identifiers::REDIS_HA).await?;
        reconcile_service_account(self.ctx, self.instance, &self.ha_service_account_name(), COMPONENT)
            .await?;

        self.reconcile_ha_configmap().await?;
        self.reconcile_ha_health_configmap().await?;
        self.reconcile_ha_server_services().await?;
        self.reconcile_ha_server_statefulset().await?;
        self.reconcile_ha_proxy_service().await?;
        self.reconcile_ha_proxy_deployment().await?;

        self.delete_deployment(&self.resource_name()).await?;
        self.delete_service(&self.resource_name()).await
    }

    /// Remove every redis object owned by the instance
    pub async fn delete_resources(&self) -> Result<()> {
        self.delete_deployment(&self.resource_name()).await?;
        self.delete_deployment(&self.ha_proxy_resource_name()).await?;
        self.delete_ha_server_statefulset().await?;
        self.delete_service(&self.resource_name()).await?;
        self.delete_ha_services().await?;
        self.delete_ha_configmaps().await?;
        self.delete_service_account(&self.resource_name()).await?;
        self.delete_service_account(&self.ha_service_account_name()).await?;
        delete_namespaced_rbac(self.ctx, self.instance, identifiers::REDIS_HA).await
    }
}
