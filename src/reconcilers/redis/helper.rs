// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{
    RedisReconciler, HAPROXY_CFG_TPL, HAPROXY_INIT_SH_TPL, INIT_SH_TPL, LIVENESS_SH_TPL, READINESS_SH_TPL,
    REDIS_CONF_TPL, SENTINEL_CONF_TPL, SENTINEL_LIVENESS_SH_TPL, TLS_PATH,
};
use crate::constants::{images, names, ports};
use crate::error::Result;
use crate::reconcilers::common::delete_if_exists;
use crate::util::{container_image, fqdn_service_ref, load_template_file};
use crate::workloads;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ResourceRequirements;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error};

impl RedisReconciler<'_> {
    pub fn tls_verification_disabled(&self) -> bool {
        self.instance.spec.redis.disable_tls_verification
    }

    /// Whether TLS is in use for the current reconcile
    pub fn tls_enabled(&self) -> bool {
        self.tls_enabled
    }

    /// Redis serves TLS only when its TLS secret exists and belongs to an ArgoCD instance
    pub async fn use_tls(&self) -> bool {
        let namespace = self.namespace();
        match workloads::find_secret_owner_instance(&self.ctx.client, names::REDIS_TLS_SECRET, &namespace).await {
            Ok(owner) => owner.is_some(),
            Err(e) if e.is_not_found() => {
                debug!("Redis TLS secret not found, skipping TLS enforcement");
                false
            }
            Err(e) => {
                error!("Failed to find the owner of the redis TLS secret: {}", e);
                false
            }
        }
    }

    /// Address clients use to reach redis
    pub fn get_server_address(&self) -> String {
        if let Some(remote) = self.instance.spec.redis.remote.as_ref().filter(|r| !r.is_empty()) {
            return remote.clone();
        }
        if self.instance.spec.ha.enabled {
            return self.get_ha_proxy_address();
        }
        fqdn_service_ref(&self.resource_name(), &self.namespace(), ports::REDIS)
    }

    pub fn get_ha_proxy_address(&self) -> String {
        fqdn_service_ref(&self.ha_proxy_resource_name(), &self.namespace(), ports::REDIS)
    }

    pub fn get_container_image(&self) -> String {
        let redis = &self.instance.spec.redis;
        container_image(
            redis.image.as_ref(),
            redis.version.as_ref(),
            self.ctx.config.images.redis.as_ref(),
            images::REDIS,
            images::REDIS_VERSION,
        )
    }

    pub fn get_ha_container_image(&self) -> String {
        let redis = &self.instance.spec.redis;
        container_image(
            redis.image.as_ref(),
            redis.version.as_ref(),
            self.ctx.config.images.redis.as_ref(),
            images::REDIS_HA,
            images::REDIS_HA_VERSION,
        )
    }

    pub fn get_ha_proxy_container_image(&self) -> String {
        let ha = &self.instance.spec.ha;
        container_image(
            ha.redis_proxy_image.as_ref(),
            ha.redis_proxy_version.as_ref(),
            self.ctx.config.images.redis_ha_proxy.as_ref(),
            images::REDIS_HA_PROXY,
            images::REDIS_HA_PROXY_VERSION,
        )
    }

    pub fn get_resources(&self) -> ResourceRequirements {
        self.instance.spec.redis.resources.clone().unwrap_or_default()
    }

    pub fn get_ha_resources(&self) -> ResourceRequirements {
        self.instance.spec.ha.resources.clone().unwrap_or_default()
    }

    fn template_params(&self) -> HashMap<&'static str, String> {
        let (port, tls_port) = if self.tls_enabled {
            ("0".to_string(), ports::REDIS.to_string())
        } else {
            (ports::REDIS.to_string(), "0".to_string())
        };
        let (sentinel_port, sentinel_tls_port) = if self.tls_enabled {
            ("0".to_string(), ports::REDIS_SENTINEL.to_string())
        } else {
            (ports::REDIS_SENTINEL.to_string(), "0".to_string())
        };

        HashMap::from([
            ("UseTLS", self.tls_enabled.to_string()),
            ("ServiceName", self.ha_resource_name()),
            ("RedisPort", port),
            ("RedisTLSPort", tls_port),
            ("SentinelPort", sentinel_port),
            ("SentinelTLSPort", sentinel_tls_port),
            ("TLSPath", TLS_PATH.to_string()),
        ])
    }

    /// Render a template from the redis configuration directory.
    /// Failures are logged and yield an empty string.
    fn render(&self, template: &str) -> String {
        let path = Path::new(&self.ctx.config.redis_config_path).join(template);
        match load_template_file(&path, &self.template_params()) {
            Ok(rendered) => rendered,
            Err(e) => {
                error!("Failed to load redis template {}: {}", template, e);
                String::new()
            }
        }
    }

    pub fn get_conf(&self) -> String {
        self.render(REDIS_CONF_TPL)
    }

    pub fn get_init_script(&self) -> String {
        self.render(INIT_SH_TPL)
    }

    pub fn get_liveness_script(&self) -> String {
        self.render(LIVENESS_SH_TPL)
    }

    pub fn get_readiness_script(&self) -> String {
        self.render(READINESS_SH_TPL)
    }

    pub fn get_sentinel_conf(&self) -> String {
        self.render(SENTINEL_CONF_TPL)
    }

    pub fn get_sentinel_liveness_script(&self) -> String {
        self.render(SENTINEL_LIVENESS_SH_TPL)
    }

    pub fn get_haproxy_config(&self) -> String {
        self.render(HAPROXY_CFG_TPL)
    }

    pub fn get_haproxy_init_script(&self) -> String {
        self.render(HAPROXY_INIT_SH_TPL)
    }

    /// Roll the pods of a redis Deployment by updating the template label `key`
    pub async fn trigger_deployment_rollout(&self, name: &str, key: &str) -> Result<()> {
        workloads::trigger_deployment_rollout(&self.ctx.client, name, &self.namespace(), key).await
    }

    /// Delete a redis Deployment; a missing Deployment is not an error
    pub async fn delete_deployment(&self, name: &str) -> Result<()> {
        delete_if_exists::<Deployment>(&self.ctx.client, name, &self.namespace()).await?;
        Ok(())
    }
}
