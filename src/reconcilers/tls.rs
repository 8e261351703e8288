// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rolls workloads whose mounted TLS certificates changed.
//!
//! Checksums of the repo server and redis TLS secrets are kept in the
//! instance status. When a checksum differs from the recorded one the pods
//! mounting that secret are restarted by updating a template label.

use crate::constants::{labels, names};
use crate::error::Result;
use crate::reconcilers::appcontroller::AppControllerReconciler;
use crate::reconcilers::common::Context;
use crate::reconcilers::redis::RedisReconciler;
use crate::reconcilers::reposerver::RepoServerReconciler;
use crate::resource::get_object_opt;
use crate::types::ArgoCD;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Checksums to record in the instance status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TLSChecksums {
    pub repo: Option<String>,
    pub redis: Option<String>,
}

/// SHA-256 over the secret data, keys in sorted order
pub fn secret_checksum(secret: &Secret) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in secret.data.iter().flatten() {
        hasher.update(key.as_bytes());
        hasher.update(&value.0);
    }
    format!("{:x}", hasher.finalize())
}

fn changed(previous: Option<&String>, current: Option<&String>) -> bool {
    matches!((previous, current), (Some(previous), Some(current)) if previous != current)
}

/// Rollouts of workloads that do not exist yet are skipped
fn ignore_missing(result: Result<()>, workload: &str) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!("{} not found, no rollout needed", workload);
            Ok(())
        }
        other => other,
    }
}

/// Compare the TLS secrets against the recorded checksums and roll the
/// dependent workloads of any secret that changed.
#[instrument(skip(ctx, instance), fields(instance = %instance.name_any()))]
pub async fn reconcile_tls_checksums(ctx: &Context, instance: &ArgoCD) -> Result<TLSChecksums> {
    let namespace = instance.instance_namespace();
    let status = instance.status.clone().unwrap_or_default();
    let repo_server = RepoServerReconciler::new(ctx, instance);
    let app_controller = AppControllerReconciler::new(ctx, instance);
    let redis = RedisReconciler::new(ctx, instance);

    let repo = get_object_opt::<Secret>(&ctx.client, names::REPO_SERVER_TLS_SECRET, &namespace)
        .await?
        .filter(|s| s.type_.as_deref() == Some(TLS_SECRET_TYPE))
        .map(|s| secret_checksum(&s));

    let redis_checksum = if redis.use_tls().await {
        get_object_opt::<Secret>(&ctx.client, names::REDIS_TLS_SECRET, &namespace)
            .await?
            .map(|s| secret_checksum(&s))
    } else {
        None
    };

    let key = labels::TLS_CERT_CHANGED;

    if changed(status.repo_tls_checksum.as_ref(), repo.as_ref()) {
        info!("Repo server TLS certificate changed, rolling dependent workloads");
        ignore_missing(repo_server.trigger_rollout(key).await, "repo server")?;
        ignore_missing(app_controller.trigger_rollout(key).await, "application controller")?;
    }

    if changed(status.redis_tls_checksum.as_ref(), redis_checksum.as_ref()) {
        info!("Redis TLS certificate changed, rolling dependent workloads");
        let redis_deployment = if instance.spec.ha.enabled {
            redis.ha_proxy_resource_name()
        } else {
            redis.resource_name()
        };
        ignore_missing(redis.trigger_deployment_rollout(&redis_deployment, key).await, "redis")?;
        ignore_missing(repo_server.trigger_rollout(key).await, "repo server")?;
        ignore_missing(app_controller.trigger_rollout(key).await, "application controller")?;
    }

    if repo.is_none() && status.repo_tls_checksum.is_some() {
        warn!("Repo server TLS secret removed from {}", namespace);
    }

    Ok(TLSChecksums {
        repo,
        redis: redis_checksum,
    })
}
