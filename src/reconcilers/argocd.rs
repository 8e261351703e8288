// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ArgoCD controller - drives every component reconciler for an instance.

use crate::constants::{identifiers, requeue, ARGOCD_DELETION_FINALIZER};
use crate::error::{ArgoCDOperatorError, Result};
use crate::reconcilers::appcontroller::AppControllerReconciler;
use crate::reconcilers::common::Context;
use crate::reconcilers::notifications::NotificationsReconciler;
use crate::reconcilers::rbac::{
    delete_cluster_rbac, delete_managed_namespace_rbac, policy_rule_for_cluster_server, policy_rule_for_server,
    reconcile_cluster_role, reconcile_cluster_role_binding, reconcile_role, reconcile_role_binding,
    reconcile_service_account,
};
use crate::reconcilers::redis::RedisReconciler;
use crate::reconcilers::reposerver::RepoServerReconciler;
use crate::reconcilers::sso::{validate_sso_configuration, SSOConfigStatus, SSOReconciler};
use crate::reconcilers::tls::{reconcile_tls_checksums, TLSChecksums};
use crate::resource::{get_object_opt, NamespacedObject};
use crate::types::{ArgoCD, ArgoCDStatus};
use crate::util::name_with_suffix;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::{
    api::{Patch, PatchParams},
    runtime::{
        controller::Action,
        finalizer::{finalizer, Event},
        watcher, Controller,
    },
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const PHASE_AVAILABLE: &str = "Available";
const PHASE_PENDING: &str = "Pending";
const PHASE_FAILED: &str = "Failed";

const STATUS_RUNNING: &str = "Running";
const STATUS_PENDING: &str = "Pending";
const STATUS_UNKNOWN: &str = "Unknown";

pub struct ArgoCDController {
    ctx: Context,
}

impl ArgoCDController {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    fn api<K: NamespacedObject>(&self) -> Api<K> {
        let client: Client = self.ctx.client.clone();
        match self.ctx.config.watch_namespace.as_deref() {
            Some(namespace) => Api::namespaced(client, namespace),
            None => Api::all(client),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let instances: Api<ArgoCD> = self.api();
        let deployments: Api<Deployment> = self.api();
        let statefulsets: Api<StatefulSet> = self.api();
        let services: Api<Service> = self.api();
        let secrets: Api<Secret> = self.api();
        let configmaps: Api<ConfigMap> = self.api();
        let context = Arc::new(self.ctx);

        Controller::new(instances, watcher::Config::default())
            .owns(deployments, watcher::Config::default())
            .owns(statefulsets, watcher::Config::default())
            .owns(services, watcher::Config::default())
            .owns(secrets, watcher::Config::default())
            .owns(configmaps, watcher::Config::default())
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled ArgoCD: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(argocd: Arc<ArgoCD>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = argocd.instance_namespace();
    debug!(
        "Reconciling ArgoCD {}/{} (finalizer present: {})",
        namespace,
        argocd.name_any(),
        argocd.is_deletion_finalizer_present()
    );

    let api: Api<ArgoCD> = Api::namespaced(ctx.client.clone(), &namespace);
    finalizer(&api, ARGOCD_DELETION_FINALIZER, argocd, |event| async move {
        match event {
            Event::Apply(argocd) => apply(&argocd, &ctx).await,
            Event::Cleanup(argocd) => cleanup(&argocd, &ctx).await,
        }
    })
    .await
    .map_err(ArgoCDOperatorError::from)
}

async fn apply(argocd: &ArgoCD, ctx: &Context) -> Result<Action> {
    let validation = validate_sso_configuration(argocd, &ctx.config);
    let sso_status = SSOConfigStatus::from_validation(&validation);
    if let Err(e) = validation {
        error!("Invalid SSO configuration on {}: {}", argocd.name_any(), e);
        let mut status = argocd.status.clone().unwrap_or_default();
        status.sso = Some(sso_status.to_string());
        status.phase = Some(PHASE_FAILED.to_string());
        patch_status(ctx, argocd, &status).await?;
        return Err(e);
    }

    reconcile_server_rbac(ctx, argocd).await?;
    RedisReconciler::new(ctx, argocd).reconcile().await?;
    RepoServerReconciler::new(ctx, argocd).reconcile().await?;
    AppControllerReconciler::new(ctx, argocd).reconcile().await?;
    NotificationsReconciler::new(ctx, argocd).reconcile().await?;
    SSOReconciler::new(ctx, argocd).reconcile().await?;

    let checksums = reconcile_tls_checksums(ctx, argocd).await?;
    let status = build_status(ctx, argocd, sso_status, checksums).await?;
    if argocd.status.as_ref() != Some(&status) {
        patch_status(ctx, argocd, &status).await?;
    }

    info!("ArgoCD {}/{} reconciled", argocd.instance_namespace(), argocd.name_any());
    Ok(Action::requeue(Duration::from_secs(requeue::SUCCESS_SECS)))
}

/// Remove what owner references cannot clean up, plus the component objects
async fn cleanup(argocd: &ArgoCD, ctx: &Context) -> Result<Action> {
    info!("Cleaning up ArgoCD {}/{}", argocd.instance_namespace(), argocd.name_any());

    delete_cluster_rbac(ctx, argocd, identifiers::APPLICATION_CONTROLLER).await?;
    delete_cluster_rbac(ctx, argocd, identifiers::SERVER).await?;
    delete_managed_namespace_rbac(ctx, argocd).await?;

    NotificationsReconciler::new(ctx, argocd).delete_resources().await?;
    SSOReconciler::new(ctx, argocd).delete_resources().await?;
    RepoServerReconciler::new(ctx, argocd).delete_resources().await?;
    RedisReconciler::new(ctx, argocd).delete_resources().await?;

    Ok(Action::await_change())
}

fn error_policy(_argocd: Arc<ArgoCD>, error: &ArgoCDOperatorError, _ctx: Arc<Context>) -> Action {
    error!("Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(requeue::ERROR_SECS))
}

/// The server workload is not deployed, but its permissions are
async fn reconcile_server_rbac(ctx: &Context, argocd: &ArgoCD) -> Result<()> {
    let service_account = reconcile_service_account(
        ctx,
        argocd,
        &name_with_suffix(argocd, identifiers::SERVER),
        "server",
    )
    .await?;
    reconcile_role(ctx, argocd, identifiers::SERVER, policy_rule_for_server()).await?;
    reconcile_role_binding(ctx, argocd, identifiers::SERVER).await?;
    let cluster_role = reconcile_cluster_role(ctx, argocd, identifiers::SERVER, policy_rule_for_cluster_server()).await?;
    reconcile_cluster_role_binding(
        ctx,
        argocd,
        identifiers::SERVER,
        cluster_role.as_ref(),
        &service_account,
    )
    .await
}

fn workload_status(desired: Option<i32>, ready: Option<i32>) -> String {
    if ready.unwrap_or(0) >= desired.unwrap_or(1) {
        STATUS_RUNNING.to_string()
    } else {
        STATUS_PENDING.to_string()
    }
}

async fn deployment_status(client: &Client, name: &str, namespace: &str) -> Result<String> {
    Ok(match get_object_opt::<Deployment>(client, name, namespace).await? {
        Some(deployment) => workload_status(
            deployment.spec.and_then(|s| s.replicas),
            deployment.status.and_then(|s| s.ready_replicas),
        ),
        None => STATUS_UNKNOWN.to_string(),
    })
}

async fn statefulset_status(client: &Client, name: &str, namespace: &str) -> Result<String> {
    Ok(match get_object_opt::<StatefulSet>(client, name, namespace).await? {
        Some(statefulset) => workload_status(
            statefulset.spec.and_then(|s| s.replicas),
            statefulset.status.and_then(|s| s.ready_replicas),
        ),
        None => STATUS_UNKNOWN.to_string(),
    })
}

async fn build_status(
    ctx: &Context,
    argocd: &ArgoCD,
    sso: SSOConfigStatus,
    checksums: TLSChecksums,
) -> Result<ArgoCDStatus> {
    let client = &ctx.client;
    let namespace = argocd.instance_namespace();

    let redis = RedisReconciler::new(ctx, argocd);
    let remote_redis = argocd.spec.redis.remote.as_deref().is_some_and(|r| !r.is_empty());
    let redis_status = if remote_redis {
        STATUS_UNKNOWN.to_string()
    } else if argocd.spec.ha.enabled {
        deployment_status(client, &redis.ha_proxy_resource_name(), &namespace).await?
    } else {
        deployment_status(client, &redis.resource_name(), &namespace).await?
    };

    let repo = deployment_status(
        client,
        &RepoServerReconciler::new(ctx, argocd).resource_name(),
        &namespace,
    )
    .await?;
    let application_controller = statefulset_status(
        client,
        &AppControllerReconciler::new(ctx, argocd).resource_name(),
        &namespace,
    )
    .await?;
    let notifications_controller = if argocd.spec.notifications.enabled {
        Some(
            deployment_status(
                client,
                &NotificationsReconciler::new(ctx, argocd).resource_name(),
                &namespace,
            )
            .await?,
        )
    } else {
        None
    };

    let available = application_controller == STATUS_RUNNING
        && repo == STATUS_RUNNING
        && (remote_redis || redis_status == STATUS_RUNNING);

    Ok(ArgoCDStatus {
        phase: Some(if available { PHASE_AVAILABLE } else { PHASE_PENDING }.to_string()),
        application_controller: Some(application_controller),
        redis: Some(redis_status),
        repo: Some(repo),
        notifications_controller,
        sso: Some(sso.to_string()),
        repo_tls_checksum: checksums.repo,
        redis_tls_checksum: checksums.redis,
    })
}

async fn patch_status(ctx: &Context, argocd: &ArgoCD, status: &ArgoCDStatus) -> Result<()> {
    let api: Api<ArgoCD> = Api::namespaced(ctx.client.clone(), &argocd.instance_namespace());
    let patch = serde_json::json!({ "status": status });
    api.patch_status(&argocd.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    debug!("Status of {} updated: {:?}", argocd.name_any(), status.phase);
    Ok(())
}
