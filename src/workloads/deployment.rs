// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::Result;
use crate::resource::{get_object, update_object};
use chrono::Utc;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::Client;
use tracing::{info, instrument};

/// Label values may not contain colons, so the timestamp uses dashes
fn rollout_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string()
}

fn stamp_template(template: &mut PodTemplateSpec, key: &str) {
    template
        .metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(Default::default)
        .insert(key.to_string(), rollout_timestamp());
}

/// Start a new rollout of a Deployment by updating the pod template label `key`.
/// A missing Deployment is reported as `NotFound`.
#[instrument(skip(client))]
pub async fn trigger_deployment_rollout(client: &Client, name: &str, namespace: &str, key: &str) -> Result<()> {
    let mut deployment: Deployment = get_object(client, name, namespace).await?;
    if let Some(spec) = deployment.spec.as_mut() {
        stamp_template(&mut spec.template, key);
    }
    update_object(client, &deployment).await?;
    info!("Triggered rollout of deployment {}/{}", namespace, name);
    Ok(())
}

/// Start a new rollout of a StatefulSet by updating the pod template label `key`.
/// A missing StatefulSet is reported as `NotFound`.
#[instrument(skip(client))]
pub async fn trigger_statefulset_rollout(client: &Client, name: &str, namespace: &str, key: &str) -> Result<()> {
    let mut statefulset: StatefulSet = get_object(client, name, namespace).await?;
    if let Some(spec) = statefulset.spec.as_mut() {
        stamp_template(&mut spec.template, key);
    }
    update_object(client, &statefulset).await?;
    info!("Triggered rollout of statefulset {}/{}", namespace, name);
    Ok(())
}
