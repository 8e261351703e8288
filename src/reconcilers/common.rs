// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired-state reconciliation shared by every component reconciler.

use crate::config::Config;
use crate::error::{ArgoCDOperatorError, Result};
use crate::kubernetes::{is_namespace_terminating, ClusterCapabilities};
use crate::resource::{create_object, delete_object, get_object_opt, update_object, NamespacedObject};
use crate::types::ArgoCD;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Container, EnvVar, PodTemplateSpec, ResourceRequirements, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{api::ObjectMeta, Client, Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};

/// Shared state handed to every reconcile
pub struct Context {
    pub client: Client,
    pub config: Config,
    pub capabilities: ClusterCapabilities,
}

impl Context {
    pub fn new(client: Client, config: Config, capabilities: ClusterCapabilities) -> Self {
        Self {
            client,
            config,
            capabilities,
        }
    }
}

/// What `reconcile_object` did to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Unchanged,
    Deleted,
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Make the instance the controlling owner of an object in its own namespace.
/// Owner references cannot cross namespaces, so objects elsewhere are left alone.
pub fn set_controller_reference<K: Resource>(instance: &ArgoCD, obj: &mut K) {
    if obj.meta().namespace.as_deref() != instance.namespace().as_deref() {
        return;
    }
    let Some(owner) = instance.controller_owner_ref(&()) else {
        return;
    };
    let owners = obj.meta_mut().owner_references.get_or_insert_with(Vec::new);
    if !owners.iter().any(|o| o.uid == owner.uid) {
        owners.push(owner);
    }
}

/// Bring a namespaced object in line with its desired state.
///
/// The object is deleted when its namespace is terminating, created when
/// absent and updated when `sync` reports that managed fields drifted.
#[instrument(skip(ctx, instance, desired, sync), fields(kind = %K::kind(&()), name = %desired.name_any()))]
pub async fn reconcile_object<K, F>(
    ctx: &Context,
    instance: &ArgoCD,
    mut desired: K,
    sync: F,
) -> Result<ReconcileOutcome>
where
    K: NamespacedObject,
    F: FnOnce(&mut K, &K) -> bool,
{
    let name = desired.name_any();
    let namespace = desired
        .namespace()
        .ok_or(ArgoCDOperatorError::MissingObjectKey(".metadata.namespace"))?;

    if is_namespace_terminating(&ctx.client, &namespace).await? {
        delete_if_exists::<K>(&ctx.client, &name, &namespace).await?;
        return Ok(ReconcileOutcome::Deleted);
    }

    let Some(mut existing) = get_object_opt::<K>(&ctx.client, &name, &namespace).await? else {
        set_controller_reference(instance, &mut desired);
        create_object(&ctx.client, &desired).await?;
        info!("{} {}/{} created", K::kind(&()), namespace, name);
        return Ok(ReconcileOutcome::Created);
    };

    if !sync(&mut existing, &desired) {
        debug!("{} {}/{} is up to date", K::kind(&()), namespace, name);
        return Ok(ReconcileOutcome::Unchanged);
    }

    update_object(&ctx.client, &existing).await?;
    info!("{} {}/{} updated", K::kind(&()), namespace, name);
    Ok(ReconcileOutcome::Updated)
}

/// Delete an object, treating a missing object as already deleted.
/// Returns whether something was deleted.
pub async fn delete_if_exists<K: NamespacedObject>(client: &Client, name: &str, namespace: &str) -> Result<bool> {
    match delete_object::<K>(client, name, namespace).await {
        Ok(()) => {
            info!("{} {}/{} deleted", K::kind(&()), namespace, name);
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Overwrite `existing` with `desired` when they differ
pub fn sync_field<T: PartialEq + Clone>(existing: &mut T, desired: &T) -> bool {
    if existing == desired {
        return false;
    }
    *existing = desired.clone();
    true
}

fn merge_map(existing: &mut Option<BTreeMap<String, String>>, desired: &Option<BTreeMap<String, String>>) -> bool {
    let Some(desired) = desired else {
        return false;
    };
    let existing = existing.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in desired {
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Merge the desired labels and annotations, keeping keys added by others
pub fn sync_metadata(existing: &mut ObjectMeta, desired: &ObjectMeta) -> bool {
    let labels = merge_map(&mut existing.labels, &desired.labels);
    let annotations = merge_map(&mut existing.annotations, &desired.annotations);
    labels || annotations
}

/// Sync a list the API server omits when empty, so `None` and `[]` compare equal
pub fn sync_list<T: PartialEq + Clone>(existing: &mut Option<Vec<T>>, desired: &Option<Vec<T>>) -> bool {
    let current: &[T] = existing.as_deref().unwrap_or_default();
    let wanted: &[T] = desired.as_deref().unwrap_or_default();
    if current == wanted {
        return false;
    }
    *existing = desired.clone();
    true
}

/// Sync a map the API server omits when empty
pub fn sync_map(existing: &mut Option<BTreeMap<String, String>>, desired: &Option<BTreeMap<String, String>>) -> bool {
    let empty = BTreeMap::new();
    if existing.as_ref().unwrap_or(&empty) == desired.as_ref().unwrap_or(&empty) {
        return false;
    }
    *existing = desired.clone();
    true
}

/// Sync an optional value only when a desired value is set, leaving server defaults alone
pub fn sync_if_set<T: PartialEq + Clone>(existing: &mut Option<T>, desired: &Option<T>) -> bool {
    if desired.is_none() {
        return false;
    }
    sync_field(existing, desired)
}

fn is_empty_resources(resources: &ResourceRequirements) -> bool {
    resources.limits.as_ref().map_or(true, |m| m.is_empty())
        && resources.requests.as_ref().map_or(true, |m| m.is_empty())
        && resources.claims.as_ref().map_or(true, |c| c.is_empty())
}

fn sync_resources(existing: &mut Option<ResourceRequirements>, desired: &Option<ResourceRequirements>) -> bool {
    let normalized = |r: &Option<ResourceRequirements>| r.clone().filter(|r| !is_empty_resources(r));
    if normalized(existing) == normalized(desired) {
        return false;
    }
    *existing = desired.clone();
    true
}

/// Environment as stored by the API server: empty values are dropped
fn normalized_env(env: &Option<Vec<EnvVar>>) -> Vec<EnvVar> {
    env.iter()
        .flatten()
        .map(|var| EnvVar {
            value: var.value.clone().filter(|v| !v.is_empty()),
            ..var.clone()
        })
        .collect()
}

fn sync_env(existing: &mut Option<Vec<EnvVar>>, desired: &Option<Vec<EnvVar>>) -> bool {
    if normalized_env(existing) == normalized_env(desired) {
        return false;
    }
    *existing = desired.clone();
    true
}

fn sync_container(existing: &mut Container, desired: &Container) -> bool {
    let mut changed = false;
    changed |= sync_field(&mut existing.image, &desired.image);
    changed |= sync_list(&mut existing.command, &desired.command);
    changed |= sync_list(&mut existing.args, &desired.args);
    changed |= sync_env(&mut existing.env, &desired.env);
    changed |= sync_resources(&mut existing.resources, &desired.resources);
    changed |= sync_list(&mut existing.volume_mounts, &desired.volume_mounts);
    changed
}

fn sync_containers(existing: &mut Vec<Container>, desired: &[Container]) -> bool {
    let same_shape = existing.len() == desired.len()
        && existing.iter().zip(desired).all(|(e, d)| e.name == d.name);
    if !same_shape {
        *existing = desired.to_vec();
        return true;
    }
    existing
        .iter_mut()
        .zip(desired)
        .fold(false, |changed, (e, d)| sync_container(e, d) | changed)
}

fn sync_init_containers(existing: &mut Option<Vec<Container>>, desired: &Option<Vec<Container>>) -> bool {
    let wanted: &[Container] = desired.as_deref().unwrap_or_default();
    if wanted.is_empty() {
        return sync_list(existing, desired);
    }
    sync_containers(existing.get_or_insert_with(Vec::new), wanted)
}

/// Sync the managed parts of a pod template. Labels are merged so rollout
/// markers stamped on the template survive.
pub fn sync_pod_template(existing: &mut PodTemplateSpec, desired: &PodTemplateSpec) -> bool {
    let mut changed = false;
    if let Some(desired_meta) = desired.metadata.as_ref() {
        let existing_meta = existing.metadata.get_or_insert_with(Default::default);
        changed |= merge_map(&mut existing_meta.labels, &desired_meta.labels);
    }

    let Some(desired_spec) = desired.spec.as_ref() else {
        return changed;
    };
    let Some(existing_spec) = existing.spec.as_mut() else {
        existing.spec = Some(desired_spec.clone());
        return true;
    };

    changed |= sync_containers(&mut existing_spec.containers, &desired_spec.containers);
    changed |= sync_init_containers(&mut existing_spec.init_containers, &desired_spec.init_containers);
    changed |= sync_map(&mut existing_spec.node_selector, &desired_spec.node_selector);
    changed |= sync_if_set(
        &mut existing_spec.service_account_name,
        &desired_spec.service_account_name,
    );
    changed |= sync_if_set(
        &mut existing_spec.automount_service_account_token,
        &desired_spec.automount_service_account_token,
    );
    changed
}

/// Replicas left unset are defaulted by the API server and not managed
pub fn sync_deployment(existing: &mut Deployment, desired: &Deployment) -> bool {
    let mut changed = sync_metadata(&mut existing.metadata, &desired.metadata);
    let Some(desired_spec) = desired.spec.as_ref() else {
        return changed;
    };
    let existing_spec = existing.spec.get_or_insert_with(Default::default);
    changed |= sync_if_set(&mut existing_spec.replicas, &desired_spec.replicas);
    changed |= sync_pod_template(&mut existing_spec.template, &desired_spec.template);
    changed
}

pub fn sync_statefulset(existing: &mut StatefulSet, desired: &StatefulSet) -> bool {
    let mut changed = sync_metadata(&mut existing.metadata, &desired.metadata);
    let Some(desired_spec) = desired.spec.as_ref() else {
        return changed;
    };
    let existing_spec = existing.spec.get_or_insert_with(Default::default);
    changed |= sync_if_set(&mut existing_spec.replicas, &desired_spec.replicas);
    changed |= sync_pod_template(&mut existing_spec.template, &desired_spec.template);
    changed
}

/// Services keep their cluster assigned fields; only selector, type and ports are managed
pub fn sync_service(existing: &mut Service, desired: &Service) -> bool {
    let mut changed = sync_metadata(&mut existing.metadata, &desired.metadata);
    let Some(desired_spec) = desired.spec.as_ref() else {
        return changed;
    };
    let existing_spec = existing.spec.get_or_insert_with(Default::default);
    changed |= sync_map(&mut existing_spec.selector, &desired_spec.selector);
    changed |= sync_if_set(&mut existing_spec.type_, &desired_spec.type_);

    let port_key = |spec: &k8s_openapi::api::core::v1::ServiceSpec| -> Vec<(Option<String>, i32)> {
        spec.ports
            .iter()
            .flatten()
            .map(|p| (p.name.clone(), p.port))
            .collect()
    };
    if port_key(existing_spec) != port_key(desired_spec) {
        existing_spec.ports = desired_spec.ports.clone();
        changed = true;
    }
    changed
}

pub fn sync_configmap(existing: &mut ConfigMap, desired: &ConfigMap) -> bool {
    let metadata = sync_metadata(&mut existing.metadata, &desired.metadata);
    let data = sync_map(&mut existing.data, &desired.data);
    metadata || data
}

pub fn sync_ingress(existing: &mut Ingress, desired: &Ingress) -> bool {
    let mut changed = sync_metadata(&mut existing.metadata, &desired.metadata);
    let Some(desired_spec) = desired.spec.as_ref() else {
        return changed;
    };
    let existing_spec = existing.spec.get_or_insert_with(Default::default);
    changed |= sync_field(&mut existing_spec.tls, &desired_spec.tls);
    changed |= sync_field(&mut existing_spec.rules, &desired_spec.rules);
    changed
}

/// Objects whose only managed state is their metadata
pub fn sync_metadata_only<K: Resource>(existing: &mut K, desired: &K) -> bool {
    sync_metadata(existing.meta_mut(), desired.meta())
}
