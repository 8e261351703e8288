// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Naming, labelling and image helpers shared by all reconcilers.

use crate::config::Config;
use crate::constants::{annotations, labels};
use crate::error::{ArgoCDOperatorError, Result};
use crate::types::ArgoCD;
use k8s_openapi::api::core::v1::{Capabilities, EnvVar, SecurityContext};
use kube::{api::ObjectMeta, ResourceExt};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Name of a per-instance object: `<instance>-<suffix>`
pub fn name_with_suffix(instance: &ArgoCD, suffix: &str) -> String {
    format!("{}-{}", instance.name_any(), suffix)
}

/// Name of a cluster scoped object, unique across instances: `<instance>-<namespace>-<component>`
pub fn generate_unique_resource_name(instance: &ArgoCD, component: &str) -> String {
    format!(
        "{}-{}-{}",
        instance.name_any(),
        instance.instance_namespace(),
        component
    )
}

/// Standard labels for an object belonging to an instance component
pub fn common_labels(name: &str, instance: &ArgoCD, component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::NAME.to_string(), name.to_string()),
        (labels::PART_OF.to_string(), labels::PART_OF_VALUE.to_string()),
        (labels::COMPONENT.to_string(), component.to_string()),
        (labels::MANAGED_BY.to_string(), instance.name_any()),
    ])
}

/// Annotations tracking the owning instance
pub fn tracking_annotations(instance: &ArgoCD) -> BTreeMap<String, String> {
    BTreeMap::from([
        (annotations::INSTANCE_NAME.to_string(), instance.name_any()),
        (
            annotations::INSTANCE_NAMESPACE.to_string(),
            instance.instance_namespace(),
        ),
    ])
}

/// Object metadata for a namespaced object belonging to an instance component
pub fn object_meta(name: &str, namespace: &str, instance: &ArgoCD, component: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(common_labels(name, instance, component)),
        annotations: Some(tracking_annotations(instance)),
        ..Default::default()
    }
}

/// Object metadata for a cluster scoped object belonging to an instance component
pub fn cluster_object_meta(name: &str, instance: &ArgoCD, component: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(common_labels(name, instance, component)),
        annotations: Some(tracking_annotations(instance)),
        ..Default::default()
    }
}

/// In-cluster address of a service port
pub fn fqdn_service_ref(service: &str, namespace: &str, port: i32) -> String {
    format!("{}.{}.svc.cluster.local:{}", service, namespace, port)
}

/// Treat empty strings the same as unset values
pub fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
}

/// Join an image and a tag, using `@` for digests
pub fn combine_image_tag(image: &str, tag: &str) -> String {
    if tag.contains(':') {
        format!("{}@{}", image, tag)
    } else if !tag.is_empty() {
        format!("{}:{}", image, tag)
    } else {
        image.to_string()
    }
}

/// Resolve a container image from the CR, an environment override and the defaults.
/// The override only applies when the CR sets neither image nor version.
pub fn container_image(
    image: Option<&String>,
    version: Option<&String>,
    env_override: Option<&String>,
    default_image: &str,
    default_version: &str,
) -> String {
    let image = non_empty(image);
    let version = non_empty(version);

    if let (None, None, Some(override_image)) = (image, version, non_empty(env_override)) {
        return override_image.to_string();
    }

    combine_image_tag(
        image.unwrap_or(default_image),
        version.unwrap_or(default_version),
    )
}

/// Proxy environment variables forwarded to managed containers
pub fn proxy_env_vars(config: &Config) -> Vec<EnvVar> {
    config
        .proxy_env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect()
}

/// Plain `name=value` environment variable
pub fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

/// Restricted container security context: no privilege escalation, all capabilities dropped
pub fn restricted_security_context(run_as_user: Option<i64>) -> SecurityContext {
    SecurityContext {
        allow_privilege_escalation: Some(false),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        }),
        run_as_non_root: Some(true),
        run_as_user,
        ..Default::default()
    }
}

/// Load a template file and substitute `{{ .Key }}` placeholders
pub fn load_template_file(path: &Path, params: &HashMap<&str, String>) -> Result<String> {
    let template = fs::read_to_string(path).map_err(|e| ArgoCDOperatorError::TemplateError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(render_template(&template, params))
}

fn render_template(template: &str, params: &HashMap<&str, String>) -> String {
    params.iter().fold(template.to_string(), |rendered, (key, value)| {
        rendered
            .replace(&format!("{{{{ .{} }}}}", key), value)
            .replace(&format!("{{{{.{}}}}}", key), value)
    })
}
