// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Notifications controller, deployed only when enabled on the instance.

use crate::constants::{identifiers, images, labels, names, ports};
use crate::error::Result;
use crate::kubernetes::is_namespace_terminating;
use crate::reconcilers::common::{
    delete_if_exists, reconcile_object, set_controller_reference, sync_deployment, sync_metadata_only, Context,
};
use crate::reconcilers::rbac::{
    delete_managed_namespace_rbac_for, delete_namespaced_rbac, policy_rule_for_notifications_controller,
    reconcile_role, reconcile_role_binding, reconcile_service_account,
};
use crate::reconcilers::reposerver::RepoServerReconciler;
use crate::resource::{create_object, get_object_opt};
use crate::types::ArgoCD;
use crate::util::{
    container_image, generate_unique_resource_name, name_with_suffix, non_empty, object_meta, proxy_env_vars,
    restricted_security_context,
};
use crate::workloads::Request;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ContainerPort, PodSpec, PodTemplateSpec, Secret, SecretVolumeSource, ServiceAccount,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

const COMPONENT: &str = "notifications-controller";

const DEFAULT_TRIGGER: &str = "- description: Application syncing has succeeded
  send:
  - app-sync-succeeded
  when: app.status.operationState.phase in ['Succeeded']
";

const DEFAULT_TEMPLATE: &str = "message: |
  Application {{.app.metadata.name}} has been successfully synced at {{.app.status.operationState.finishedAt}}.
  Sync operation details are available at: {{.context.argocdUrl}}/applications/{{.app.metadata.name}}?operation=true .
";

/// Reconciles the notifications controller objects of one ArgoCD instance
pub struct NotificationsReconciler<'a> {
    ctx: &'a Context,
    instance: &'a ArgoCD,
}

impl<'a> NotificationsReconciler<'a> {
    pub fn new(ctx: &'a Context, instance: &'a ArgoCD) -> Self {
        Self { ctx, instance }
    }

    /// `<instance>-notifications-controller`
    pub fn resource_name(&self) -> String {
        name_with_suffix(self.instance, COMPONENT)
    }

    /// `<instance>-argocd-notifications-controller`, bound by the controller's role
    pub fn service_account_name(&self) -> String {
        name_with_suffix(self.instance, identifiers::NOTIFICATIONS_CONTROLLER)
    }

    /// `<instance>-<namespace>-argocd-notifications-controller`, handed to the controller with `--secret-name`
    pub fn secret_name(&self) -> String {
        generate_unique_resource_name(self.instance, identifiers::NOTIFICATIONS_CONTROLLER)
    }

    fn namespace(&self) -> String {
        self.instance.instance_namespace()
    }

    fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(labels::NAME.to_string(), self.resource_name())])
    }

    /// Deploy the controller when enabled, otherwise remove it
    #[instrument(skip(self), fields(instance = %self.instance.name_any()))]
    pub async fn reconcile(&self) -> Result<()> {
        if !self.instance.spec.notifications.enabled {
            debug!("Notifications disabled");
            return self.delete_resources().await;
        }

        reconcile_service_account(self.ctx, self.instance, &self.service_account_name(), COMPONENT).await?;
        reconcile_role(
            self.ctx,
            self.instance,
            identifiers::NOTIFICATIONS_CONTROLLER,
            policy_rule_for_notifications_controller(&self.secret_name()),
        )
        .await?;
        reconcile_role_binding(self.ctx, self.instance, identifiers::NOTIFICATIONS_CONTROLLER).await?;
        self.reconcile_configmap().await?;
        self.reconcile_secret().await?;

        let desired = self.desired_deployment()?;
        reconcile_object(self.ctx, self.instance, desired, sync_deployment).await?;
        Ok(())
    }

    /// The configmap is seeded with defaults; user edits to its data are kept
    async fn reconcile_configmap(&self) -> Result<()> {
        let desired = Request::new(
            ConfigMap {
                metadata: object_meta(
                    names::NOTIFICATIONS_CONFIGMAP,
                    &self.namespace(),
                    self.instance,
                    COMPONENT,
                ),
                data: Some(BTreeMap::from([
                    ("trigger.on-sync-succeeded".to_string(), DEFAULT_TRIGGER.to_string()),
                    ("template.app-sync-succeeded".to_string(), DEFAULT_TEMPLATE.to_string()),
                ])),
                ..Default::default()
            },
            self.instance,
        )
        .request()?;

        reconcile_object(self.ctx, self.instance, desired, sync_metadata_only).await?;
        Ok(())
    }

    /// The secret holds user supplied tokens: it is created once and never updated
    pub async fn reconcile_secret(&self) -> Result<()> {
        let namespace = self.namespace();
        let secret_name = self.secret_name();
        let mut desired = Request::new(
            Secret {
                metadata: object_meta(&secret_name, &namespace, self.instance, COMPONENT),
                type_: Some("Opaque".to_string()),
                ..Default::default()
            },
            self.instance,
        )
        .request()?;

        if is_namespace_terminating(&self.ctx.client, &namespace).await? {
            delete_if_exists::<Secret>(&self.ctx.client, &secret_name, &namespace).await?;
            return Ok(());
        }

        if get_object_opt::<Secret>(&self.ctx.client, &secret_name, &namespace)
            .await?
            .is_some()
        {
            return Ok(());
        }

        set_controller_reference(self.instance, &mut desired);
        create_object(&self.ctx.client, &desired).await?;
        info!("Secret {}/{} created", namespace, secret_name);
        Ok(())
    }

    pub fn get_container_image(&self) -> String {
        let notifications = &self.instance.spec.notifications;
        let spec = &self.instance.spec;
        container_image(
            notifications.image.as_ref().or(spec.image.as_ref()),
            notifications.version.as_ref().or(spec.version.as_ref()),
            self.ctx.config.images.notifications.as_ref(),
            images::ARGOCD,
            images::ARGOCD_VERSION,
        )
    }

    pub(crate) fn desired_deployment(&self) -> Result<Deployment> {
        let name = self.resource_name();
        let notifications = &self.instance.spec.notifications;
        let repo_server = RepoServerReconciler::new(self.ctx, self.instance);
        let mut command = vec![
            "argocd-notifications".to_string(),
            "--loglevel".to_string(),
            non_empty(notifications.log_level.as_ref())
                .unwrap_or("info")
                .to_string(),
            "--argocd-repo-server".to_string(),
            repo_server.get_server_address(),
            "--secret-name".to_string(),
            self.secret_name(),
        ];
        if self.instance.spec.repo.verify_tls {
            command.push("--argocd-repo-server-strict-tls".to_string());
        }

        let container = Container {
            name: "argocd-notifications-controller".to_string(),
            image: Some(self.get_container_image()),
            image_pull_policy: Some("Always".to_string()),
            command: Some(command),
            ports: Some(vec![ContainerPort {
                name: Some("metrics".to_string()),
                container_port: ports::NOTIFICATIONS_METRICS,
                ..Default::default()
            }]),
            resources: Some(notifications.resources.clone().unwrap_or_default()),
            env: Some(proxy_env_vars(&self.ctx.config)),
            security_context: Some(restricted_security_context(None)),
            working_dir: Some("/app".to_string()),
            volume_mounts: Some(vec![VolumeMount {
                name: "argocd-repo-server-tls".to_string(),
                mount_path: "/app/config/reposerver/tls".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        };

        Request::new(
            Deployment {
                metadata: object_meta(&name, &self.namespace(), self.instance, COMPONENT),
                spec: Some(DeploymentSpec {
                    replicas: notifications.replicas,
                    selector: LabelSelector {
                        match_labels: Some(self.labels()),
                        ..Default::default()
                    },
                    template: PodTemplateSpec {
                        metadata: Some(ObjectMeta {
                            labels: Some(self.labels()),
                            ..Default::default()
                        }),
                        spec: Some(PodSpec {
                            service_account_name: Some(self.service_account_name()),
                            node_selector: Some(self.instance.node_selector()),
                            containers: vec![container],
                            volumes: Some(vec![Volume {
                                name: "argocd-repo-server-tls".to_string(),
                                secret: Some(SecretVolumeSource {
                                    secret_name: Some(names::REPO_SERVER_TLS_SECRET.to_string()),
                                    optional: Some(true),
                                    ..Default::default()
                                }),
                                ..Default::default()
                            }]),
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

    /// Remove every notifications object of the instance
    pub async fn delete_resources(&self) -> Result<()> {
        let namespace = self.namespace();
        let secret_name = self.secret_name();
        let client = &self.ctx.client;
        delete_if_exists::<Deployment>(client, &self.resource_name(), &namespace).await?;
        delete_if_exists::<Secret>(client, &secret_name, &namespace).await?;
        delete_if_exists::<ConfigMap>(client, names::NOTIFICATIONS_CONFIGMAP, &namespace).await?;
        delete_namespaced_rbac(self.ctx, self.instance, identifiers::NOTIFICATIONS_CONTROLLER).await?;
        delete_managed_namespace_rbac_for(self.ctx, self.instance, identifiers::NOTIFICATIONS_CONTROLLER).await?;
        delete_if_exists::<ServiceAccount>(client, &self.service_account_name(), &namespace).await?;
        Ok(())
    }
}
