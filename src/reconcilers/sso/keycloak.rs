// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::SSOReconciler;
use crate::constants::{images, ports};
use crate::error::Result;
use crate::reconcilers::common::{
    delete_if_exists, reconcile_object, sync_deployment, sync_field, sync_ingress, sync_metadata,
    sync_metadata_only, sync_service,
};
use crate::types::route::{RoutePort, RouteSpec, RouteTLSConfig, RouteTargetReference};
use crate::types::template::{Template, TemplateInstanceSpec, TemplateParameter};
use crate::types::{Route, TemplateInstance};
use crate::util::{container_image, env_var};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, HTTPGetAction, PodSpec, PodTemplateSpec, Probe, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressServiceBackend, IngressSpec,
    IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use tracing::debug;

const KEYCLOAK: &str = "keycloak";
const TEMPLATE_INSTANCE_NAME: &str = "rhsso";
const INGRESS_HOST: &str = "keycloak-ingress";
const ADMIN_USER: &str = "admin";
const ADMIN_PASSWORD: &str = "admin";

fn keycloak_labels() -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), KEYCLOAK.to_string())])
}

impl SSOReconciler<'_> {
    fn keycloak_meta(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace()),
            labels: Some(keycloak_labels()),
            ..Default::default()
        }
    }

    /// Provision Keycloak through an OpenShift template when the cluster
    /// supports it, otherwise through plain Kubernetes objects.
    pub(super) async fn reconcile_keycloak(&self) -> Result<()> {
        if self.ctx.capabilities.template_api {
            debug!("Template API found, provisioning keycloak through a template");
            let instance = self.desired_template_instance();
            reconcile_object(self.ctx, self.instance, instance, sync_metadata_only).await?;
            return Ok(());
        }

        reconcile_object(self.ctx, self.instance, self.desired_keycloak_deployment(), sync_deployment).await?;
        reconcile_object(self.ctx, self.instance, self.desired_keycloak_service(), sync_service).await?;
        reconcile_object(self.ctx, self.instance, self.desired_keycloak_ingress(), sync_ingress).await?;
        if self.ctx.capabilities.route_api {
            reconcile_object(self.ctx, self.instance, self.desired_keycloak_route(), |existing: &mut Route, desired| {
                let metadata = sync_metadata(&mut existing.metadata, &desired.metadata);
                let spec = sync_field(&mut existing.spec, &desired.spec);
                metadata || spec
            })
            .await?;
        }
        Ok(())
    }

    pub fn get_keycloak_container_image(&self) -> String {
        let keycloak = self
            .instance
            .spec
            .sso
            .as_ref()
            .and_then(|sso| sso.keycloak.as_ref());
        container_image(
            keycloak.and_then(|k| k.image.as_ref()),
            keycloak.and_then(|k| k.version.as_ref()),
            self.ctx.config.images.keycloak.as_ref(),
            images::KEYCLOAK,
            images::KEYCLOAK_VERSION,
        )
    }

    fn keycloak_resources(&self) -> Option<k8s_openapi::api::core::v1::ResourceRequirements> {
        self.instance
            .spec
            .sso
            .as_ref()
            .and_then(|sso| sso.keycloak.as_ref())
            .and_then(|k| k.resources.clone())
    }

    pub(crate) fn desired_keycloak_deployment(&self) -> Deployment {
        let container = Container {
            name: KEYCLOAK.to_string(),
            image: Some(self.get_keycloak_container_image()),
            env: Some(vec![
                env_var("KEYCLOAK_USER", ADMIN_USER),
                env_var("KEYCLOAK_PASSWORD", ADMIN_PASSWORD),
                env_var("PROXY_ADDRESS_FORWARDING", "true"),
            ]),
            ports: Some(vec![
                ContainerPort {
                    name: Some("http".to_string()),
                    container_port: ports::KEYCLOAK_HTTP,
                    ..Default::default()
                },
                ContainerPort {
                    name: Some("https".to_string()),
                    container_port: 8443,
                    ..Default::default()
                },
            ]),
            readiness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    path: Some("/auth/realms/master".to_string()),
                    port: IntOrString::Int(ports::KEYCLOAK_HTTP),
                    ..Default::default()
                }),
                initial_delay_seconds: Some(30),
                ..Default::default()
            }),
            resources: self.keycloak_resources(),
            ..Default::default()
        };

        Deployment {
            metadata: self.keycloak_meta(KEYCLOAK),
            spec: Some(DeploymentSpec {
                selector: LabelSelector {
                    match_labels: Some(keycloak_labels()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(keycloak_labels()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        node_selector: Some(self.instance.node_selector()),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub(crate) fn desired_keycloak_service(&self) -> Service {
        Service {
            metadata: self.keycloak_meta(KEYCLOAK),
            spec: Some(ServiceSpec {
                selector: Some(keycloak_labels()),
                type_: Some("LoadBalancer".to_string()),
                ports: Some(vec![ServicePort {
                    name: Some("http".to_string()),
                    port: ports::KEYCLOAK_HTTP,
                    target_port: Some(IntOrString::Int(ports::KEYCLOAK_HTTP)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub(crate) fn desired_keycloak_ingress(&self) -> Ingress {
        Ingress {
            metadata: self.keycloak_meta(KEYCLOAK),
            spec: Some(IngressSpec {
                tls: Some(vec![IngressTLS {
                    hosts: Some(vec![INGRESS_HOST.to_string()]),
                    ..Default::default()
                }]),
                rules: Some(vec![IngressRule {
                    host: Some(INGRESS_HOST.to_string()),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some("/".to_string()),
                            path_type: "ImplementationSpecific".to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: KEYCLOAK.to_string(),
                                    port: Some(ServiceBackendPort {
                                        name: Some("http".to_string()),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn desired_keycloak_route(&self) -> Route {
        let mut route = Route::new(
            KEYCLOAK,
            RouteSpec {
                to: RouteTargetReference {
                    kind: "Service".to_string(),
                    name: KEYCLOAK.to_string(),
                    weight: Some(100),
                },
                port: Some(RoutePort {
                    target_port: IntOrString::String("http".to_string()),
                }),
                tls: Some(RouteTLSConfig {
                    termination: "edge".to_string(),
                    insecure_edge_termination_policy: Some("Redirect".to_string()),
                }),
                wildcard_policy: Some("None".to_string()),
                ..Default::default()
            },
        );
        route.metadata = self.keycloak_meta(KEYCLOAK);
        route
    }

    /// TemplateInstance provisioning a single Keycloak pod with its service and route
    pub(crate) fn desired_template_instance(&self) -> TemplateInstance {
        let image = self.get_keycloak_container_image();
        let objects = vec![
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "metadata": {"name": "keycloak-secret", "labels": keycloak_labels()},
                "stringData": {
                    "SSO_USERNAME": "${SSO_ADMIN_USERNAME}",
                    "SSO_PASSWORD": "${SSO_ADMIN_PASSWORD}",
                },
            }),
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": {"name": KEYCLOAK, "labels": keycloak_labels()},
                "spec": {
                    "selector": {"deploymentConfig": KEYCLOAK},
                    "ports": [{"name": "http", "port": ports::KEYCLOAK_HTTP, "targetPort": ports::KEYCLOAK_HTTP}],
                },
            }),
            serde_json::json!({
                "apiVersion": "route.openshift.io/v1",
                "kind": "Route",
                "metadata": {"name": KEYCLOAK, "labels": keycloak_labels()},
                "spec": {
                    "to": {"kind": "Service", "name": KEYCLOAK},
                    "tls": {"termination": "reencrypt"},
                },
            }),
            serde_json::json!({
                "apiVersion": "apps.openshift.io/v1",
                "kind": "DeploymentConfig",
                "metadata": {"name": KEYCLOAK, "labels": keycloak_labels()},
                "spec": {
                    "replicas": 1,
                    "selector": {"deploymentConfig": KEYCLOAK},
                    "template": {
                        "metadata": {"labels": {"deploymentConfig": KEYCLOAK, "app": KEYCLOAK}},
                        "spec": {
                            "containers": [{
                                "name": KEYCLOAK,
                                "image": image,
                                "envFrom": [{"secretRef": {"name": "keycloak-secret"}}],
                                "ports": [{"name": "http", "containerPort": ports::KEYCLOAK_HTTP}],
                            }],
                        },
                    },
                },
            }),
        ];

        let generated = |name: &str| TemplateParameter {
            name: name.to_string(),
            generate: Some("expression".to_string()),
            from: Some("[a-zA-Z0-9]{8}".to_string()),
            ..Default::default()
        };

        let mut instance = TemplateInstance::new(
            TEMPLATE_INSTANCE_NAME,
            TemplateInstanceSpec {
                template: Template {
                    message: Some("Keycloak provisioned for Argo CD single sign-on".to_string()),
                    objects,
                    parameters: vec![generated("SSO_ADMIN_USERNAME"), generated("SSO_ADMIN_PASSWORD")],
                },
            },
        );
        instance.metadata = self.keycloak_meta(TEMPLATE_INSTANCE_NAME);
        instance
    }

    pub(super) async fn delete_keycloak_resources(&self) -> Result<()> {
        let namespace = self.namespace();
        let client = &self.ctx.client;

        if self.ctx.capabilities.template_api {
            delete_if_exists::<TemplateInstance>(client, TEMPLATE_INSTANCE_NAME, &namespace).await?;
        }
        if self.ctx.capabilities.route_api {
            delete_if_exists::<Route>(client, KEYCLOAK, &namespace).await?;
        }
        delete_if_exists::<Ingress>(client, KEYCLOAK, &namespace).await?;
        delete_if_exists::<Service>(client, KEYCLOAK, &namespace).await?;
        delete_if_exists::<Deployment>(client, KEYCLOAK, &namespace).await?;
        Ok(())
    }
}
