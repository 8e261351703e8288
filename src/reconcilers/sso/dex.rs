// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::SSOReconciler;
use crate::constants::{identifiers, images, labels, ports};
use crate::error::Result;
use crate::reconcilers::common::{delete_if_exists, reconcile_object, sync_deployment, sync_service};
use crate::reconcilers::rbac::{
    delete_namespaced_rbac, policy_rule_for_dex_server, reconcile_role, reconcile_role_binding,
    reconcile_service_account,
};
use crate::util::{container_image, name_with_suffix, object_meta, proxy_env_vars, restricted_security_context};
use crate::workloads::Request;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, PodSpec, PodTemplateSpec, Service, ServiceAccount, ServicePort,
    ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;
use tracing::info;

const COMPONENT: &str = "dex-server";
const SHARED_PATH: &str = "/shared";

impl SSOReconciler<'_> {
    /// `<instance>-dex-server`
    pub fn dex_resource_name(&self) -> String {
        name_with_suffix(self.instance, COMPONENT)
    }

    /// `<instance>-argocd-dex-server`, bound by the dex role
    pub fn dex_service_account_name(&self) -> String {
        name_with_suffix(self.instance, identifiers::DEX_SERVER)
    }

    fn dex_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(labels::NAME.to_string(), self.dex_resource_name())])
    }

    pub(super) async fn reconcile_dex(&self) -> Result<()> {
        reconcile_service_account(self.ctx, self.instance, &self.dex_service_account_name(), COMPONENT).await?;
        reconcile_role(self.ctx, self.instance, identifiers::DEX_SERVER, policy_rule_for_dex_server()).await?;
        reconcile_role_binding(self.ctx, self.instance, identifiers::DEX_SERVER).await?;

        let service = self.desired_dex_service()?;
        reconcile_object(self.ctx, self.instance, service, sync_service).await?;
        let deployment = self.desired_dex_deployment()?;
        reconcile_object(self.ctx, self.instance, deployment, sync_deployment).await?;
        Ok(())
    }

    pub fn get_dex_container_image(&self) -> String {
        let dex = self.instance.spec.sso.as_ref().and_then(|sso| sso.dex.as_ref());
        container_image(
            dex.and_then(|d| d.image.as_ref()),
            dex.and_then(|d| d.version.as_ref()),
            self.ctx.config.images.dex.as_ref(),
            images::DEX,
            images::DEX_VERSION,
        )
    }

    fn argocd_container_image(&self) -> String {
        let spec = &self.instance.spec;
        container_image(
            spec.image.as_ref(),
            spec.version.as_ref(),
            self.ctx.config.images.argocd.as_ref(),
            images::ARGOCD,
            images::ARGOCD_VERSION,
        )
    }

    fn desired_dex_service(&self) -> Result<Service> {
        let name = self.dex_resource_name();
        let port = |port_name: &str, port: i32| ServicePort {
            name: Some(port_name.to_string()),
            port,
            target_port: Some(IntOrString::Int(port)),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        };

        Request::new(
            Service {
                metadata: object_meta(&name, &self.namespace(), self.instance, COMPONENT),
                spec: Some(ServiceSpec {
                    selector: Some(self.dex_labels()),
                    ports: Some(vec![
                        port("http", ports::DEX_HTTP),
                        port("grpc", ports::DEX_GRPC),
                    ]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            self.instance,
        )
        .request()
    }

    pub(crate) fn desired_dex_deployment(&self) -> Result<Deployment> {
        let name = self.dex_resource_name();
        let resources = self
            .instance
            .spec
            .sso
            .as_ref()
            .and_then(|sso| sso.dex.as_ref())
            .and_then(|dex| dex.resources.clone())
            .unwrap_or_default();
        let shared_mount = VolumeMount {
            name: "static-files".to_string(),
            mount_path: SHARED_PATH.to_string(),
            ..Default::default()
        };

        let init_container = Container {
            name: "copyutil".to_string(),
            image: Some(self.argocd_container_image()),
            command: Some(vec![
                "cp".to_string(),
                "-n".to_string(),
                "/usr/local/bin/argocd".to_string(),
                format!("{}/argocd-dex", SHARED_PATH),
            ]),
            env: Some(proxy_env_vars(&self.ctx.config)),
            resources: Some(resources.clone()),
            security_context: Some(restricted_security_context(None)),
            volume_mounts: Some(vec![shared_mount.clone()]),
            ..Default::default()
        };

        let container = Container {
            name: "dex".to_string(),
            image: Some(self.get_dex_container_image()),
            command: Some(vec![
                format!("{}/argocd-dex", SHARED_PATH),
                "rundex".to_string(),
            ]),
            ports: Some(vec![
                ContainerPort {
                    name: Some("http".to_string()),
                    container_port: ports::DEX_HTTP,
                    ..Default::default()
                },
                ContainerPort {
                    name: Some("grpc".to_string()),
                    container_port: ports::DEX_GRPC,
                    ..Default::default()
                },
            ]),
            env: Some(proxy_env_vars(&self.ctx.config)),
            resources: Some(resources),
            security_context: Some(restricted_security_context(None)),
            volume_mounts: Some(vec![shared_mount]),
            ..Default::default()
        };

        Request::new(
            Deployment {
                metadata: object_meta(&name, &self.namespace(), self.instance, COMPONENT),
                spec: Some(DeploymentSpec {
                    selector: LabelSelector {
                        match_labels: Some(self.dex_labels()),
                        ..Default::default()
                    },
                    template: PodTemplateSpec {
                        metadata: Some(ObjectMeta {
                            labels: Some(self.dex_labels()),
                            ..Default::default()
                        }),
                        spec: Some(PodSpec {
                            service_account_name: Some(self.dex_service_account_name()),
                            node_selector: Some(self.instance.node_selector()),
                            init_containers: Some(vec![init_container]),
                            containers: vec![container],
                            volumes: Some(vec![Volume {
                                name: "static-files".to_string(),
                                empty_dir: Some(EmptyDirVolumeSource::default()),
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

    pub(super) async fn delete_dex_resources(&self) -> Result<()> {
        let namespace = self.namespace();
        let client = &self.ctx.client;
        let name = self.dex_resource_name();

        let deleted = delete_if_exists::<Deployment>(client, &name, &namespace).await?;
        delete_if_exists::<Service>(client, &name, &namespace).await?;
        delete_namespaced_rbac(self.ctx, self.instance, identifiers::DEX_SERVER).await?;
        delete_if_exists::<ServiceAccount>(client, &self.dex_service_account_name(), &namespace).await?;
        if deleted {
            info!("Dex removed from {}", namespace);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_argocd, namespace_json, test_context, MockService};
    use crate::types::argocd::{ArgoCDDexSpec, ArgoCDSSOSpec};
    use crate::types::ArgoCD;

    fn dex_argocd() -> ArgoCD {
        let mut argocd = make_argocd("argocd", "argocd");
        argocd.spec.sso = Some(ArgoCDSSOSpec {
            provider: Some("dex".to_string()),
            dex: Some(ArgoCDDexSpec {
                open_shift_oauth: true,
                ..Default::default()
            }),
            keycloak: None,
        });
        argocd
    }

    #[tokio::test]
    async fn test_reconcile_dex_creates_objects() {
        let mock = MockService::new().on_get("/api/v1/namespaces/argocd", 200, &namespace_json("argocd"));
        let ctx = test_context(mock.clone().into_client());
        let argocd = dex_argocd();

        SSOReconciler::new(&ctx, &argocd).reconcile().await.unwrap();

        let service_accounts = mock.requests_matching("POST", "/api/v1/namespaces/argocd/serviceaccounts");
        assert_eq!(service_accounts[0].json()["metadata"]["name"], "argocd-argocd-dex-server");
        let services = mock.requests_matching("POST", "/api/v1/namespaces/argocd/services");
        assert_eq!(services[0].json()["metadata"]["name"], "argocd-dex-server");
        assert_eq!(services[0].json()["spec"]["ports"][0]["port"], 5556);
        assert_eq!(services[0].json()["spec"]["ports"][1]["port"], 5557);
        let deployments = mock.requests_matching("POST", "/apis/apps/v1/namespaces/argocd/deployments");
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].json()["metadata"]["name"], "argocd-dex-server");
        assert_eq!(
            mock.requests_matching("DELETE", "/apis/apps/v1/namespaces/argocd/deployments/keycloak")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_no_provider_removes_dex() {
        let mock = MockService::new();
        let ctx = test_context(mock.clone().into_client());
        let argocd = make_argocd("argocd", "argocd");

        SSOReconciler::new(&ctx, &argocd).reconcile().await.unwrap();

        assert!(mock.requests().iter().all(|r| r.method == "DELETE"));
        assert_eq!(
            mock.requests_matching(
                "DELETE",
                "/apis/apps/v1/namespaces/argocd/deployments/argocd-dex-server"
            )
            .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_dex_deployment_runs_copied_binary() {
        let ctx = test_context(MockService::new().into_client());
        let argocd = dex_argocd();

        let deployment = SSOReconciler::new(&ctx, &argocd).desired_dex_deployment().unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();

        assert_eq!(pod.service_account_name.as_deref(), Some("argocd-argocd-dex-server"));
        assert_eq!(pod.containers[0].image.as_deref(), Some("ghcr.io/dexidp/dex:v2.38.0"));
        assert_eq!(
            pod.containers[0].command.as_ref().unwrap(),
            &vec!["/shared/argocd-dex".to_string(), "rundex".to_string()]
        );
        assert_eq!(
            pod.init_containers.unwrap()[0].command.as_ref().unwrap()[3],
            "/shared/argocd-dex"
        );
    }
}
