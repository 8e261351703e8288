// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The operator name used as field manager and in labels
pub const OPERATOR_NAME: &str = "argocd-operator";

/// Finalizer placed on every ArgoCD instance
pub const ARGOCD_DELETION_FINALIZER: &str = "argoproj.io/finalizer";

/// Kubernetes label keys used on managed objects
pub mod labels {
    pub const NAME: &str = "app.kubernetes.io/name";
    pub const PART_OF: &str = "app.kubernetes.io/part-of";
    pub const COMPONENT: &str = "app.kubernetes.io/component";
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    /// Value of the part-of label
    pub const PART_OF_VALUE: &str = "argocd";
    /// Namespaces carrying this label are managed by the ArgoCD instance in the named namespace
    pub const NAMESPACE_MANAGED_BY: &str = "argocd.argoproj.io/managed-by";
    /// Default application instance label key
    /// Label added to pod templates to trigger a rollout after a TLS change
    pub const TLS_CERT_CHANGED: &str = "argocd.argoproj.io/tls-cert-changed";
}

/// Annotation keys used to track the owning instance
pub mod annotations {
    pub const INSTANCE_NAME: &str = "argocds.argoproj.io/name";
    pub const INSTANCE_NAMESPACE: &str = "argocds.argoproj.io/namespace";
    /// Asks the OpenShift service CA to issue a serving certificate into the named secret
    pub const SERVING_CERT_SECRET_NAME: &str = "service.beta.openshift.io/serving-cert-secret-name";
}

/// The only supported `autotls` provider
pub const AUTO_TLS_OPENSHIFT: &str = "openshift";

/// Environment variables read by the operator
pub mod env {
    pub const DISABLE_DEX: &str = "DISABLE_DEX";
    pub const CONTROLLER_CLUSTER_ROLE: &str = "ARGOCD_CONTROLLER_CLUSTER_ROLE";
    pub const SERVER_CLUSTER_ROLE: &str = "ARGOCD_SERVER_CLUSTER_ROLE";
    pub const CLUSTER_CONFIG_NAMESPACES: &str = "ARGOCD_CLUSTER_CONFIG_NAMESPACES";
    pub const REDIS_CONFIG_PATH: &str = "REDIS_CONFIG_PATH";
    pub const WATCH_NAMESPACE: &str = "WATCH_NAMESPACE";
    pub const ARGOCD_IMAGE: &str = "ARGOCD_IMAGE";
    pub const REDIS_IMAGE: &str = "ARGOCD_REDIS_IMAGE";
    pub const REDIS_HA_PROXY_IMAGE: &str = "ARGOCD_REDIS_HA_PROXY_IMAGE";
    pub const REPOSERVER_IMAGE: &str = "ARGOCD_REPOSERVER_IMAGE";
    pub const DEX_IMAGE: &str = "ARGOCD_DEX_IMAGE";
    pub const KEYCLOAK_IMAGE: &str = "ARGOCD_KEYCLOAK_IMAGE";
    pub const NOTIFICATIONS_IMAGE: &str = "ARGOCD_NOTIFICATIONS_IMAGE";
    pub const PROXY_VARS: [&str; 3] = ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY"];
}

/// Default container images and versions
pub mod images {
    pub const ARGOCD: &str = "quay.io/argoproj/argocd";
    pub const ARGOCD_VERSION: &str = "v2.10.6";
    pub const REDIS: &str = "redis";
    pub const REDIS_VERSION: &str = "7.0.14-alpine";
    pub const REDIS_HA: &str = "redis";
    pub const REDIS_HA_VERSION: &str = "7.0.14-alpine";
    pub const REDIS_HA_PROXY: &str = "haproxy";
    pub const REDIS_HA_PROXY_VERSION: &str = "2.6.14-alpine";
    pub const DEX: &str = "ghcr.io/dexidp/dex";
    pub const DEX_VERSION: &str = "v2.38.0";
    pub const KEYCLOAK: &str = "quay.io/keycloak/keycloak";
    pub const KEYCLOAK_VERSION: &str = "9.0.3";
}

/// Well known object names
pub mod names {
    pub const REDIS_TLS_SECRET: &str = "argocd-operator-redis-tls";
    pub const REPO_SERVER_TLS_SECRET: &str = "argocd-repo-server-tls";
    pub const NOTIFICATIONS_CONFIGMAP: &str = "argocd-notifications-cm";
}

/// Workload identifiers used for RBAC objects
pub mod identifiers {
    pub const APPLICATION_CONTROLLER: &str = "argocd-application-controller";
    pub const SERVER: &str = "argocd-server";
    pub const DEX_SERVER: &str = "argocd-dex-server";
    pub const REDIS_HA: &str = "argocd-redis-ha";
    pub const REPO_SERVER: &str = "argocd-repo-server";
    pub const NOTIFICATIONS_CONTROLLER: &str = "argocd-notifications-controller";
}

/// Well known ports
pub mod ports {
    pub const REDIS: i32 = 6379;
    pub const REDIS_SENTINEL: i32 = 26379;
    pub const REPO_SERVER: i32 = 8081;
    pub const REPO_SERVER_METRICS: i32 = 8084;
    pub const DEX_HTTP: i32 = 5556;
    pub const DEX_GRPC: i32 = 5557;
    pub const KEYCLOAK_HTTP: i32 = 8080;
    pub const APPLICATION_CONTROLLER_METRICS: i32 = 8082;
    pub const NOTIFICATIONS_METRICS: i32 = 9001;
}

/// Reconcile loop timings
pub mod requeue {
    /// Requeue interval after a successful reconcile, in seconds
    pub const SUCCESS_SECS: u64 = 300;
    /// Requeue interval after a failed reconcile, in seconds
    pub const ERROR_SECS: u64 = 60;
}

/// API discovery
pub mod crd {
    /// Initial wait between checks for the ArgoCD CRD
    pub const POLL_INTERVAL_SECS: u64 = 5;
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

pub mod discovery {
    pub const ARGOCD_GROUP: &str = "argoproj.io";
    pub const ROUTE_GROUP: &str = "route.openshift.io";
    pub const TEMPLATE_GROUP: &str = "template.openshift.io";
    pub const PROMETHEUS_GROUP: &str = "monitoring.coreos.com";
}

/// Default location of the redis configuration templates
pub const DEFAULT_REDIS_CONFIG_PATH: &str = "/var/lib/redis";
