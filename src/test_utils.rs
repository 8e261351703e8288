// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses.

use crate::config::Config;
use crate::kubernetes::ClusterCapabilities;
use crate::reconcilers::common::Context as ReconcileContext;
use crate::types::ArgoCD;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::Client;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A request the mock API server received
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl RecordedRequest {
    /// Parse the request body as JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// A mock HTTP service that returns predefined responses based on request paths.
///
/// Unmatched GETs answer 404, unmatched writes echo the submitted object and
/// unmatched DELETEs succeed, so a test only has to describe the cluster state it cares about.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Serve the object for GET requests on the exact path
    pub fn with_object<T: Serialize>(self, path: &str, obj: &T) -> Self {
        let body = serde_json::to_string(obj).unwrap();
        self.on("GET", path, 200, &body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for PUT requests matching the exact path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    /// Add a response for PATCH requests matching the exact path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Add a response for DELETE requests matching the exact path
    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests received for the method and exact path
    pub fn requests_matching(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Whether any write (POST, PUT, PATCH, DELETE) was received
    pub fn has_writes(&self) -> bool {
        self.requests().iter().any(|r| r.method != "GET")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

fn json_response(status: u16, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.into_bytes()))
        .unwrap()
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let bytes: Bytes = req.into_body().collect().await?.to_bytes();
            let body = String::from_utf8_lossy(&bytes).to_string();
            requests.lock().unwrap().push(RecordedRequest {
                method: method.clone(),
                path,
                body: body.clone(),
            });

            Ok(match response {
                Some((status, body)) => json_response(status, body),
                None => match method.as_str() {
                    "POST" => json_response(201, body),
                    "PUT" | "PATCH" => json_response(200, body),
                    "DELETE" => json_response(200, success_json()),
                    _ => json_response(
                        404,
                        r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#
                            .to_string(),
                    ),
                },
            })
        })
    }
}

/// Create a mock namespace JSON response
pub fn namespace_json(name: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid"
        }
    })
    .to_string()
}

/// Create a mock namespace JSON response for a namespace being deleted
pub fn terminating_namespace_json(name: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid",
            "deletionTimestamp": "2026-01-01T00:00:00Z"
        },
        "status": {"phase": "Terminating"}
    })
    .to_string()
}

/// Create a namespace list JSON response
pub fn namespace_list_json(names: &[&str]) -> String {
    let items: Vec<serde_json::Value> = names
        .iter()
        .map(|name| serde_json::from_str(&namespace_json(name)).unwrap())
        .collect();
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "NamespaceList",
        "metadata": {},
        "items": items
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a successful Status response
pub fn success_json() -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Success"
    })
    .to_string()
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn prune_empty(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.values_mut().for_each(prune_empty);
            map.retain(|key, v| key == "emptyDir" || !is_empty_value(v));
        }
        Value::Array(items) => items.iter_mut().for_each(prune_empty),
        _ => {}
    }
}

fn default_containers(pod: &mut serde_json::Map<String, Value>, key: &str) {
    let Some(containers) = pod.get_mut(key).and_then(Value::as_array_mut) else {
        return;
    };
    for container in containers.iter_mut().filter_map(Value::as_object_mut) {
        container.entry("terminationMessagePath").or_insert(json!("/dev/termination-log"));
        container.entry("terminationMessagePolicy").or_insert(json!("File"));
        container.entry("imagePullPolicy").or_insert(json!("IfNotPresent"));
        container.entry("resources").or_insert(json!({}));
    }
}

/// An object the way the API server stores it: empty lists and maps dropped,
/// replicas, pod and container defaults filled in and server metadata set
pub fn server_view<K: Serialize + DeserializeOwned>(obj: &K) -> K {
    let mut value = serde_json::to_value(obj).unwrap();
    prune_empty(&mut value);

    if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.insert("uid".to_string(), json!("server-uid"));
        meta.insert("resourceVersion".to_string(), json!("12345"));
        meta.insert("generation".to_string(), json!(1));
        meta.insert("creationTimestamp".to_string(), json!("2026-01-01T00:00:00Z"));
    }
    if let Some(spec) = value.get_mut("spec").and_then(Value::as_object_mut) {
        spec.entry("replicas").or_insert(json!(1));
        spec.entry("revisionHistoryLimit").or_insert(json!(10));
        let pod = spec
            .get_mut("template")
            .and_then(|t| t.get_mut("spec"))
            .and_then(Value::as_object_mut);
        if let Some(pod) = pod {
            pod.entry("restartPolicy").or_insert(json!("Always"));
            pod.entry("dnsPolicy").or_insert(json!("ClusterFirst"));
            pod.entry("schedulerName").or_insert(json!("default-scheduler"));
            pod.entry("securityContext").or_insert(json!({}));
            default_containers(pod, "containers");
            default_containers(pod, "initContainers");
        }
    }
    serde_json::from_value(value).unwrap()
}

/// An ArgoCD instance with a uid so owner references can be built
pub fn make_argocd(name: &str, namespace: &str) -> ArgoCD {
    ArgoCD {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("{}-uid", name)),
            ..Default::default()
        },
        spec: Default::default(),
        status: None,
    }
}

/// Reconcile context with the default configuration and no optional APIs
pub fn test_context(client: Client) -> ReconcileContext {
    test_context_with(client, Config::default(), ClusterCapabilities::default())
}

/// Reconcile context with the given configuration and optional APIs
pub fn test_context_with(client: Client, config: Config, capabilities: ClusterCapabilities) -> ReconcileContext {
    ReconcileContext::new(client, config, capabilities)
}
