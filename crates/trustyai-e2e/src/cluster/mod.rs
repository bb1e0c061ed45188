//! Cluster access.
//!
//! The harness only needs a narrow slice of the API server: apply and delete
//! manifests, list/inspect/exec pods, read routes and namespace phase.
//! [`ClusterApi`] is that slice; [`KubeCluster`] implements it with kube-rs,
//! and unit tests substitute an in-memory fake.

mod kube_cluster;

#[cfg(test)]
pub(crate) mod fake;

pub use kube_cluster::KubeCluster;

use crate::error::{HarnessError, Result};
use crate::resources::{ResourceDescriptor, ResourceKey};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use serde_json::Value;

/// Pod phase reported once all containers have started.
pub const POD_PHASE_RUNNING: &str = "Running";

/// Namespace phase once it can accept resources.
pub const NAMESPACE_PHASE_ACTIVE: &str = "Active";

/// An environment variable as declared on one of a pod's containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVarObservation {
    pub container: String,
    pub name: String,
    pub value: Option<String>,
}

/// Point-in-time view of a pod: name, phase and container environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodObservation {
    pub name: String,
    pub phase: Option<String>,
    pub env: Vec<EnvVarObservation>,
}

impl PodObservation {
    pub fn is_running(&self) -> bool {
        self.phase.as_deref() == Some(POD_PHASE_RUNNING)
    }

    /// Value of the first container env var named `name`.
    ///
    /// `Some(None)` means the variable exists but is sourced from elsewhere
    /// (a secret or field ref) rather than carrying a literal value.
    pub fn env_value(&self, name: &str) -> Option<Option<&str>> {
        self.env
            .iter()
            .find(|var| var.name == name)
            .map(|var| var.value.as_deref())
    }
}

impl From<&Pod> for PodObservation {
    fn from(pod: &Pod) -> Self {
        let env = pod
            .spec
            .iter()
            .flat_map(|spec| spec.containers.iter())
            .flat_map(|container| {
                container
                    .env
                    .iter()
                    .flatten()
                    .map(move |var| EnvVarObservation {
                        container: container.name.clone(),
                        name: var.name.clone(),
                        value: var.value.clone(),
                    })
            })
            .collect();

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            phase: pod.status.as_ref().and_then(|status| status.phase.clone()),
            env,
        }
    }
}

/// Externally reachable host/path mapping to an in-cluster service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    pub host: String,
    /// Path prefix, empty when the route serves the whole host.
    pub path: String,
    /// Whether the route terminates TLS.
    pub tls: bool,
}

impl Route {
    /// Parse an OpenShift `Route` object.
    ///
    /// The host is taken from `spec.host`, falling back to the first admitted
    /// ingress host when the router assigned one.
    pub fn from_object(name: &str, object: &Value) -> Result<Self> {
        let spec = object.get("spec");

        let host = spec
            .and_then(|spec| spec.get("host"))
            .and_then(Value::as_str)
            .filter(|host| !host.is_empty())
            .or_else(|| {
                object
                    .pointer("/status/ingress/0/host")
                    .and_then(Value::as_str)
                    .filter(|host| !host.is_empty())
            })
            .ok_or_else(|| {
                HarnessError::InvalidResource(format!("route '{}' has no host", name))
            })?;

        let path = spec
            .and_then(|spec| spec.get("path"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim_end_matches('/');

        let tls = spec
            .and_then(|spec| spec.get("tls"))
            .is_some_and(|tls| !tls.is_null());

        Ok(Self {
            name: name.to_string(),
            host: host.to_string(),
            path: path.to_string(),
            tls,
        })
    }

    /// Base URL of the route: scheme, host and path prefix, no trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}{}", scheme, self.host, self.path)
    }

    /// URL of `endpoint` (which starts with `/`) under this route.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url(), endpoint)
    }
}

/// The cluster operations the harness depends on.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Create the resource, or bring an existing one in line with the manifest.
    async fn apply(&self, resource: &dyn ResourceDescriptor) -> Result<()>;

    /// Delete a resource. A missing resource is reported as NotFound.
    async fn delete(&self, key: &ResourceKey) -> Result<()>;

    async fn exists(&self, key: &ResourceKey) -> Result<bool>;

    /// Names of the pods currently in `namespace`.
    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>>;

    /// Inspect a single pod. A pod deleted since it was listed is NotFound.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodObservation>;

    /// Run a command in a pod container and return its stdout.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<String>;

    /// Look up the route named `name`. Missing routes are NotFound.
    async fn get_route(&self, namespace: &str, name: &str) -> Result<Route>;

    /// Phase of a namespace, `None` if it does not exist.
    async fn namespace_phase(&self, name: &str) -> Result<Option<String>>;
}

/// First pod in `namespace` whose name contains `fragment`.
///
/// Fails immediately with NotFound when there is none; callers that need to
/// wait for the pod use [`crate::readiness::wait_for_pod_named`].
pub async fn find_pod(cluster: &dyn ClusterApi, namespace: &str, fragment: &str) -> Result<String> {
    cluster
        .list_pods(namespace)
        .await?
        .into_iter()
        .find(|name| name.contains(fragment))
        .ok_or_else(|| HarnessError::not_found("Pod", format!("*{}*", fragment), namespace))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    #[test]
    fn test_pod_observation_from_pod() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("modelmesh-serving-ovms-1.x-7d9f".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![
                    Container {
                        name: "mm".to_string(),
                        env: Some(vec![EnvVar {
                            name: "MM_PAYLOAD_PROCESSORS".to_string(),
                            value: Some("http://trustyai-service.ns.svc/consumer/kserve/v2".to_string()),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    },
                    Container {
                        name: "ovms".to_string(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                ..Default::default()
            }),
        };

        let observation = PodObservation::from(&pod);

        assert_eq!(observation.name, "modelmesh-serving-ovms-1.x-7d9f");
        assert!(observation.is_running());
        assert_eq!(observation.env.len(), 1);
        assert_eq!(observation.env[0].container, "mm");
        assert_eq!(
            observation.env_value("MM_PAYLOAD_PROCESSORS"),
            Some(Some("http://trustyai-service.ns.svc/consumer/kserve/v2"))
        );
        assert_eq!(observation.env_value("MISSING"), None);
    }

    #[test]
    fn test_pending_pod_is_not_running() {
        let observation = PodObservation {
            name: "p".to_string(),
            phase: Some("Pending".to_string()),
            env: vec![],
        };
        assert!(!observation.is_running());
    }

    #[test]
    fn test_route_with_tls_and_path() {
        let route = Route::from_object(
            "demo-loan-nn-onnx-alpha",
            &json!({
                "spec": {
                    "host": "demo.apps.example.com",
                    "path": "/v2/models/demo-loan-nn-onnx-alpha/",
                    "tls": {"termination": "edge"}
                }
            }),
        )
        .unwrap();

        assert_eq!(
            route.url("/infer"),
            "https://demo.apps.example.com/v2/models/demo-loan-nn-onnx-alpha/infer"
        );
    }

    #[test]
    fn test_route_without_tls_uses_http() {
        let route = Route::from_object(
            "trustyai-service",
            &json!({"spec": {"host": "127.0.0.1:8080"}}),
        )
        .unwrap();

        assert_eq!(route.url("/info"), "http://127.0.0.1:8080/info");
    }

    #[test]
    fn test_route_host_falls_back_to_ingress() {
        let route = Route::from_object(
            "r",
            &json!({
                "spec": {"host": ""},
                "status": {"ingress": [{"host": "r-ns.apps.example.com"}]}
            }),
        )
        .unwrap();

        assert_eq!(route.host, "r-ns.apps.example.com");
    }

    #[test]
    fn test_route_without_host_is_invalid() {
        let err = Route::from_object("r", &json!({"spec": {}})).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidResource(_)));
    }
}
