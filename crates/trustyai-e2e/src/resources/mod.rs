//! Declarative resource descriptors.
//!
//! Every descriptor is an immutable set of typed fields that renders to a
//! complete manifest (apiVersion, kind, metadata, spec/data). Descriptors have
//! no behavior beyond rendering; creating and deleting them is the job of
//! [`crate::lifecycle::ResourceScope`].
//!
//! Kinds with a typed k8s-openapi model (Pod, Service, Secret, Namespace, ...)
//! are built from that model; custom resources are built as JSON.

mod inference_service;
mod minio;
mod platform;
mod serving_runtime;
mod trustyai_service;

pub use inference_service::InferenceService;
pub use minio::{MinioPod, MinioSecret, MinioService};
pub use platform::{ConfigMap, Namespace, ServiceAccount};
pub use serving_runtime::{ModelFormat, ServingRuntime};
pub use trustyai_service::TrustyAiService;

use crate::constants::{KSERVE_API_GROUP, ROUTE_API_GROUP, TRUSTYAI_API_GROUP};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Group, version, kind and plural of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceType {
    /// API group; empty for the core group.
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
    pub namespaced: bool,
}

impl ResourceType {
    /// Full apiVersion string (`v1`, `serving.kserve.io/v1beta1`).
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

pub const INFERENCE_SERVICE: ResourceType = ResourceType {
    group: KSERVE_API_GROUP,
    version: "v1beta1",
    kind: "InferenceService",
    plural: "inferenceservices",
    namespaced: true,
};

pub const SERVING_RUNTIME: ResourceType = ResourceType {
    group: KSERVE_API_GROUP,
    version: "v1alpha1",
    kind: "ServingRuntime",
    plural: "servingruntimes",
    namespaced: true,
};

pub const TRUSTYAI_SERVICE: ResourceType = ResourceType {
    group: TRUSTYAI_API_GROUP,
    version: "v1alpha1",
    kind: "TrustyAIService",
    plural: "trustyaiservices",
    namespaced: true,
};

pub const ROUTE: ResourceType = ResourceType {
    group: ROUTE_API_GROUP,
    version: "v1",
    kind: "Route",
    plural: "routes",
    namespaced: true,
};

pub const SECRET: ResourceType = core_type("Secret", "secrets", true);
pub const POD: ResourceType = core_type("Pod", "pods", true);
pub const SERVICE: ResourceType = core_type("Service", "services", true);
pub const SERVICE_ACCOUNT: ResourceType = core_type("ServiceAccount", "serviceaccounts", true);
pub const CONFIG_MAP: ResourceType = core_type("ConfigMap", "configmaps", true);
pub const NAMESPACE: ResourceType = core_type("Namespace", "namespaces", false);

const fn core_type(kind: &'static str, plural: &'static str, namespaced: bool) -> ResourceType {
    ResourceType {
        group: "",
        version: "v1",
        kind,
        plural,
        namespaced,
    }
}

/// Identity of a created resource, enough to look it up or delete it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
    pub resource_type: ResourceType,
    pub name: String,
    /// `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.resource_type.kind, ns, self.name),
            None => write!(f, "{} {}", self.resource_type.kind, self.name),
        }
    }
}

/// A resource that can be rendered to a manifest and applied to the cluster.
pub trait ResourceDescriptor: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    fn name(&self) -> &str;

    /// Namespace of the resource, `None` for cluster-scoped kinds.
    fn namespace(&self) -> Option<&str>;

    /// Render the complete manifest.
    fn to_manifest(&self) -> crate::error::Result<Value>;

    fn key(&self) -> ResourceKey {
        ResourceKey {
            resource_type: self.resource_type(),
            name: self.name().to_string(),
            namespace: self.namespace().map(str::to_string),
        }
    }
}

/// Assemble a custom-resource manifest from its parts.
///
/// Empty label/annotation maps are left out of the metadata.
pub(crate) fn custom_manifest(
    resource_type: ResourceType,
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
    spec: Value,
) -> Value {
    let mut metadata = Map::new();
    metadata.insert("name".to_string(), json!(name));
    metadata.insert("namespace".to_string(), json!(namespace));
    if !labels.is_empty() {
        metadata.insert("labels".to_string(), json!(labels));
    }
    if !annotations.is_empty() {
        metadata.insert("annotations".to_string(), json!(annotations));
    }

    json!({
        "apiVersion": resource_type.api_version(),
        "kind": resource_type.kind,
        "metadata": metadata,
        "spec": spec,
    })
}

/// Serialize a typed k8s-openapi object, filling in apiVersion and kind.
pub(crate) fn typed_manifest<K>(resource_type: ResourceType, object: &K) -> crate::error::Result<Value>
where
    K: serde::Serialize,
{
    let mut value = serde_json::to_value(object)?;
    if let Some(fields) = value.as_object_mut() {
        fields.insert("apiVersion".to_string(), json!(resource_type.api_version()));
        fields.insert("kind".to_string(), json!(resource_type.kind));
    }
    Ok(value)
}

pub(crate) fn string_map<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
