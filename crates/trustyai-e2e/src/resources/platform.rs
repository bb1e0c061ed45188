//! Plain platform objects the scenarios need around the model deployment.

use super::{
    string_map, typed_manifest, ResourceDescriptor, ResourceType, CONFIG_MAP, NAMESPACE,
    SERVICE_ACCOUNT,
};
use crate::constants::{
    CLUSTER_MONITORING_CONFIG, CLUSTER_MONITORING_NAMESPACE, USER_WORKLOAD_MONITORING_CONFIG,
    USER_WORKLOAD_MONITORING_NAMESPACE,
};
use crate::error::Result;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;
use std::collections::BTreeMap;

/// A namespace, optionally labelled (`modelmesh-enabled: "true"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl Namespace {
    /// Namespace ModelMesh will reconcile model deployments in.
    pub fn modelmesh_enabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: string_map([("modelmesh-enabled", "true")]),
        }
    }
}

impl ResourceDescriptor for Namespace {
    fn resource_type(&self) -> ResourceType {
        NAMESPACE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        None
    }

    fn to_manifest(&self) -> Result<Value> {
        let namespace = corev1::Namespace {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                labels: (!self.labels.is_empty()).then(|| self.labels.clone()),
                ..Default::default()
            },
            ..Default::default()
        };

        typed_manifest(NAMESPACE, &namespace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub name: String,
    pub namespace: String,
}

impl ResourceDescriptor for ServiceAccount {
    fn resource_type(&self) -> ResourceType {
        SERVICE_ACCOUNT
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn to_manifest(&self) -> Result<Value> {
        let account = corev1::ServiceAccount {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            ..Default::default()
        };

        typed_manifest(SERVICE_ACCOUNT, &account)
    }
}

/// A config map with string data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMap {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    /// Turns on user-workload monitoring so TrustyAI metrics get scraped.
    pub fn cluster_monitoring() -> Result<Self> {
        let config = BTreeMap::from([("enableUserWorkload", "true")]);
        Ok(Self {
            name: CLUSTER_MONITORING_CONFIG.to_string(),
            namespace: CLUSTER_MONITORING_NAMESPACE.to_string(),
            data: BTreeMap::from([("config.yaml".to_string(), serde_yaml::to_string(&config)?)]),
        })
    }

    /// Debug-level Prometheus for user workloads with 15 day retention.
    pub fn user_workload_monitoring() -> Result<Self> {
        let config = BTreeMap::from([(
            "prometheus",
            BTreeMap::from([("logLevel", "debug"), ("retention", "15d")]),
        )]);
        Ok(Self {
            name: USER_WORKLOAD_MONITORING_CONFIG.to_string(),
            namespace: USER_WORKLOAD_MONITORING_NAMESPACE.to_string(),
            data: BTreeMap::from([("config.yaml".to_string(), serde_yaml::to_string(&config)?)]),
        })
    }
}

impl ResourceDescriptor for ConfigMap {
    fn resource_type(&self) -> ResourceType {
        CONFIG_MAP
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn to_manifest(&self) -> Result<Value> {
        let config_map = corev1::ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            data: Some(self.data.clone()),
            ..Default::default()
        };

        typed_manifest(CONFIG_MAP, &config_map)
    }
}
