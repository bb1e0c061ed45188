use super::{custom_manifest, string_map, ResourceDescriptor, ResourceType, SERVING_RUNTIME};
use crate::constants::{ONNX, OPENVINO_MODEL_FORMAT, OVMS, OVMS_QUAY_IMAGE, OVMS_RUNTIME};
use crate::error::Result;
use k8s_openapi::api::core::v1::{Container, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Port the ModelMesh adapter uses to manage the model server.
const RUNTIME_MANAGEMENT_PORT: u16 = 8888;

/// Size of the adapter's model memory buffer (128 MiB).
const MEM_BUFFER_BYTES: u64 = 134_217_728;

const MODEL_LOADING_TIMEOUT_MILLIS: u64 = 90_000;

/// A model format a runtime declares support for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFormat {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_select: Option<bool>,
}

/// A multi-model ModelMesh `ServingRuntime` with a built-in adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ServingRuntime {
    pub name: String,
    pub namespace: String,
    pub supported_model_formats: Vec<ModelFormat>,
    pub containers: Vec<Container>,
    pub grpc_endpoint: u16,
    pub grpc_data_endpoint: u16,
    /// Adapter server type (e.g. `ovms`).
    pub server_type: String,
}

impl ServingRuntime {
    /// OpenVINO Model Server runtime serving OpenVINO IR and ONNX models.
    pub fn ovms(namespace: impl Into<String>) -> Self {
        let quantities = |cpu: &str, memory: &str| {
            BTreeMap::from([
                ("cpu".to_string(), Quantity(cpu.to_string())),
                ("memory".to_string(), Quantity(memory.to_string())),
            ])
        };

        let container = Container {
            name: OVMS.to_string(),
            image: Some(OVMS_QUAY_IMAGE.to_string()),
            args: Some(
                [
                    "--port=8001",
                    "--rest_port=8888",
                    "--config_path=/models/model_config_list.json",
                    "--file_system_poll_wait_seconds=0",
                    "--grpc_bind_address=127.0.0.1",
                    "--rest_bind_address=127.0.0.1",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
            ),
            resources: Some(ResourceRequirements {
                requests: Some(quantities("500m", "1Gi")),
                limits: Some(quantities("5", "1Gi")),
                ..Default::default()
            }),
            ..Default::default()
        };

        Self {
            name: OVMS_RUNTIME.to_string(),
            namespace: namespace.into(),
            supported_model_formats: vec![
                ModelFormat {
                    name: OPENVINO_MODEL_FORMAT.to_string(),
                    version: Some("opset1".to_string()),
                    auto_select: Some(true),
                },
                ModelFormat {
                    name: ONNX.to_string(),
                    version: Some("1".to_string()),
                    auto_select: None,
                },
            ],
            containers: vec![container],
            grpc_endpoint: 8085,
            grpc_data_endpoint: 8001,
            server_type: OVMS.to_string(),
        }
    }
}

impl ResourceDescriptor for ServingRuntime {
    fn resource_type(&self) -> ResourceType {
        SERVING_RUNTIME
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn to_manifest(&self) -> Result<Value> {
        let label = format!("modelmesh-serving-{}-SR", self.name);
        let labels = string_map([("name", label.as_str())]);
        let annotations = string_map([("enable-route", "true")]);

        Ok(custom_manifest(
            SERVING_RUNTIME,
            &self.name,
            &self.namespace,
            &labels,
            &annotations,
            json!({
                "supportedModelFormats": serde_json::to_value(&self.supported_model_formats)?,
                "protocolVersions": ["grpc-v1"],
                "multiModel": true,
                "grpcEndpoint": format!("port:{}", self.grpc_endpoint),
                "grpcDataEndpoint": format!("port:{}", self.grpc_data_endpoint),
                "containers": serde_json::to_value(&self.containers)?,
                "builtInAdapter": {
                    "serverType": self.server_type,
                    "runtimeManagementPort": RUNTIME_MANAGEMENT_PORT,
                    "memBufferBytes": MEM_BUFFER_BYTES,
                    "modelLoadingTimeoutMillis": MODEL_LOADING_TIMEOUT_MILLIS,
                },
            }),
        ))
    }
}
