use super::{custom_manifest, string_map, ResourceDescriptor, ResourceType, INFERENCE_SERVICE};
use crate::error::Result;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A KServe `InferenceService` deployed in ModelMesh mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceService {
    pub name: String,
    pub namespace: String,
    /// Model format served by the runtime (e.g. `onnx`).
    pub model_format: String,
    /// Name of the `ServingRuntime` that loads the model.
    pub runtime: String,
    /// Key of the storage data-connection secret.
    pub storage_key: String,
    /// Object path of the model inside the storage bucket.
    pub storage_path: String,
}

impl ResourceDescriptor for InferenceService {
    fn resource_type(&self) -> ResourceType {
        INFERENCE_SERVICE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn to_manifest(&self) -> Result<Value> {
        let annotations = string_map([("serving.kserve.io/deploymentMode", "ModelMesh")]);

        Ok(custom_manifest(
            INFERENCE_SERVICE,
            &self.name,
            &self.namespace,
            &BTreeMap::new(),
            &annotations,
            json!({
                "predictor": {
                    "model": {
                        "modelFormat": {
                            "name": self.model_format,
                        },
                        "runtime": self.runtime,
                        "storage": {
                            "key": self.storage_key,
                            "path": self.storage_path,
                        },
                    },
                },
            }),
        ))
    }
}
