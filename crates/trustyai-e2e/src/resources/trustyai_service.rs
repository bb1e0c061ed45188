use super::{custom_manifest, ResourceDescriptor, ResourceType, TRUSTYAI_SERVICE};
use crate::constants::{TRUSTYAI_IMAGE, TRUSTYAI_IMAGE_TAG, TRUSTYAI_STORAGE_FOLDER};
use crate::error::Result;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A `TrustyAIService`: the fairness-monitoring service the payloads are
/// forwarded to.
///
/// Storage, data format and metric schedule are fixed: a 1Gi PVC mounted at
/// `/inputs`, CSV data in `data.csv`, metrics recomputed every 5 seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustyAiService {
    pub name: String,
    pub namespace: String,
}

impl TrustyAiService {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl ResourceDescriptor for TrustyAiService {
    fn resource_type(&self) -> ResourceType {
        TRUSTYAI_SERVICE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn to_manifest(&self) -> Result<Value> {
        Ok(custom_manifest(
            TRUSTYAI_SERVICE,
            &self.name,
            &self.namespace,
            &BTreeMap::new(),
            &BTreeMap::new(),
            json!({
                "replicas": 1,
                "image": TRUSTYAI_IMAGE,
                "tag": TRUSTYAI_IMAGE_TAG,
                "storage": {
                    "format": "PVC",
                    "folder": TRUSTYAI_STORAGE_FOLDER,
                    "size": "1Gi",
                },
                "data": {
                    "filename": "data.csv",
                    "format": "CSV",
                },
                "metrics": {
                    "schedule": "5s",
                },
            }),
        ))
    }
}
