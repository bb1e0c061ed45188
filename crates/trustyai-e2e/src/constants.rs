//! Fixed identifiers shared by the resource builders, clients and scenarios.

// Serving runtime
pub const OVMS: &str = "ovms";
pub const OVMS_RUNTIME: &str = "ovms-1.x";
pub const OVMS_QUAY_IMAGE: &str = "quay.io/opendatahub/openvino_model_server:stable";
pub const OPENVINO_MODEL_FORMAT: &str = "openvino_ir";

/// Name fragment of the model-server pods ModelMesh schedules for the OVMS runtime.
pub const OVMS_POD_NAME_FRAGMENT: &str = "modelmesh-serving-ovms-1.x";

// Model format
pub const ONNX: &str = "onnx";

// API groups
pub const KSERVE_API_GROUP: &str = "serving.kserve.io";
pub const TRUSTYAI_API_GROUP: &str = "trustyai.opendatahub.io";
pub const ROUTE_API_GROUP: &str = "route.openshift.io";

// TrustyAI
pub const TRUSTYAI_SERVICE: &str = "trustyai-service";
pub const TRUSTYAI_IMAGE: &str = "quay.io/trustyaiservice/trustyai-service";
pub const TRUSTYAI_IMAGE_TAG: &str = "latest";

/// Directory on the TrustyAI PVC holding ingested data and per-model metadata.
pub const TRUSTYAI_STORAGE_FOLDER: &str = "/inputs";

// TrustyAI endpoints
pub const TRUSTYAI_SPD_ENDPOINT: &str = "/metrics/group/fairness/spd/";
pub const TRUSTYAI_NAMES_ENDPOINT: &str = "/info/names";
pub const TRUSTYAI_MODEL_METADATA_ENDPOINT: &str = "/info";

// Inference service
pub const INFERENCE_ENDPOINT: &str = "/infer";
pub const MODELMESH_SERVICE_ACCOUNT: &str = "modelmesh-serving-sa";

/// Env var the TrustyAI operator injects into ModelMesh pods once payload
/// forwarding to the TrustyAI service has been configured.
pub const PAYLOAD_PROCESSORS_ENV: &str = "MM_PAYLOAD_PROCESSORS";

// MinIO
pub const MINIO: &str = "minio";
pub const MINIO_IMAGE: &str = "quay.io/trustyai/modelmesh-minio-examples:gauss";
pub const MINIO_PORT: i32 = 9000;
pub const MINIO_DATA_CONNECTION: &str = "aws-connection-minio-data-connection";

// Loan model scenario
pub const DEFAULT_MODEL_NAMESPACE: &str = "model-namespace";
pub const LOAN_MODEL_ALPHA: &str = "demo-loan-nn-onnx-alpha";
pub const LOAN_MODEL_ALPHA_PATH: &str = "onnx/loan_model_alpha_august.onnx";

// Cluster monitoring
pub const CLUSTER_MONITORING_NAMESPACE: &str = "openshift-monitoring";
pub const CLUSTER_MONITORING_CONFIG: &str = "cluster-monitoring-config";
pub const USER_WORKLOAD_MONITORING_NAMESPACE: &str = "openshift-user-workload-monitoring";
pub const USER_WORKLOAD_MONITORING_CONFIG: &str = "user-workload-monitoring-config";

/// Field manager recorded on every server-side apply issued by the harness.
pub const FIELD_MANAGER: &str = "trustyai-e2e";
