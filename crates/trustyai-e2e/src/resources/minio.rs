//! In-namespace MinIO object store holding the example models.

use super::{string_map, typed_manifest, ResourceDescriptor, ResourceType, POD, SECRET, SERVICE};
use crate::constants::{MINIO, MINIO_DATA_CONNECTION, MINIO_PORT};
use crate::error::Result;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, Pod, PodSpec, Secret, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::collections::BTreeMap;

/// Access key baked into the example MinIO image.
const EXAMPLE_ACCESS_KEY: &str = "THEACCESSKEY";
const EXAMPLE_SECRET_KEY: &str = "THESECRETKEY";
const EXAMPLE_BUCKET: &str = "modelmesh-example-models";
const EXAMPLE_REGION: &str = "us-south";

fn app_labels() -> BTreeMap<String, String> {
    string_map([("app", MINIO), ("maistra.io/expose-route", "true")])
}

/// S3 data-connection secret pointing ModelMesh at the MinIO bucket.
///
/// Values are plain text; they are base64-encoded when rendered.
#[derive(Debug, Clone)]
pub struct MinioSecret {
    pub name: String,
    pub namespace: String,
    pub aws_access_key_id: String,
    pub aws_default_region: String,
    pub aws_s3_bucket: String,
    pub aws_s3_endpoint: String,
    pub aws_secret_access_key: SecretString,
}

impl MinioSecret {
    /// Data connection for the example MinIO deployment in `namespace`.
    pub fn data_connection(namespace: impl Into<String>) -> Self {
        Self {
            name: MINIO_DATA_CONNECTION.to_string(),
            namespace: namespace.into(),
            aws_access_key_id: EXAMPLE_ACCESS_KEY.to_string(),
            aws_default_region: EXAMPLE_REGION.to_string(),
            aws_s3_bucket: EXAMPLE_BUCKET.to_string(),
            aws_s3_endpoint: format!("http://{}:{}", MINIO, MINIO_PORT),
            aws_secret_access_key: SecretString::from(EXAMPLE_SECRET_KEY.to_string()),
        }
    }
}

impl ResourceDescriptor for MinioSecret {
    fn resource_type(&self) -> ResourceType {
        SECRET
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn to_manifest(&self) -> Result<Value> {
        let bytes = |value: &str| ByteString(value.as_bytes().to_vec());

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(string_map([
                    ("opendatahub.io/dashboard", "true"),
                    ("opendatahub.io/managed", "true"),
                ])),
                annotations: Some(string_map([
                    ("opendatahub.io/connection-type", "s3"),
                    ("openshift.io/display-name", "Minio Data Connection"),
                ])),
                ..Default::default()
            },
            data: Some(BTreeMap::from([
                ("AWS_ACCESS_KEY_ID".to_string(), bytes(&self.aws_access_key_id)),
                ("AWS_DEFAULT_REGION".to_string(), bytes(&self.aws_default_region)),
                ("AWS_S3_BUCKET".to_string(), bytes(&self.aws_s3_bucket)),
                ("AWS_S3_ENDPOINT".to_string(), bytes(&self.aws_s3_endpoint)),
                (
                    "AWS_SECRET_ACCESS_KEY".to_string(),
                    bytes(self.aws_secret_access_key.expose_secret()),
                ),
            ])),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        };

        typed_manifest(SECRET, &secret)
    }
}

/// Single MinIO server pod serving the example model bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinioPod {
    pub name: String,
    pub namespace: String,
    pub image: String,
}

impl ResourceDescriptor for MinioPod {
    fn resource_type(&self) -> ResourceType {
        POD
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn to_manifest(&self) -> Result<Value> {
        let env = |name: &str, value: &str| EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..Default::default()
        };

        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(app_labels()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: MINIO.to_string(),
                    image: Some(self.image.clone()),
                    args: Some(vec!["server".to_string(), "/data1".to_string()]),
                    env: Some(vec![
                        env("MINIO_ACCESS_KEY", EXAMPLE_ACCESS_KEY),
                        env("MINIO_SECRET_KEY", EXAMPLE_SECRET_KEY),
                    ]),
                    ports: Some(vec![ContainerPort {
                        container_port: MINIO_PORT,
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };

        typed_manifest(POD, &pod)
    }
}

/// ClusterIP service in front of the MinIO pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinioService {
    pub name: String,
    pub namespace: String,
    pub port: i32,
    pub target_port: i32,
}

impl ResourceDescriptor for MinioService {
    fn resource_type(&self) -> ResourceType {
        SERVICE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn to_manifest(&self) -> Result<Value> {
        let service = Service {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(vec![ServicePort {
                    name: Some("minio-client-port".to_string()),
                    port: self.port,
                    protocol: Some("TCP".to_string()),
                    target_port: Some(IntOrString::Int(self.target_port)),
                    ..Default::default()
                }]),
                selector: Some(string_map([("app", MINIO)])),
                ..Default::default()
            }),
            ..Default::default()
        };

        typed_manifest(SERVICE, &service)
    }
}
