//! Confirming that inference payloads reach TrustyAI.
//!
//! Each payload file is posted to the model's inference route between two
//! reads of TrustyAI's datapoint counter for that model. Delivery counts only
//! if the counter strictly increased.

use crate::auth::{get_route, TokenProvider};
use crate::cluster::{find_pod, ClusterApi};
use crate::constants::{INFERENCE_ENDPOINT, TRUSTYAI_SERVICE, TRUSTYAI_STORAGE_FOLDER};
use crate::error::{HarnessError, Result};
use crate::fixtures::TrustyAiClient;
use crate::http::{bearer, insecure_client, ServiceResponse};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Source of the number of observations TrustyAI has ingested for a model.
#[async_trait]
pub trait DatapointCounter: Send + Sync {
    async fn observations(&self, model_id: &str) -> Result<u64>;
}

/// Reads the counter from TrustyAI's model metadata (`GET /info`).
///
/// An unreachable service or a non-2xx answer is an error; only a model
/// missing from an otherwise valid answer counts as 0.
#[derive(Clone)]
pub struct ModelMetadataCounter {
    client: TrustyAiClient,
}

impl ModelMetadataCounter {
    pub fn new(client: TrustyAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DatapointCounter for ModelMetadataCounter {
    async fn observations(&self, model_id: &str) -> Result<u64> {
        self.client.observations(model_id).await
    }
}

const METADATA_READ_SCRIPT: &str = r#"[ -e "$0" ] || exit 0; cat "$0""#;

/// Reads the counter from the metadata file TrustyAI keeps on its volume,
/// by exec'ing into the service pod.
pub struct PodStorageCounter {
    cluster: Arc<dyn ClusterApi>,
    namespace: String,
    pod: String,
}

impl PodStorageCounter {
    /// Locate the TrustyAI pod in `namespace`; fails with NotFound if there is
    /// none.
    pub async fn locate(cluster: Arc<dyn ClusterApi>, namespace: &str) -> Result<Self> {
        let pod = find_pod(cluster.as_ref(), namespace, TRUSTYAI_SERVICE).await?;
        debug!(pod = %pod, "Found TrustyAI pod");
        Ok(Self {
            cluster,
            namespace: namespace.to_string(),
            pod,
        })
    }

    fn metadata_path(model_id: &str) -> String {
        format!("{}/{}-metadata.json", TRUSTYAI_STORAGE_FOLDER, model_id)
    }
}

#[async_trait]
impl DatapointCounter for PodStorageCounter {
    async fn observations(&self, model_id: &str) -> Result<u64> {
        // Path goes in as $0 so it is never parsed by the shell. Only a
        // missing file reads as empty; any other cat failure exits non-zero.
        let command = vec![
            "bash".to_string(),
            "-c".to_string(),
            METADATA_READ_SCRIPT.to_string(),
            Self::metadata_path(model_id),
        ];

        let output = self
            .cluster
            .exec(&self.namespace, &self.pod, TRUSTYAI_SERVICE, &command)
            .await?;

        if output.trim().is_empty() {
            return Ok(0);
        }

        let metadata: Value = serde_json::from_str(&output)?;
        Ok(metadata
            .get("observations")
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}

/// Outcome of sending a directory of payloads.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Inference responses for payloads TrustyAI ingested, in send order.
    pub successes: Vec<ServiceResponse>,
    /// One description per payload TrustyAI did not ingest, in send order.
    pub failures: Vec<String>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Successes, and the failures only if there were any.
    pub fn into_parts(self) -> (Vec<ServiceResponse>, Option<Vec<String>>) {
        let failures = (!self.failures.is_empty()).then_some(self.failures);
        (self.successes, failures)
    }
}

/// Failure recorded when a payload's counter did not increase.
pub fn not_received(file_name: &str) -> String {
    format!("Data from file {} not received by TrustyAI service", file_name)
}

/// Regular files directly under `dir`, sorted by file name.
///
/// Symlinks are followed; a dangling one is skipped like any other
/// non-file entry.
pub async fn payload_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_file = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.is_file(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Skipping dangling entry");
                false
            }
            Err(e) => return Err(e.into()),
        };
        if is_file {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Posts payload files to an inference service and checks TrustyAI saw them.
pub struct InferenceSender {
    cluster: Arc<dyn ClusterApi>,
    tokens: Arc<dyn TokenProvider>,
    counter: Arc<dyn DatapointCounter>,
    http_client: reqwest::Client,
}

impl InferenceSender {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        tokens: Arc<dyn TokenProvider>,
        counter: Arc<dyn DatapointCounter>,
    ) -> Result<Self> {
        Ok(Self {
            cluster,
            tokens,
            counter,
            http_client: insecure_client()?,
        })
    }

    /// Send every regular file in `data_dir` to the inference service named
    /// `model` and record which ones TrustyAI ingested.
    ///
    /// The inference route and the token are resolved once up front. Counter
    /// and transport failures abort the run; a counter that fails to increase
    /// is recorded in the report.
    #[instrument(skip(self, data_dir), fields(data_dir = %data_dir.display()))]
    pub async fn send_data_to_inference_service(
        &self,
        namespace: &str,
        model: &str,
        data_dir: &Path,
    ) -> Result<DeliveryReport> {
        let route = get_route(self.cluster.as_ref(), namespace, model).await?;
        let token = self.tokens.token().await?;
        let url = route.url(INFERENCE_ENDPOINT);

        let mut report = DeliveryReport::default();

        for path in payload_files(data_dir).await? {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    HarnessError::InvalidResource(format!("no file name in {}", path.display()))
                })?;

            let before = self.counter.observations(model).await?;
            let payload = tokio::fs::read(&path).await?;

            let response = self
                .http_client
                .post(&url)
                .header(AUTHORIZATION, bearer(&token))
                .body(payload)
                .send()
                .await?;
            let response = ServiceResponse::read(response).await?;

            let after = self.counter.observations(model).await?;

            if after > before {
                debug!(file = %file_name, before, after, status = %response.status, "Payload ingested");
                report.successes.push(response);
            } else {
                warn!(file = %file_name, before, after, status = %response.status, "Payload not ingested");
                report.failures.push(not_received(&file_name));
            }
        }

        info!(
            model = %model,
            delivered = report.successes.len(),
            failed = report.failures.len(),
            "Finished sending payloads"
        );
        Ok(report)
    }
}
