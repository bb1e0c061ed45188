//! kube-rs implementation of [`ClusterApi`].

use super::{ClusterApi, PodObservation, Route};
use crate::constants::FIELD_MANAGER;
use crate::error::{HarnessError, Result};
use crate::resources::{ResourceDescriptor, ResourceKey, ResourceType, ROUTE};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::{
    Api, AttachParams, DeleteParams, DynamicObject, ListParams, Patch, PatchParams,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, trace};

/// Connection timeout for the API server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout for API calls.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

fn api_resource(resource_type: ResourceType) -> ApiResource {
    ApiResource {
        group: resource_type.group.to_string(),
        version: resource_type.version.to_string(),
        api_version: resource_type.api_version(),
        kind: resource_type.kind.to_string(),
        plural: resource_type.plural.to_string(),
    }
}

/// Map a 404 from the API server to a NotFound naming what was looked up.
fn not_found_or(err: kube::Error, kind: &str, name: &str, namespace: &str) -> HarnessError {
    match err {
        kube::Error::Api(ref response) if response.code == 404 => {
            HarnessError::not_found(kind, name, namespace)
        }
        other => HarnessError::Kube(other),
    }
}

/// Cluster access through the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using an explicit kubeconfig, or the inferred configuration
    /// (`KUBECONFIG`, `~/.kube/config`, in-cluster) when `None`.
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        let mut config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    HarnessError::Connection(format!(
                        "failed to read kubeconfig {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        HarnessError::Connection(format!("failed to load kubeconfig: {}", e))
                    })?
            }
            None => Config::infer().await.map_err(|e| {
                HarnessError::Connection(format!("failed to infer config: {}", e))
            })?,
        };
        config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
        config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

        let client = Client::try_from(config).map_err(|e| {
            HarnessError::Connection(format!("failed to create client: {}", e))
        })?;

        Ok(Self::new(client))
    }

    fn dynamic_api(&self, resource_type: ResourceType, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = api_resource(resource_type);
        match namespace {
            Some(ns) if resource_type.namespaced => {
                Api::namespaced_with(self.client.clone(), ns, &ar)
            }
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    #[instrument(skip_all, fields(resource = %resource.key()))]
    async fn apply(&self, resource: &dyn ResourceDescriptor) -> Result<()> {
        let manifest = resource.to_manifest()?;
        let api = self.dynamic_api(resource.resource_type(), resource.namespace());

        api.patch(
            resource.name(),
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&manifest),
        )
        .await?;

        debug!("Applied resource");
        Ok(())
    }

    #[instrument(skip_all, fields(resource = %key))]
    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        let api = self.dynamic_api(key.resource_type, key.namespace.as_deref());

        api.delete(&key.name, &DeleteParams::default())
            .await
            .map_err(|e| {
                not_found_or(
                    e,
                    key.resource_type.kind,
                    &key.name,
                    key.namespace.as_deref().unwrap_or_default(),
                )
            })?;

        debug!("Deleted resource");
        Ok(())
    }

    async fn exists(&self, key: &ResourceKey) -> Result<bool> {
        let api = self.dynamic_api(key.resource_type, key.namespace.as_deref());
        Ok(api.get_opt(&key.name).await?.is_some())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>> {
        let pods = self.pods(namespace).list(&ListParams::default()).await?;
        let names: Vec<String> = pods
            .items
            .into_iter()
            .filter_map(|pod| pod.metadata.name)
            .collect();

        trace!(namespace = %namespace, count = names.len(), "Listed pods");
        Ok(names)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodObservation> {
        let pod = self
            .pods(namespace)
            .get(name)
            .await
            .map_err(|e| not_found_or(e, "Pod", name, namespace))?;

        Ok(PodObservation::from(&pod))
    }

    #[instrument(skip(self, command), fields(namespace = %namespace))]
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<String> {
        let params = AttachParams::default()
            .container(container)
            .stdin(false)
            .stdout(true)
            .stderr(false);

        let mut attached = self
            .pods(namespace)
            .exec(pod, command.to_vec(), &params)
            .await
            .map_err(|e| not_found_or(e, "Pod", pod, namespace))?;

        let status = attached.take_status();

        let mut stdout = String::new();
        if let Some(mut reader) = attached.stdout() {
            reader.read_to_string(&mut stdout).await?;
        }

        if let Some(status) = status {
            if let Some(status) = status.await {
                if status.status.as_deref() == Some("Failure") {
                    return Err(HarnessError::Exec(format!(
                        "command in {}/{} failed: {}",
                        pod,
                        container,
                        status.message.unwrap_or_default()
                    )));
                }
            }
        }

        attached
            .join()
            .await
            .map_err(|e| HarnessError::Exec(e.to_string()))?;

        Ok(stdout)
    }

    async fn get_route(&self, namespace: &str, name: &str) -> Result<Route> {
        let route = self
            .dynamic_api(ROUTE, Some(namespace))
            .get_opt(name)
            .await?
            .ok_or_else(|| HarnessError::not_found(ROUTE.kind, name, namespace))?;

        Route::from_object(name, &route.data)
    }

    async fn namespace_phase(&self, name: &str) -> Result<Option<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        Ok(namespaces
            .get_opt(name)
            .await?
            .and_then(|ns| ns.status)
            .and_then(|status| status.phase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{INFERENCE_SERVICE, NAMESPACE};

    #[test]
    fn test_api_resource_for_custom_resource() {
        let ar = api_resource(INFERENCE_SERVICE);
        assert_eq!(ar.group, "serving.kserve.io");
        assert_eq!(ar.version, "v1beta1");
        assert_eq!(ar.api_version, "serving.kserve.io/v1beta1");
        assert_eq!(ar.plural, "inferenceservices");
    }

    #[test]
    fn test_api_resource_for_core_resource() {
        let ar = api_resource(NAMESPACE);
        assert_eq!(ar.group, "");
        assert_eq!(ar.api_version, "v1");
        assert_eq!(ar.kind, "Namespace");
    }

    #[test]
    fn test_not_found_mapping() {
        let err = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "pods \"p\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        let mapped = not_found_or(err, "Pod", "p", "ns");
        assert!(matches!(mapped, HarnessError::NotFound { .. }));
    }
}
