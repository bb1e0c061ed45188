//! Full loan-model deployment: namespace, monitoring, TrustyAI, MinIO, the
//! OVMS runtime and the inference service, provisioned in order and torn
//! down in reverse.

use crate::auth::TokenProvider;
use crate::cluster::{ClusterApi, NAMESPACE_PHASE_ACTIVE};
use crate::config::HarnessConfig;
use crate::constants::{
    LOAN_MODEL_ALPHA, LOAN_MODEL_ALPHA_PATH, MINIO, MINIO_IMAGE, MINIO_PORT,
    MODELMESH_SERVICE_ACCOUNT, ONNX, OVMS_POD_NAME_FRAGMENT, TRUSTYAI_SERVICE,
};
use crate::error::Result;
use crate::eventual::{no_errors_ignorable, poll_until_converged, ConsistencyCategory, Convergence};
use crate::fixtures::TrustyAiClient;
use crate::lifecycle::{create_all, ResourceScope};
use crate::propagation::{DeliveryReport, InferenceSender, ModelMetadataCounter};
use crate::readiness::{wait_for_marked_pods, wait_for_pod_named, PodMarker};
use crate::resources::{
    ConfigMap, InferenceService, MinioPod, MinioSecret, MinioService, Namespace,
    ResourceDescriptor, ServiceAccount, ServingRuntime, TrustyAiService,
};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Every resource of the loan-model scenario, in creation order.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub namespace: Namespace,
    /// Cluster-wide monitoring config maps; empty when not managed.
    pub monitoring: Vec<ConfigMap>,
    pub service_account: ServiceAccount,
    pub trustyai: TrustyAiService,
    pub minio_service: MinioService,
    pub minio_pod: MinioPod,
    pub minio_secret: MinioSecret,
    pub runtime: ServingRuntime,
    pub inference_service: InferenceService,
}

impl DeploymentPlan {
    /// The `demo-loan-nn-onnx-alpha` model served by OVMS from MinIO.
    pub fn loan_model(config: &HarnessConfig) -> Result<Self> {
        let ns = config.namespace.as_str();

        let monitoring = if config.manage_monitoring_config {
            vec![
                ConfigMap::cluster_monitoring()?,
                ConfigMap::user_workload_monitoring()?,
            ]
        } else {
            Vec::new()
        };

        let minio_secret = MinioSecret::data_connection(ns);
        let runtime = ServingRuntime::ovms(ns);

        let inference_service = InferenceService {
            name: LOAN_MODEL_ALPHA.to_string(),
            namespace: ns.to_string(),
            model_format: ONNX.to_string(),
            runtime: runtime.name.clone(),
            storage_key: minio_secret.name.clone(),
            storage_path: LOAN_MODEL_ALPHA_PATH.to_string(),
        };

        Ok(Self {
            namespace: Namespace::modelmesh_enabled(ns),
            monitoring,
            service_account: ServiceAccount {
                name: MODELMESH_SERVICE_ACCOUNT.to_string(),
                namespace: ns.to_string(),
            },
            trustyai: TrustyAiService::new(TRUSTYAI_SERVICE, ns),
            minio_service: MinioService {
                name: MINIO.to_string(),
                namespace: ns.to_string(),
                port: MINIO_PORT,
                target_port: MINIO_PORT,
            },
            minio_pod: MinioPod {
                name: MINIO.to_string(),
                namespace: ns.to_string(),
                image: MINIO_IMAGE.to_string(),
            },
            minio_secret,
            runtime,
            inference_service,
        })
    }

    /// Resources after the namespace, in creation order.
    fn namespaced_resources(&self) -> Vec<&dyn ResourceDescriptor> {
        let mut resources: Vec<&dyn ResourceDescriptor> = self
            .monitoring
            .iter()
            .map(|cm| cm as &dyn ResourceDescriptor)
            .collect();
        resources.push(&self.service_account);
        resources.push(&self.trustyai);
        resources.push(&self.minio_service);
        resources.push(&self.minio_pod);
        resources.push(&self.minio_secret);
        resources.push(&self.runtime);
        resources.push(&self.inference_service);
        resources
    }

    /// All resources in creation order.
    pub fn resources(&self) -> Vec<&dyn ResourceDescriptor> {
        let mut resources: Vec<&dyn ResourceDescriptor> = vec![&self.namespace];
        resources.extend(self.namespaced_resources());
        resources
    }
}

/// Handle on a provisioned deployment, passed to scenario bodies.
#[derive(Clone)]
pub struct DeployedScenario {
    cluster: Arc<dyn ClusterApi>,
    tokens: Arc<dyn TokenProvider>,
    config: HarnessConfig,
    model: String,
    trustyai: TrustyAiClient,
}

impl DeployedScenario {
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Name of the inference service (and of its route).
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn cluster(&self) -> &Arc<dyn ClusterApi> {
        &self.cluster
    }

    pub fn trustyai(&self) -> &TrustyAiClient {
        &self.trustyai
    }

    /// Wait for the model-server pod, then for payload forwarding to be
    /// wired into every ModelMesh pod.
    ///
    /// Both stages share one readiness budget.
    #[instrument(skip(self), fields(namespace = %self.config.namespace))]
    pub async fn wait_until_ready(&self) -> Result<Vec<String>> {
        let policy = self.config.readiness_policy();
        let started = Instant::now();

        wait_for_pod_named(
            self.cluster.as_ref(),
            self.namespace(),
            OVMS_POD_NAME_FRAGMENT,
            policy,
        )
        .await?;

        wait_for_marked_pods(
            self.cluster.as_ref(),
            self.namespace(),
            &PodMarker::env(&self.config.payload_marker),
            policy.remaining_after(started.elapsed()),
        )
        .await
    }

    /// Send the configured payload directory to the model, checking each
    /// payload against TrustyAI's model metadata.
    pub async fn send_training_data(&self) -> Result<DeliveryReport> {
        let sender = InferenceSender::new(
            self.cluster.clone(),
            self.tokens.clone(),
            Arc::new(ModelMetadataCounter::new(self.trustyai.clone())),
        )?;

        sender
            .send_data_to_inference_service(self.namespace(), &self.model, &self.config.data_dir)
            .await
    }
}

/// Provisioner for [`DeploymentPlan`]s.
pub struct Deployment {
    cluster: Arc<dyn ClusterApi>,
    tokens: Arc<dyn TokenProvider>,
    config: HarnessConfig,
    plan: DeploymentPlan,
}

impl Deployment {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        tokens: Arc<dyn TokenProvider>,
        config: HarnessConfig,
        plan: DeploymentPlan,
    ) -> Self {
        Self {
            cluster,
            tokens,
            config,
            plan,
        }
    }

    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    /// Provision the plan, run `body` against it, and tear everything down.
    ///
    /// Teardown runs whether provisioning fails part-way, the body fails, or
    /// the body panics, unless the configuration keeps resources.
    #[instrument(skip_all, fields(namespace = %self.config.namespace))]
    pub async fn run<T, F, Fut>(self, body: F) -> Result<T>
    where
        F: FnOnce(DeployedScenario) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let scenario = DeployedScenario {
            cluster: self.cluster.clone(),
            tokens: self.tokens.clone(),
            config: self.config.clone(),
            model: self.plan.inference_service.name.clone(),
            trustyai: TrustyAiClient::new(
                self.cluster.clone(),
                self.tokens.clone(),
                self.config.namespace.clone(),
            )?,
        };

        let mut scope = ResourceScope::new(self.cluster.clone())
            .keep_resources(!self.config.teardown)
            .wait_for_namespace_deletion(ConsistencyCategory::NamespaceDeletion.policy());

        if let Err(e) = self.provision(&mut scope).await {
            if let Err(teardown_error) = scope.teardown().await {
                warn!(error = %teardown_error, "Teardown after failed provisioning also failed");
            }
            return Err(e);
        }

        scope.run(|| body(scenario)).await
    }

    async fn provision(&self, scope: &mut ResourceScope) -> Result<()> {
        scope.create(&self.plan.namespace).await?;
        self.wait_for_namespace_active().await?;

        create_all(scope, &self.plan.namespaced_resources()).await?;

        info!(resources = scope.created().len(), "Deployment provisioned");
        Ok(())
    }

    async fn wait_for_namespace_active(&self) -> Result<()> {
        let name = self.plan.namespace.name.as_str();
        let cluster = self.cluster.as_ref();
        let what = format!("namespace '{}' to be {}", name, NAMESPACE_PHASE_ACTIVE);

        poll_until_converged(
            ConsistencyCategory::NamespaceActive.policy(),
            &what,
            no_errors_ignorable,
            move || async move {
                Ok(match cluster.namespace_phase(name).await? {
                    Some(phase) if phase == NAMESPACE_PHASE_ACTIVE => Convergence::Converged(()),
                    Some(phase) => Convergence::Pending(format!("phase {}", phase)),
                    None => Convergence::Pending("not created yet".to_string()),
                })
            },
        )
        .await
    }
}
