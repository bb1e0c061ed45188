//! Scoped resource lifecycle.
//!
//! A [`ResourceScope`] remembers every resource it created and deletes them
//! in reverse creation order on teardown. [`ResourceScope::run`] and
//! [`with_resources`] wrap a scenario body so teardown happens on every exit
//! path: success, error, or panic (re-raised once teardown is done).

use crate::cluster::ClusterApi;
use crate::error::Result;
use crate::eventual::{no_errors_ignorable, poll_until_converged, Convergence, PollPolicy};
use crate::resources::{ResourceDescriptor, ResourceKey, NAMESPACE};
use futures::FutureExt;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ResourceScope {
    cluster: Arc<dyn ClusterApi>,
    created: Vec<ResourceKey>,
    teardown_enabled: bool,
    /// Wait for deleted namespaces to disappear, with this budget.
    namespace_deletion: Option<PollPolicy>,
}

impl ResourceScope {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self {
            cluster,
            created: Vec::new(),
            teardown_enabled: true,
            namespace_deletion: None,
        }
    }

    /// Leave resources in place at teardown (for debugging a failed run).
    pub fn keep_resources(mut self, keep: bool) -> Self {
        self.teardown_enabled = !keep;
        self
    }

    /// Block teardown until deleted namespaces are fully gone.
    pub fn wait_for_namespace_deletion(mut self, policy: PollPolicy) -> Self {
        self.namespace_deletion = Some(policy);
        self
    }

    pub fn cluster(&self) -> &Arc<dyn ClusterApi> {
        &self.cluster
    }

    /// Resources created so far, in creation order.
    pub fn created(&self) -> &[ResourceKey] {
        &self.created
    }

    /// Apply `resource`, recording it for teardown only if this call created it.
    ///
    /// A resource that already existed is brought in line with the manifest
    /// but left in place at teardown.
    pub async fn create(&mut self, resource: &dyn ResourceDescriptor) -> Result<ResourceKey> {
        let key = resource.key();
        let preexisting = self.cluster.exists(&key).await?;
        self.cluster.apply(resource).await?;

        if preexisting {
            info!(resource = %key, "Updated existing resource, not owned by this scope");
        } else {
            info!(resource = %key, "Created");
            if !self.created.contains(&key) {
                self.created.push(key.clone());
            }
        }
        Ok(key)
    }

    /// Delete everything this scope created, newest first.
    ///
    /// Resources already gone are fine. Every deletion is attempted; the
    /// first failure is returned once all have been tried.
    pub async fn teardown(&mut self) -> Result<()> {
        if !self.teardown_enabled {
            info!(count = self.created.len(), "Teardown disabled, keeping resources");
            self.created.clear();
            return Ok(());
        }

        let mut first_error = None;

        while let Some(key) = self.created.pop() {
            match self.delete(&key).await {
                Ok(()) => {}
                Err(e) => {
                    warn!(resource = %key, error = %e, "Teardown failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        match self.cluster.delete(key).await {
            Ok(()) => debug!(resource = %key, "Deleted"),
            Err(e) if e.is_not_found() => {
                debug!(resource = %key, "Already gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if let (Some(policy), true) = (self.namespace_deletion, key.resource_type == NAMESPACE) {
            self.wait_until_gone(key, policy).await?;
        }
        Ok(())
    }

    async fn wait_until_gone(&self, key: &ResourceKey, policy: PollPolicy) -> Result<()> {
        let what = format!("{} to be deleted", key);
        let cluster = self.cluster.as_ref();

        poll_until_converged(policy, &what, no_errors_ignorable, move || async move {
            Ok(if cluster.exists(key).await? {
                Convergence::Pending("still present".to_string())
            } else {
                Convergence::Converged(())
            })
        })
        .await
    }

    /// Run `body`, then tear down whatever the scope created.
    ///
    /// The body's error wins over a teardown error. A panic in the body is
    /// resumed after teardown.
    pub async fn run<T, F, Fut>(mut self, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outcome = AssertUnwindSafe(body()).catch_unwind().await;
        let teardown = self.teardown().await;

        match outcome {
            Err(panic) => resume_unwind(panic),
            Ok(Err(e)) => {
                if let Err(teardown_error) = teardown {
                    warn!(error = %teardown_error, "Teardown also failed");
                }
                Err(e)
            }
            Ok(Ok(value)) => teardown.map(|()| value),
        }
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        if self.teardown_enabled && !self.created.is_empty() {
            warn!(
                resources = ?self.created.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Resource scope dropped without teardown"
            );
        }
    }
}

/// Create `resources` in order, run `body`, then delete them in reverse.
///
/// If a creation fails, the resources created before it are torn down and
/// the creation error is returned without running the body.
pub async fn with_resources<T, F, Fut>(
    cluster: Arc<dyn ClusterApi>,
    resources: &[&dyn ResourceDescriptor],
    body: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut scope = ResourceScope::new(cluster);
    create_all(&mut scope, resources).await?;
    scope.run(body).await
}

/// Create each resource in turn; on the first failure, tear down and fail.
pub(crate) async fn create_all(
    scope: &mut ResourceScope,
    resources: &[&dyn ResourceDescriptor],
) -> Result<()> {
    for resource in resources {
        if let Err(e) = scope.create(*resource).await {
            if let Err(teardown_error) = scope.teardown().await {
                warn!(error = %teardown_error, "Teardown after failed create also failed");
            }
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cluster::fake::FakeCluster;
    use crate::error::HarnessError;
    use crate::resources::{ConfigMap, MinioService, Namespace, ServiceAccount};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn namespace() -> Namespace {
        Namespace::modelmesh_enabled("model-namespace")
    }

    fn service_account() -> ServiceAccount {
        ServiceAccount {
            name: "modelmesh-serving-sa".to_string(),
            namespace: "model-namespace".to_string(),
        }
    }

    fn minio_service() -> MinioService {
        MinioService {
            name: "minio".to_string(),
            namespace: "model-namespace".to_string(),
            port: 9000,
            target_port: 9000,
        }
    }

    fn kinds(keys: &[ResourceKey]) -> Vec<&'static str> {
        keys.iter().map(|k| k.resource_type.kind).collect()
    }

    #[tokio::test]
    async fn test_teardown_in_reverse_order() {
        let cluster = Arc::new(FakeCluster::new());
        let (ns, sa, svc) = (namespace(), service_account(), minio_service());

        let value = with_resources(cluster.clone(), &[&ns, &sa, &svc], || async { Ok(42) })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(cluster.applied_kinds(), vec!["Namespace", "ServiceAccount", "Service"]);
        assert_eq!(
            kinds(&cluster.deleted()),
            vec!["Service", "ServiceAccount", "Namespace"]
        );
    }

    #[tokio::test]
    async fn test_teardown_runs_when_body_fails() {
        let cluster = Arc::new(FakeCluster::new());
        let (ns, sa) = (namespace(), service_account());

        let err = with_resources(cluster.clone(), &[&ns, &sa], || async {
            Err::<(), _>(HarnessError::Exec("assertion in scenario".to_string()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, HarnessError::Exec(_)));
        assert_eq!(cluster.deleted().len(), 2);
    }

    #[tokio::test]
    async fn test_teardown_runs_when_body_panics() {
        let cluster = Arc::new(FakeCluster::new());
        let ns = namespace();

        let outcome = AssertUnwindSafe(with_resources(cluster.clone(), &[&ns], || async {
            assert_eq!(1, 2, "scenario assertion");
            Ok(())
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert_eq!(kinds(&cluster.deleted()), vec!["Namespace"]);
    }

    #[tokio::test]
    async fn test_failed_create_tears_down_earlier_resources() {
        let cluster = Arc::new(FakeCluster::new().fail_apply_for("Service"));
        let (ns, sa, svc) = (namespace(), service_account(), minio_service());
        let body_ran = AtomicBool::new(false);
        let flag = &body_ran;

        let err = with_resources(cluster.clone(), &[&ns, &sa, &svc], move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, HarnessError::InvalidResource(_)));
        assert!(!body_ran.load(Ordering::SeqCst));
        assert_eq!(kinds(&cluster.deleted()), vec!["ServiceAccount", "Namespace"]);
    }

    #[tokio::test]
    async fn test_already_deleted_is_tolerated() {
        let cluster = Arc::new(FakeCluster::new());
        let mut scope = ResourceScope::new(cluster.clone());
        let sa = service_account();
        let key = scope.create(&sa).await.unwrap();

        cluster.delete(&key).await.unwrap();

        scope.teardown().await.unwrap();
        assert!(scope.created().is_empty());
    }

    #[tokio::test]
    async fn test_keep_resources_skips_deletion() {
        let cluster = Arc::new(FakeCluster::new());
        let mut scope = ResourceScope::new(cluster.clone()).keep_resources(true);
        scope.create(&namespace()).await.unwrap();

        scope.teardown().await.unwrap();

        assert!(cluster.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_namespace_deletion_wait() {
        let cluster = Arc::new(FakeCluster::new());
        let mut scope = ResourceScope::new(cluster.clone()).wait_for_namespace_deletion(
            PollPolicy::new(Duration::from_millis(10), Duration::from_millis(200)),
        );
        scope.create(&namespace()).await.unwrap();

        scope.teardown().await.unwrap();

        assert_eq!(cluster.namespace_phase("model-namespace").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_preexisting_resource_survives_teardown() {
        let cluster = Arc::new(FakeCluster::new());
        let monitoring = ConfigMap::cluster_monitoring().unwrap();
        cluster.apply(&monitoring).await.unwrap();

        let mut scope = ResourceScope::new(cluster.clone());
        scope.create(&monitoring).await.unwrap();
        scope.create(&service_account()).await.unwrap();
        scope.teardown().await.unwrap();

        assert_eq!(kinds(&cluster.deleted()), vec!["ServiceAccount"]);
        assert!(cluster.exists(&monitoring.key()).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_create_recorded_once() {
        let cluster = Arc::new(FakeCluster::new());
        let mut scope = ResourceScope::new(cluster.clone());
        let sa = service_account();

        scope.create(&sa).await.unwrap();
        scope.create(&sa).await.unwrap();
        assert_eq!(scope.created().len(), 1);

        scope.teardown().await.unwrap();
    }
}
