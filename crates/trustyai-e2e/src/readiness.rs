//! Deployment readiness.
//!
//! ModelMesh restarts its serving pods once the TrustyAI operator has patched
//! in payload forwarding, so "ready" means: at least one pod carries the
//! forwarding env var, and every pod that carries it is `Running`.

use crate::cluster::{ClusterApi, PodObservation};
use crate::constants::PAYLOAD_PROCESSORS_ENV;
use crate::error::Result;
use crate::eventual::{no_errors_ignorable, poll_until_converged, Convergence, PollPolicy};
use std::fmt;
use tracing::{debug, info, instrument};

/// Container env var that identifies the pods a wait is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodMarker {
    pub env_name: String,
    /// When set, the variable's literal value must contain this substring.
    pub value_contains: Option<String>,
}

impl PodMarker {
    pub fn env(name: impl Into<String>) -> Self {
        Self {
            env_name: name.into(),
            value_contains: None,
        }
    }

    pub fn with_value_containing(mut self, fragment: impl Into<String>) -> Self {
        self.value_contains = Some(fragment.into());
        self
    }

    /// Marker for pods forwarding payloads to TrustyAI.
    pub fn payload_processors() -> Self {
        Self::env(PAYLOAD_PROCESSORS_ENV)
    }

    pub fn matches(&self, pod: &PodObservation) -> bool {
        pod.env.iter().any(|var| {
            var.name == self.env_name
                && match &self.value_contains {
                    None => true,
                    Some(fragment) => var
                        .value
                        .as_deref()
                        .is_some_and(|value| value.contains(fragment.as_str())),
                }
        })
    }
}

impl fmt::Display for PodMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value_contains {
            Some(fragment) => write!(f, "{}~'{}'", self.env_name, fragment),
            None => write!(f, "{}", self.env_name),
        }
    }
}

/// Pods observed in one readiness cycle.
#[derive(Debug, Default)]
struct Cycle {
    marked: Vec<PodObservation>,
    skipped: usize,
}

impl Cycle {
    fn evaluate(self, marker: &PodMarker) -> Convergence<Vec<String>> {
        if self.marked.is_empty() {
            return Convergence::Pending(format!(
                "no pods carrying {} observed ({} vanished mid-scan)",
                marker, self.skipped
            ));
        }

        let waiting: Vec<String> = self
            .marked
            .iter()
            .filter(|pod| !pod.is_running())
            .map(|pod| {
                format!(
                    "{} ({})",
                    pod.name,
                    pod.phase.as_deref().unwrap_or("Unknown")
                )
            })
            .collect();

        if waiting.is_empty() {
            Convergence::Converged(self.marked.into_iter().map(|pod| pod.name).collect())
        } else {
            Convergence::Pending(format!(
                "{} of {} pods carrying {} not running: {}",
                waiting.len(),
                self.marked.len(),
                marker,
                waiting.join(", ")
            ))
        }
    }
}

/// Inspect every pod in `namespace` once, keeping those that carry `marker`.
///
/// A pod deleted between the listing and its inspection is skipped for this
/// cycle; any other lookup failure aborts.
async fn observe(cluster: &dyn ClusterApi, namespace: &str, marker: &PodMarker) -> Result<Cycle> {
    let mut cycle = Cycle::default();

    for name in cluster.list_pods(namespace).await? {
        match cluster.get_pod(namespace, &name).await {
            Ok(pod) if marker.matches(&pod) => cycle.marked.push(pod),
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!(pod = %name, "Pod vanished between list and inspect, skipping");
                cycle.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(cycle)
}

/// Wait until some pod carries `marker` and every such pod is `Running`.
///
/// Returns the names of the marker pods from the converged cycle. If no pod
/// ever carries the marker this times out, and the timeout detail says so.
#[instrument(skip(cluster, marker, policy), fields(marker = %marker))]
pub async fn wait_for_marked_pods(
    cluster: &dyn ClusterApi,
    namespace: &str,
    marker: &PodMarker,
    policy: PollPolicy,
) -> Result<Vec<String>> {
    let what = format!("pods carrying {} in '{}' to be Running", marker, namespace);

    let pods = poll_until_converged(policy, &what, no_errors_ignorable, move || async move {
        Ok(observe(cluster, namespace, marker).await?.evaluate(marker))
    })
    .await?;

    info!(namespace = %namespace, pods = ?pods, "Marker pods running");
    Ok(pods)
}

/// Wait until a pod whose name contains `fragment` exists and is `Running`.
#[instrument(skip(cluster, policy))]
pub async fn wait_for_pod_named(
    cluster: &dyn ClusterApi,
    namespace: &str,
    fragment: &str,
    policy: PollPolicy,
) -> Result<String> {
    let what = format!("pod '*{}*' in '{}' to be Running", fragment, namespace);

    poll_until_converged(policy, &what, no_errors_ignorable, move || async move {
        let Some(name) = cluster
            .list_pods(namespace)
            .await?
            .into_iter()
            .find(|name| name.contains(fragment))
        else {
            return Ok(Convergence::Pending("no matching pod".to_string()));
        };

        match cluster.get_pod(namespace, &name).await {
            Ok(pod) if pod.is_running() => Ok(Convergence::Converged(name)),
            Ok(pod) => Ok(Convergence::Pending(format!(
                "{} is {}",
                name,
                pod.phase.as_deref().unwrap_or("Unknown")
            ))),
            Err(e) if e.is_not_found() => {
                Ok(Convergence::Pending(format!("{} vanished", name)))
            }
            Err(e) => Err(e),
        }
    })
    .await
}
