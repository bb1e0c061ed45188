//! In-memory [`ClusterApi`] for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{ClusterApi, EnvVarObservation, PodObservation, Route};
use crate::error::{HarnessError, Result};
use crate::resources::{ResourceDescriptor, ResourceKey};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

type ExecHandler = Box<dyn Fn(&str, &[String]) -> Result<String> + Send + Sync>;

#[derive(Default)]
struct State {
    /// Pod sets returned by successive `list_pods` calls; the last one repeats.
    pod_snapshots: Vec<Vec<PodObservation>>,
    list_calls: usize,
    /// Pods that show up in listings but are gone by the time they are inspected.
    vanished: BTreeSet<String>,
    routes: BTreeMap<String, Route>,
    namespace_phases: BTreeMap<String, String>,
    existing: Vec<ResourceKey>,
    applied: Vec<Value>,
    deleted: Vec<ResourceKey>,
    fail_apply_kind: Option<&'static str>,
    exec_handler: Option<ExecHandler>,
}

#[derive(Default)]
pub(crate) struct FakeCluster {
    state: Mutex<State>,
}

pub(crate) fn pod(name: &str, phase: &str, env: &[(&str, &str)]) -> PodObservation {
    PodObservation {
        name: name.to_string(),
        phase: Some(phase.to_string()),
        env: env
            .iter()
            .map(|(k, v)| EnvVarObservation {
                container: "mm".to_string(),
                name: k.to_string(),
                value: Some(v.to_string()),
            })
            .collect(),
    }
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_pods(self, pods: Vec<PodObservation>) -> Self {
        self.push_snapshot(pods);
        self
    }

    pub(crate) fn push_snapshot(&self, pods: Vec<PodObservation>) {
        self.state.lock().unwrap().pod_snapshots.push(pods);
    }

    pub(crate) fn vanish(&self, pod: &str) {
        self.state.lock().unwrap().vanished.insert(pod.to_string());
    }

    pub(crate) fn with_route(self, namespace: &str, route: Route) -> Self {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(format!("{}/{}", namespace, route.name), route);
        self
    }

    pub(crate) fn fail_apply_for(self, kind: &'static str) -> Self {
        self.state.lock().unwrap().fail_apply_kind = Some(kind);
        self
    }

    pub(crate) fn on_exec<F>(self, handler: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<String> + Send + Sync + 'static,
    {
        self.state.lock().unwrap().exec_handler = Some(Box::new(handler));
        self
    }

    pub(crate) fn applied(&self) -> Vec<Value> {
        self.state.lock().unwrap().applied.clone()
    }

    pub(crate) fn applied_kinds(&self) -> Vec<String> {
        self.applied()
            .iter()
            .map(|m| m["kind"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub(crate) fn deleted(&self) -> Vec<ResourceKey> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    fn current_pods(state: &State) -> Vec<PodObservation> {
        let index = state.list_calls.saturating_sub(1);
        state
            .pod_snapshots
            .get(index)
            .or_else(|| state.pod_snapshots.last())
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn apply(&self, resource: &dyn ResourceDescriptor) -> Result<()> {
        let manifest = resource.to_manifest()?;
        let mut state = self.state.lock().unwrap();

        if state.fail_apply_kind == Some(resource.resource_type().kind) {
            return Err(HarnessError::InvalidResource(format!(
                "admission webhook denied {}",
                resource.key()
            )));
        }

        let key = resource.key();
        if resource.resource_type().kind == "Namespace" {
            state
                .namespace_phases
                .entry(key.name.clone())
                .or_insert_with(|| "Active".to_string());
        }
        if !state.existing.contains(&key) {
            state.existing.push(key);
        }
        state.applied.push(manifest);
        Ok(())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push(key.clone());

        let Some(position) = state.existing.iter().position(|k| k == key) else {
            return Err(HarnessError::not_found(
                key.resource_type.kind,
                &key.name,
                key.namespace.as_deref().unwrap_or_default(),
            ));
        };
        state.existing.remove(position);
        if key.resource_type.kind == "Namespace" {
            state.namespace_phases.remove(&key.name);
        }
        Ok(())
    }

    async fn exists(&self, key: &ResourceKey) -> Result<bool> {
        Ok(self.state.lock().unwrap().existing.contains(key))
    }

    async fn list_pods(&self, _namespace: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        Ok(Self::current_pods(&state)
            .into_iter()
            .map(|pod| pod.name)
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodObservation> {
        let state = self.state.lock().unwrap();
        if state.vanished.contains(name) {
            return Err(HarnessError::not_found("Pod", name, namespace));
        }
        Self::current_pods(&state)
            .into_iter()
            .find(|pod| pod.name == name)
            .ok_or_else(|| HarnessError::not_found("Pod", name, namespace))
    }

    async fn exec(
        &self,
        _namespace: &str,
        pod: &str,
        _container: &str,
        command: &[String],
    ) -> Result<String> {
        let state = self.state.lock().unwrap();
        match &state.exec_handler {
            Some(handler) => handler(pod, command),
            None => Err(HarnessError::Exec("no exec handler".to_string())),
        }
    }

    async fn get_route(&self, namespace: &str, name: &str) -> Result<Route> {
        self.state
            .lock()
            .unwrap()
            .routes
            .get(&format!("{}/{}", namespace, name))
            .cloned()
            .ok_or_else(|| HarnessError::not_found("Route", name, namespace))
    }

    async fn namespace_phase(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .namespace_phases
            .get(name)
            .cloned())
    }
}
