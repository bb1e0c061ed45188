//! TrustyAI End-to-End Test Suite
//!
//! This crate provisions a ModelMesh model deployment with a TrustyAI service
//! on an OpenShift cluster, pushes inference payloads through the model's
//! route, and checks that TrustyAI ingested them and computes fairness
//! metrics over them.
//!
//! # Features
//!
//! - `smoke`: Cluster reachability, bearer token, TrustyAI route (30s)
//! - `flows`: Full provision -> readiness -> inference -> fairness flow (5-10min)
//! - `all`: Enable all test categories
//!
//! # Prerequisites
//!
//! 1. Logged-in OpenShift session: `oc login ...` (`oc whoami -t` must print a token)
//! 2. ModelMesh serving and the TrustyAI operator installed on the cluster
//! 3. Kubeconfig resolvable through `KUBECONFIG` or `~/.kube/config`
//!
//! # Usage
//!
//! ```bash
//! # From repo root - runs only the in-process unit tests (no default features)
//! cargo test
//!
//! # Smoke tests only (30s)
//! cargo test -p trustyai-e2e --features smoke
//!
//! # Full suite
//! cargo test -p trustyai-e2e --features all
//! ```
//!
//! Configuration comes from `TRUSTYAI_E2E_*` environment variables, see
//! [`config::HarnessConfig`].

pub mod auth;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod error;
pub mod eventual;
pub mod fixtures;
pub mod http;
pub mod lifecycle;
pub mod propagation;
pub mod readiness;
pub mod resources;
pub mod telemetry;
