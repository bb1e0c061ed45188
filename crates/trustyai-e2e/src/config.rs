//! Harness configuration.
//!
//! Configuration is loaded from environment variables. Cluster credentials
//! are not part of it: kube-rs resolves them from `KUBECONFIG`,
//! `~/.kube/config` or the in-cluster service account.

use crate::constants::{DEFAULT_MODEL_NAMESPACE, PAYLOAD_PROCESSORS_ENV};
use crate::eventual::PollPolicy;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default wall-clock budget for pod readiness.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 180;

/// Default delay between readiness polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default directory of inference payloads sent by the flow tests.
pub const DEFAULT_DATA_DIR: &str = "./data/training";

/// Default identity command printing the current bearer token.
pub const DEFAULT_TOKEN_COMMAND: &str = "oc whoami -t";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid duration for {var}: {message}")]
    InvalidDuration { var: String, message: String },

    #[error("Invalid boolean for {var}: '{value}'")]
    InvalidBool { var: String, value: String },

    #[error("Invalid token command: {0}")]
    InvalidTokenCommand(String),
}

/// End-to-end harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Namespace the scenario provisions and tests in.
    pub namespace: String,

    /// Directory whose regular files are posted to the inference endpoint.
    pub data_dir: PathBuf,

    /// Identity command, split into program and arguments.
    pub token_command: Vec<String>,

    /// Wall-clock budget for readiness waits.
    pub ready_timeout: Duration,

    /// Fixed delay between readiness polls.
    pub poll_interval: Duration,

    /// Delete provisioned resources when a scenario ends.
    pub teardown: bool,

    /// Env var marking pods that forward payloads to TrustyAI.
    pub payload_marker: String,

    /// Also apply the OpenShift monitoring config maps.
    pub manage_monitoring_config: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_MODEL_NAMESPACE.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            token_command: split_command(DEFAULT_TOKEN_COMMAND),
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            teardown: true,
            payload_marker: PAYLOAD_PROCESSORS_ENV.to_string(),
            manage_monitoring_config: true,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let namespace = vars
            .get("TRUSTYAI_E2E_NAMESPACE")
            .cloned()
            .unwrap_or(defaults.namespace);

        let data_dir = vars
            .get("TRUSTYAI_E2E_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let token_command = match vars.get("TRUSTYAI_E2E_TOKEN_COMMAND") {
            Some(raw) => {
                let parts = split_command(raw);
                if parts.is_empty() {
                    return Err(ConfigError::InvalidTokenCommand(
                        "TRUSTYAI_E2E_TOKEN_COMMAND must not be empty".to_string(),
                    ));
                }
                parts
            }
            None => defaults.token_command,
        };

        let ready_timeout = parse_secs(vars, "TRUSTYAI_E2E_READY_TIMEOUT_SECS")?
            .unwrap_or(defaults.ready_timeout);
        let poll_interval = parse_secs(vars, "TRUSTYAI_E2E_POLL_INTERVAL_SECS")?
            .unwrap_or(defaults.poll_interval);

        let teardown =
            parse_bool(vars, "TRUSTYAI_E2E_TEARDOWN")?.unwrap_or(defaults.teardown);
        let manage_monitoring_config = parse_bool(vars, "TRUSTYAI_E2E_MONITORING_CONFIG")?
            .unwrap_or(defaults.manage_monitoring_config);

        let payload_marker = vars
            .get("TRUSTYAI_E2E_PAYLOAD_MARKER")
            .cloned()
            .unwrap_or(defaults.payload_marker);

        Ok(Self {
            namespace,
            data_dir,
            token_command,
            ready_timeout,
            poll_interval,
            teardown,
            payload_marker,
            manage_monitoring_config,
        })
    }

    /// Poll policy for readiness waits.
    pub fn readiness_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval, self.ready_timeout)
    }
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn parse_secs(
    vars: &HashMap<String, String>,
    var: &str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value_str) = vars.get(var) else {
        return Ok(None);
    };

    let value: u64 = value_str
        .parse()
        .map_err(|e| ConfigError::InvalidDuration {
            var: var.to_string(),
            message: format!("must be a whole number of seconds, got '{}': {}", value_str, e),
        })?;

    if value == 0 {
        return Err(ConfigError::InvalidDuration {
            var: var.to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    Ok(Some(Duration::from_secs(value)))
}

fn parse_bool(vars: &HashMap<String, String>, var: &str) -> Result<Option<bool>, ConfigError> {
    let Some(value) = vars.get(var) else {
        return Ok(None);
    };

    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidBool {
            var: var.to_string(),
            value: value.clone(),
        }),
    }
}
