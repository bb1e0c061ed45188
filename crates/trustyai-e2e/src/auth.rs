//! Bearer tokens and route resolution.

use crate::cluster::{ClusterApi, Route};
use crate::error::{HarnessError, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Source of the bearer token sent to routes.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<SecretString>;
}

/// Token printed by an identity command such as `oc whoami -t`.
///
/// The command runs again on every call, so a session refreshed mid-run is
/// picked up.
#[derive(Debug, Clone)]
pub struct CliToken {
    command: Vec<String>,
}

impl CliToken {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl TokenProvider for CliToken {
    async fn token(&self) -> Result<SecretString> {
        get_token(&self.command).await
    }
}

/// A fixed token, for service-account tokens handed in from outside.
#[derive(Debug, Clone)]
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<SecretString> {
        Ok(self.0.clone())
    }
}

/// Run the identity command and return the token it prints.
///
/// Fails when the command cannot be started, exits non-zero (no active
/// session), or prints nothing.
#[instrument(skip_all, fields(program = command.first().map(String::as_str).unwrap_or_default()))]
pub async fn get_token(command: &[String]) -> Result<SecretString> {
    let Some((program, args)) = command.split_first() else {
        return Err(HarnessError::Token("empty identity command".to_string()));
    };

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| HarnessError::Token(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        return Err(HarnessError::Token(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            crate::http::sanitize_body(String::from_utf8_lossy(&output.stderr).trim())
        )));
    }

    let token = SecretString::from(String::from_utf8_lossy(&output.stdout).trim().to_string());
    if token.expose_secret().is_empty() {
        return Err(HarnessError::Token(format!("{} printed no token", program)));
    }

    debug!("Acquired bearer token");
    Ok(token)
}

/// Look up the route `name` in `namespace`.
///
/// A missing route is NotFound and is not retried.
#[instrument(skip(cluster))]
pub async fn get_route(cluster: &dyn ClusterApi, namespace: &str, name: &str) -> Result<Route> {
    let route = cluster.get_route(namespace, name).await?;
    debug!(url = %route.base_url(), "Resolved route");
    Ok(route)
}
