//! Test fixtures for interacting with the deployed services.

pub mod deployment;
pub mod trustyai_client;

pub use deployment::{DeployedScenario, Deployment, DeploymentPlan};
pub use trustyai_client::{FairnessQuery, NameMapping, SpdResponse, TrustyAiClient};
