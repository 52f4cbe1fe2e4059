//! Contract of the remote management API the reconciler drives.
//!
//! Lookups report a missing object as `Ok(None)`. Every other failure,
//! including a deployment that finished unsuccessfully, is an `Err`.

pub mod http;
#[cfg(test)]
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Environment {
    pub id: u64,
    pub uuid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Application {
    pub uuid: String,
    pub name: String,
    pub environment_id: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnvVar {
    pub uuid: String,
    pub key: String,
}

/// Environment variable as sent to the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvVarPayload {
    pub key: String,
    pub value: String,
    pub is_preview: bool,
    pub is_literal: bool,
    pub is_multiline: bool,
    pub is_shown_once: bool,
}

/// Fields shared by create and update requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplicationFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub docker_registry_image_tag: String,
    pub ports_exposes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports_mappings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<String>,
    pub health_check_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_retries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateApplication {
    pub project_uuid: String,
    pub server_uuid: String,
    pub environment_name: String,
    pub environment_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_uuid: Option<String>,
    pub name: String,
    pub docker_registry_image_name: String,
    #[serde(flatten)]
    pub fields: ApplicationFields,
    pub instant_deploy: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedApplication {
    pub uuid: String,
}

#[async_trait]
pub trait DeployApi: Send + Sync {
    async fn find_environment(&self, project_id: &str, name: &str) -> Result<Option<Environment>>;

    async fn find_application(&self, name: &str, environment_id: u64) -> Result<Option<Application>>;

    /// All applications visible to the token, across every environment.
    async fn list_applications(&self) -> Result<Vec<Application>>;

    async fn create_application(&self, request: &CreateApplication) -> Result<CreatedApplication>;

    async fn update_application(&self, uuid: &str, fields: &ApplicationFields) -> Result<()>;

    async fn delete_application(&self, uuid: &str) -> Result<()>;

    async fn list_env_vars(&self, app_uuid: &str) -> Result<Vec<EnvVar>>;

    /// Creates or overwrites the given keys. Keys not listed are left alone.
    async fn update_env_vars(&self, app_uuid: &str, vars: &[EnvVarPayload]) -> Result<()>;

    async fn delete_env_var(&self, app_uuid: &str, env_uuid: &str) -> Result<()>;

    /// Queues a deployment. `None` means there is nothing to wait for.
    async fn deploy(&self, app_uuid: &str) -> Result<Option<String>>;

    async fn wait_for_deployment(&self, deployment_id: &str) -> Result<()>;
}
