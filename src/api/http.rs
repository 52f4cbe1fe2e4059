use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::{Instant, sleep};

use super::*;
use crate::config::ApiConfig;

const USER_AGENT: &str = concat!("cooldeploy/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct DeployResponse {
    #[serde(default)]
    deployments: Vec<QueuedDeployment>,
}

impl DeployResponse {
    fn deployment_id(self) -> Option<String> {
        self.deployments.into_iter().find_map(|d| d.deployment_uuid)
    }
}

#[derive(Deserialize)]
struct QueuedDeployment {
    deployment_uuid: Option<String>,
}

#[derive(Deserialize)]
struct DeploymentStatus {
    status: String,
}

impl DeploymentStatus {
    /// `Ok(true)` once finished, `Ok(false)` while still running.
    fn settled(&self, deployment_id: &str) -> Result<bool> {
        match self.status.as_str() {
            "finished" => Ok(true),
            "failed" => bail!("Deployment {} failed", deployment_id),
            s if s.starts_with("cancelled") => bail!("Deployment {} was cancelled", deployment_id),
            _ => Ok(false),
        }
    }
}

pub struct HttpApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build http client")?;
        Ok(HttpApi { client, config })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .bearer_auth(&self.config.token)
            .header("Accept", "application/json")
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder.send().await
            .with_context(|| format!("Failed to send request: {}", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{} failed: status code {}: {}", what, status, body.trim());
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path), what).await?;
        response.json::<T>().await
            .with_context(|| format!("Failed to parse response: {}", what))
    }
}

#[async_trait]
impl DeployApi for HttpApi {
    async fn find_environment(&self, project_id: &str, name: &str) -> Result<Option<Environment>> {
        let path = format!("/projects/{}/{}", project_id, name);
        let response = self.request(Method::GET, &path).send().await
            .context("Failed to send request: get environment")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            bail!("Get environment {} failed: status code {}", name, response.status());
        }

        let environment = response.json::<Environment>().await
            .context("Failed to parse environment")?;
        Ok(Some(environment))
    }

    async fn find_application(&self, name: &str, environment_id: u64) -> Result<Option<Application>> {
        let applications = self.list_applications().await?;
        Ok(applications.into_iter()
            .find(|a| a.name == name && a.environment_id == environment_id))
    }

    async fn list_applications(&self) -> Result<Vec<Application>> {
        self.get_json("/applications", "list applications").await
    }

    async fn create_application(&self, request: &CreateApplication) -> Result<CreatedApplication> {
        let builder = self.request(Method::POST, "/applications/dockerimage").json(request);
        let response = self.send(builder, &format!("Create application {}", request.name)).await?;
        let created: CreatedApplication = response.json().await
            .context("Failed to parse created application")?;
        info!("Created application {} ({})", request.name, created.uuid);
        Ok(created)
    }

    async fn update_application(&self, uuid: &str, fields: &ApplicationFields) -> Result<()> {
        let builder = self.request(Method::PATCH, &format!("/applications/{}", uuid)).json(fields);
        self.send(builder, &format!("Update application {}", uuid)).await?;
        Ok(())
    }

    async fn delete_application(&self, uuid: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/applications/{}", uuid));
        self.send(builder, &format!("Delete application {}", uuid)).await?;
        Ok(())
    }

    async fn list_env_vars(&self, app_uuid: &str) -> Result<Vec<EnvVar>> {
        self.get_json(&format!("/applications/{}/envs", app_uuid), "list environment variables").await
    }

    async fn update_env_vars(&self, app_uuid: &str, vars: &[EnvVarPayload]) -> Result<()> {
        let builder = self.request(Method::PATCH, &format!("/applications/{}/envs/bulk", app_uuid))
            .json(&json!({ "data": vars }));
        self.send(builder, &format!("Update environment variables of {}", app_uuid)).await?;
        Ok(())
    }

    async fn delete_env_var(&self, app_uuid: &str, env_uuid: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/applications/{}/envs/{}", app_uuid, env_uuid));
        self.send(builder, &format!("Delete environment variable {}", env_uuid)).await?;
        Ok(())
    }

    async fn deploy(&self, app_uuid: &str) -> Result<Option<String>> {
        let builder = self.request(Method::GET, "/deploy").query(&[("uuid", app_uuid)]);
        let response = self.send(builder, &format!("Deploy {}", app_uuid)).await?;
        let deploy: DeployResponse = response.json().await
            .context("Failed to parse deploy response")?;

        Ok(deploy.deployment_id())
    }

    async fn wait_for_deployment(&self, deployment_id: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.deploy_timeout;
        let path = format!("/deployments/{}", deployment_id);

        loop {
            let deployment: DeploymentStatus = self.get_json(&path, "get deployment").await?;
            debug!("Deployment {} is {}", deployment_id, deployment.status);

            if deployment.settled(deployment_id)? {
                return Ok(());
            }

            if Instant::now() >= deadline {
                bail!("Timed out after {}s waiting for deployment {}", self.config.deploy_timeout.as_secs(), deployment_id);
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy_response(body: &str) -> DeployResponse {
        serde_json::from_str(body).unwrap()
    }

    fn status(status: &str) -> DeploymentStatus {
        serde_json::from_value(json!({ "status": status, "deployment_uuid": "d1" })).unwrap()
    }

    #[test]
    fn test_deploy_response_id() {
        let body = r#"{
            "deployments": [
                { "message": "queued", "resource_uuid": "app-1", "deployment_uuid": "dep-1" }
            ]
        }"#;
        assert_eq!(deploy_response(body).deployment_id().as_deref(), Some("dep-1"));

        let skipped = r#"{ "deployments": [ { "resource_uuid": "app-1" }, { "deployment_uuid": "dep-2" } ] }"#;
        assert_eq!(deploy_response(skipped).deployment_id().as_deref(), Some("dep-2"));
    }

    #[test]
    fn test_deploy_response_without_deployment() {
        assert_eq!(deploy_response(r#"{ "deployments": [] }"#).deployment_id(), None);
        assert_eq!(deploy_response("{}").deployment_id(), None);
        assert_eq!(deploy_response(r#"{ "deployments": [ { "message": "nothing to do" } ] }"#).deployment_id(), None);
    }

    #[test]
    fn test_deployment_status() {
        assert!(status("finished").settled("d1").unwrap());
        assert!(!status("in_progress").settled("d1").unwrap());
        assert!(!status("queued").settled("d1").unwrap());

        let failed = status("failed").settled("d1").unwrap_err();
        assert_eq!(failed.to_string(), "Deployment d1 failed");
        let cancelled = status("cancelled-by-user").settled("d1").unwrap_err();
        assert_eq!(cancelled.to_string(), "Deployment d1 was cancelled");
    }

    #[test]
    fn test_deployment_status_requires_status() {
        assert!(serde_json::from_str::<DeploymentStatus>(r#"{ "deployment_uuid": "d1" }"#).is_err());
    }
}
