use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::api::{ApplicationFields, CreateApplication, DeployApi, EnvVarPayload, Environment};
use crate::manifest::{Manifest, ResourceSpec};
use crate::outcome::{Action, ReconcileResult, ResourceResult};
use crate::secrets;

pub const ENVIRONMENT_NOT_FOUND: &str = "Environment not found";

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub image_tag: String,
    // takes precedence over the manifest's server_id
    pub server_id: Option<String>,
}

// A resource that could not be reconciled, with the remote id if it
// already existed or was created before the error.
struct ResourceFailure {
    uuid: Option<String>,
    error: anyhow::Error,
}

impl From<anyhow::Error> for ResourceFailure {
    fn from(error: anyhow::Error) -> Self {
        ResourceFailure { uuid: None, error }
    }
}

impl ResourceFailure {
    fn of(uuid: &str, error: anyhow::Error) -> Self {
        ResourceFailure { uuid: Some(uuid.to_string()), error }
    }
}

pub struct Reconciler {
    api: Arc<dyn DeployApi>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn DeployApi>) -> Self {
        Reconciler { api }
    }

    /// Drives every resource of the manifest toward its declared state,
    /// prunes undeclared applications and waits for the triggered deployments.
    ///
    /// Never fails: every problem ends up as a failed entry or counter in
    /// the returned result.
    pub async fn reconcile(
        &self,
        manifest: &Manifest,
        secrets: &HashMap<String, String>,
        options: &ReconcileOptions,
    ) -> ReconcileResult {
        let mut result = ReconcileResult::default();

        let environment = match self.api.find_environment(&manifest.project_id, &manifest.environment).await {
            Ok(Some(environment)) => environment,
            Ok(None) => {
                warn!("Environment {} not found in project {}", manifest.environment, manifest.project_id);
                return fail_all(manifest, ENVIRONMENT_NOT_FOUND);
            }
            Err(e) => {
                warn!("Failed to look up environment {}: {:#}", manifest.environment, e);
                return fail_all(manifest, &format!("{:#}", e));
            }
        };

        let Some(server_id) = options.server_id.as_deref().or(manifest.server_id.as_deref()) else {
            warn!("No server id in manifest or options, skipping all {} resources", manifest.resources.len());
            result.total_failed = manifest.resources.len();
            return result.finish();
        };

        for resource in &manifest.resources {
            match self.reconcile_resource(manifest, resource, &environment, server_id, secrets, options).await {
                Ok(action) => {
                    info!("{} {}", resource.name, action.label());
                    result.record(ResourceResult::new(&resource.name, action));
                }
                Err(failure) => {
                    warn!("{} failed: {:#}", resource.name, failure.error);
                    result.record(ResourceResult::failed_with_uuid(
                        &resource.name,
                        failure.uuid,
                        format!("{:#}", failure.error),
                    ));
                }
            }
        }

        self.prune(manifest, &environment, &mut result).await;
        self.await_deployments(&mut result).await;

        result.finish()
    }

    async fn reconcile_resource(
        &self,
        manifest: &Manifest,
        resource: &ResourceSpec,
        environment: &Environment,
        server_id: &str,
        secrets: &HashMap<String, String>,
        options: &ReconcileOptions,
    ) -> Result<Action, ResourceFailure> {
        let desired = desired_env_vars(resource, secrets)?;
        let fields = application_fields(resource, &options.image_tag);

        match self.api.find_application(&resource.name, environment.id).await? {
            Some(existing) => {
                let uuid = existing.uuid;
                debug!("Updating {} ({})", resource.name, uuid);
                let deployment_id = self.update_existing(&uuid, &fields, &desired).await
                    .map_err(|e| ResourceFailure::of(&uuid, e))?;
                Ok(Action::Updated { uuid, deployment_id })
            }
            None => {
                debug!("Creating {}", resource.name);
                let request = CreateApplication {
                    project_uuid: manifest.project_id.clone(),
                    server_uuid: server_id.to_string(),
                    environment_name: environment.name.clone(),
                    environment_uuid: environment.uuid.clone(),
                    destination_uuid: manifest.destination_id.clone(),
                    name: resource.name.clone(),
                    docker_registry_image_name: resource.image.clone(),
                    fields,
                    instant_deploy: false,
                };
                let uuid = self.api.create_application(&request).await?.uuid;
                let deployment_id = self.configure_created(&uuid, &desired).await
                    .map_err(|e| ResourceFailure::of(&uuid, e))?;
                Ok(Action::Created { uuid, deployment_id })
            }
        }
    }

    async fn update_existing(&self, uuid: &str, fields: &ApplicationFields, desired: &[EnvVarPayload]) -> Result<Option<String>> {
        self.api.update_application(uuid, fields).await?;
        self.sync_env_vars(uuid, desired).await?;
        self.api.deploy(uuid).await
    }

    async fn configure_created(&self, uuid: &str, desired: &[EnvVarPayload]) -> Result<Option<String>> {
        // nothing to prune on a fresh application
        if !desired.is_empty() {
            self.api.update_env_vars(uuid, desired).await?;
        }
        self.api.deploy(uuid).await
    }

    /// Makes the remote key set of an application equal to `desired`.
    async fn sync_env_vars(&self, app_uuid: &str, desired: &[EnvVarPayload]) -> Result<()> {
        let current = self.api.list_env_vars(app_uuid).await?;
        let desired_keys: HashSet<&str> = desired.iter().map(|v| v.key.as_str()).collect();

        for var in current.iter().filter(|v| !desired_keys.contains(v.key.as_str())) {
            debug!("Deleting env var {} from {}", var.key, app_uuid);
            self.api.delete_env_var(app_uuid, &var.uuid).await?;
        }

        if !desired.is_empty() {
            self.api.update_env_vars(app_uuid, desired).await?;
        }
        Ok(())
    }

    async fn prune(&self, manifest: &Manifest, environment: &Environment, result: &mut ReconcileResult) {
        let applications = match self.api.list_applications().await {
            Ok(applications) => applications,
            Err(e) => {
                warn!("Failed to list applications for pruning: {:#}", e);
                result.record(ResourceResult::failed(
                    &environment.name,
                    format!("Failed to list applications for pruning: {:#}", e),
                ));
                return;
            }
        };

        let desired: HashSet<&str> = manifest.resource_names().collect();
        let orphans = applications.into_iter()
            .filter(|a| a.environment_id == environment.id)
            .filter(|a| !desired.contains(a.name.as_str()));

        for app in orphans {
            match self.api.delete_application(&app.uuid).await {
                Ok(()) => {
                    info!("{} pruned", app.name);
                    result.record(ResourceResult::new(app.name, Action::Pruned { uuid: app.uuid }));
                }
                Err(e) => {
                    warn!("Failed to prune {}: {:#}", app.name, e);
                    result.record(ResourceResult::failed_with_uuid(app.name, Some(app.uuid), format!("{:#}", e)));
                }
            }
        }
    }

    /// Waits for all deployments at once. Each wait reports `(deployment id,
    /// outcome)` over a channel and only this loop touches `result`.
    async fn await_deployments(&self, result: &mut ReconcileResult) {
        let pending = result.pending_deployments();
        if pending.is_empty() {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut unreported: HashMap<String, String> = HashMap::new();

        for (name, deployment_id) in pending {
            info!("Waiting for deployment {} of {}", deployment_id, name);
            unreported.insert(deployment_id.clone(), name);

            let api = Arc::clone(&self.api);
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = api.wait_for_deployment(&deployment_id).await;
                let _ = tx.send((deployment_id, outcome));
            });
        }
        drop(tx);

        while let Some((deployment_id, outcome)) = rx.recv().await {
            let name = unreported.remove(&deployment_id).unwrap_or_default();
            match outcome {
                Ok(()) => info!("Deployment {} of {} finished", deployment_id, name),
                Err(e) => {
                    warn!("Deployment {} of {} failed: {:#}", deployment_id, name, e);
                    result.fail_deployment(&deployment_id, format!("{:#}", e));
                }
            }
        }

        // a wait task that died without reporting
        for (deployment_id, name) in unreported {
            warn!("Deployment {} of {} ended without an outcome", deployment_id, name);
            result.fail_deployment(&deployment_id, format!("Deployment {} ended without reporting an outcome", deployment_id));
        }
    }
}

fn fail_all(manifest: &Manifest, error: &str) -> ReconcileResult {
    let mut result = ReconcileResult::default();
    for resource in &manifest.resources {
        result.record(ResourceResult::failed(&resource.name, error));
    }
    result.finish()
}

fn desired_env_vars(resource: &ResourceSpec, secrets: &HashMap<String, String>) -> Result<Vec<EnvVarPayload>> {
    let Some(secret_name) = &resource.env_secret else {
        return Ok(vec![]);
    };

    let content = secrets.get(secret_name)
        .ok_or_else(|| anyhow!("Secret {} required by {} is not provided", secret_name, resource.name))?;
    Ok(secrets::to_env_payloads(&secrets::parse_secret_content(content)))
}

fn application_fields(resource: &ResourceSpec, image_tag: &str) -> ApplicationFields {
    let join = |items: Vec<String>| if items.is_empty() { None } else { Some(items.join(",")) };

    let ports_exposes = resource.ports.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let ports_mappings = join(resource.port_mappings.iter()
        .map(|m| format!("{}:{}", m.host, m.container))
        .collect());

    let mut fields = ApplicationFields {
        description: resource.description.clone(),
        docker_registry_image_tag: image_tag.to_string(),
        ports_exposes,
        ports_mappings,
        domains: join(resource.domains.clone()),
        ..Default::default()
    };

    if let Some(hc) = &resource.health_check {
        fields.health_check_enabled = true;
        fields.health_check_path = Some(hc.path.clone());
        fields.health_check_port = hc.port.map(|p| p.to_string());
        fields.health_check_interval = Some(hc.interval);
        fields.health_check_timeout = Some(hc.timeout);
        fields.health_check_retries = Some(hc.retries);
    }

    fields
}
