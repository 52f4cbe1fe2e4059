use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use super::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindEnvironment(String, String),
    FindApplication(String, u64),
    ListApplications,
    CreateApplication(CreateApplication),
    UpdateApplication(String, ApplicationFields),
    DeleteApplication(String),
    ListEnvVars(String),
    UpdateEnvVars(String, Vec<EnvVarPayload>),
    DeleteEnvVar(String, String),
    Deploy(String),
    WaitForDeployment(String),
}

#[derive(Clone)]
struct StoredVar {
    uuid: String,
    key: String,
    value: String,
}

#[derive(Default)]
struct MockState {
    environment: Option<Environment>,
    applications: Vec<Application>,
    env_vars: HashMap<String, Vec<StoredVar>>,
    calls: Vec<Call>,
    next_id: u32,
    environment_lookup_error: Option<String>,
    list_error: Option<String>,
    failing_lookups: HashSet<String>,
    failing_creates: HashSet<String>,
    // keyed by application uuid
    failing_updates: HashSet<String>,
    failing_env_lists: HashSet<String>,
    failing_deploy_triggers: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_deployments: HashMap<String, String>,
    apps_without_deployment: HashSet<String>,
}

/// In-memory API that records every call.
#[derive(Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(id: u64, uuid: &str, name: &str) -> Self {
        let api = Self::new();
        api.state.lock().unwrap().environment = Some(Environment {
            id,
            uuid: uuid.to_string(),
            name: name.to_string(),
        });
        api
    }

    pub fn add_application(&self, uuid: &str, name: &str, environment_id: u64) {
        self.state.lock().unwrap().applications.push(Application {
            uuid: uuid.to_string(),
            name: name.to_string(),
            environment_id,
        });
    }

    pub fn add_env_var(&self, app_uuid: &str, key: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        let env_uuid = format!("env-{}-{}", app_uuid, key);
        state.env_vars.entry(app_uuid.to_string()).or_default().push(StoredVar {
            uuid: env_uuid,
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    pub fn fail_lookup(&self, name: &str) {
        self.state.lock().unwrap().failing_lookups.insert(name.to_string());
    }

    pub fn fail_create(&self, name: &str) {
        self.state.lock().unwrap().failing_creates.insert(name.to_string());
    }

    pub fn fail_environment_lookup(&self, message: &str) {
        self.state.lock().unwrap().environment_lookup_error = Some(message.to_string());
    }

    pub fn fail_list(&self, message: &str) {
        self.state.lock().unwrap().list_error = Some(message.to_string());
    }

    pub fn fail_update(&self, app_uuid: &str) {
        self.state.lock().unwrap().failing_updates.insert(app_uuid.to_string());
    }

    pub fn fail_env_list(&self, app_uuid: &str) {
        self.state.lock().unwrap().failing_env_lists.insert(app_uuid.to_string());
    }

    pub fn fail_deploy_trigger(&self, app_uuid: &str) {
        self.state.lock().unwrap().failing_deploy_triggers.insert(app_uuid.to_string());
    }

    pub fn fail_delete(&self, app_uuid: &str) {
        self.state.lock().unwrap().failing_deletes.insert(app_uuid.to_string());
    }

    pub fn fail_deployment(&self, deployment_id: &str, message: &str) {
        self.state.lock().unwrap().failing_deployments.insert(deployment_id.to_string(), message.to_string());
    }

    pub fn skip_deployment_id(&self, app_uuid: &str) {
        self.state.lock().unwrap().apps_without_deployment.insert(app_uuid.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn applications(&self) -> Vec<Application> {
        self.state.lock().unwrap().applications.clone()
    }

    pub fn env_keys(&self, app_uuid: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut keys: Vec<String> = state.env_vars.get(app_uuid)
            .map(|vars| vars.iter().map(|v| v.key.clone()).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn env_value(&self, app_uuid: &str, key: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.env_vars.get(app_uuid)
            .and_then(|vars| vars.iter().find(|v| v.key == key))
            .map(|v| v.value.clone())
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl DeployApi for MockApi {
    async fn find_environment(&self, project_id: &str, name: &str) -> Result<Option<Environment>> {
        self.record(Call::FindEnvironment(project_id.to_string(), name.to_string()));
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.environment_lookup_error {
            bail!("{}", message);
        }
        Ok(state.environment.clone().filter(|e| e.name == name))
    }

    async fn find_application(&self, name: &str, environment_id: u64) -> Result<Option<Application>> {
        self.record(Call::FindApplication(name.to_string(), environment_id));
        let state = self.state.lock().unwrap();
        if state.failing_lookups.contains(name) {
            bail!("lookup of {} failed: connection reset", name);
        }
        Ok(state.applications.iter()
            .find(|a| a.name == name && a.environment_id == environment_id)
            .cloned())
    }

    async fn list_applications(&self) -> Result<Vec<Application>> {
        self.record(Call::ListApplications);
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.list_error {
            bail!("{}", message);
        }
        Ok(state.applications.clone())
    }

    async fn create_application(&self, request: &CreateApplication) -> Result<CreatedApplication> {
        self.record(Call::CreateApplication(request.clone()));
        let mut state = self.state.lock().unwrap();
        if state.failing_creates.contains(&request.name) {
            bail!("create of {} rejected: invalid image", request.name);
        }

        let environment_id = state.environment.as_ref()
            .map(|e| e.id)
            .ok_or_else(|| anyhow!("no environment"))?;
        state.next_id += 1;
        let uuid = format!("new-{}-{}", request.name, state.next_id);
        state.applications.push(Application {
            uuid: uuid.clone(),
            name: request.name.clone(),
            environment_id,
        });
        Ok(CreatedApplication { uuid })
    }

    async fn update_application(&self, uuid: &str, fields: &ApplicationFields) -> Result<()> {
        self.record(Call::UpdateApplication(uuid.to_string(), fields.clone()));
        if self.state.lock().unwrap().failing_updates.contains(uuid) {
            bail!("update of {} rejected: 422 unprocessable", uuid);
        }
        Ok(())
    }

    async fn delete_application(&self, uuid: &str) -> Result<()> {
        self.record(Call::DeleteApplication(uuid.to_string()));
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(uuid) {
            bail!("delete of {} failed: 500 internal error", uuid);
        }
        state.applications.retain(|a| a.uuid != uuid);
        Ok(())
    }

    async fn list_env_vars(&self, app_uuid: &str) -> Result<Vec<EnvVar>> {
        self.record(Call::ListEnvVars(app_uuid.to_string()));
        let state = self.state.lock().unwrap();
        if state.failing_env_lists.contains(app_uuid) {
            bail!("listing envs of {} failed: timeout", app_uuid);
        }
        Ok(state.env_vars.get(app_uuid)
            .map(|vars| vars.iter().map(|v| EnvVar { uuid: v.uuid.clone(), key: v.key.clone() }).collect())
            .unwrap_or_default())
    }

    async fn update_env_vars(&self, app_uuid: &str, vars: &[EnvVarPayload]) -> Result<()> {
        self.record(Call::UpdateEnvVars(app_uuid.to_string(), vars.to_vec()));
        let mut state = self.state.lock().unwrap();
        let current = state.env_vars.entry(app_uuid.to_string()).or_default();
        for var in vars {
            match current.iter_mut().find(|v| v.key == var.key) {
                Some(existing) => existing.value = var.value.clone(),
                None => current.push(StoredVar {
                    uuid: format!("env-{}-{}", app_uuid, var.key),
                    key: var.key.clone(),
                    value: var.value.clone(),
                }),
            }
        }
        Ok(())
    }

    async fn delete_env_var(&self, app_uuid: &str, env_uuid: &str) -> Result<()> {
        self.record(Call::DeleteEnvVar(app_uuid.to_string(), env_uuid.to_string()));
        let mut state = self.state.lock().unwrap();
        if let Some(vars) = state.env_vars.get_mut(app_uuid) {
            vars.retain(|v| v.uuid != env_uuid);
        }
        Ok(())
    }

    async fn deploy(&self, app_uuid: &str) -> Result<Option<String>> {
        self.record(Call::Deploy(app_uuid.to_string()));
        let state = self.state.lock().unwrap();
        if state.failing_deploy_triggers.contains(app_uuid) {
            bail!("deploy of {} rejected: queue full", app_uuid);
        }
        if state.apps_without_deployment.contains(app_uuid) {
            return Ok(None);
        }
        Ok(Some(format!("dep-{}", app_uuid)))
    }

    async fn wait_for_deployment(&self, deployment_id: &str) -> Result<()> {
        self.record(Call::WaitForDeployment(deployment_id.to_string()));
        let state = self.state.lock().unwrap();
        match state.failing_deployments.get(deployment_id) {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}
