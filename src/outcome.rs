use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Created {
        uuid: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        deployment_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Updated {
        uuid: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        deployment_id: Option<String>,
    },
    // Part of the reported vocabulary, no reconcile path produces it yet.
    #[allow(dead_code)]
    Unchanged { uuid: String },
    #[serde(rename_all = "camelCase")]
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        uuid: Option<String>,
        // set when the deployment itself failed
        #[serde(skip_serializing_if = "Option::is_none")]
        deployment_id: Option<String>,
        error: String,
    },
    Pruned { uuid: String },
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Created { .. } => "created",
            Action::Updated { .. } => "updated",
            Action::Unchanged { .. } => "unchanged",
            Action::Failed { .. } => "failed",
            Action::Pruned { .. } => "pruned",
        }
    }

    pub fn uuid(&self) -> Option<&str> {
        match self {
            Action::Created { uuid, .. }
            | Action::Updated { uuid, .. }
            | Action::Unchanged { uuid }
            | Action::Pruned { uuid } => Some(uuid),
            Action::Failed { uuid, .. } => uuid.as_deref(),
        }
    }

    pub fn deployment_id(&self) -> Option<&str> {
        match self {
            Action::Created { deployment_id, .. }
            | Action::Updated { deployment_id, .. }
            | Action::Failed { deployment_id, .. } => deployment_id.as_deref(),
            _ => None,
        }
    }

    /// Deployment still to be awaited: only created and updated entries qualify.
    fn pending_deployment_id(&self) -> Option<&str> {
        match self {
            Action::Created { deployment_id, .. } | Action::Updated { deployment_id, .. } => deployment_id.as_deref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Action::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceResult {
    pub name: String,
    #[serde(flatten)]
    pub action: Action,
}

impl ResourceResult {
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        ResourceResult { name: name.into(), action }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(name, Action::Failed { uuid: None, deployment_id: None, error: error.into() })
    }

    pub fn failed_with_uuid(name: impl Into<String>, uuid: Option<String>, error: impl Into<String>) -> Self {
        Self::new(name, Action::Failed { uuid, deployment_id: None, error: error.into() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub success: bool,
    pub resources: Vec<ResourceResult>,
    pub total_created: usize,
    pub total_updated: usize,
    pub total_failed: usize,
    pub total_pruned: usize,
}

impl ReconcileResult {
    /// Appends a result and bumps the counter of its action.
    pub fn record(&mut self, result: ResourceResult) {
        match result.action {
            Action::Created { .. } => self.total_created += 1,
            Action::Updated { .. } => self.total_updated += 1,
            Action::Failed { .. } => self.total_failed += 1,
            Action::Pruned { .. } => self.total_pruned += 1,
            Action::Unchanged { .. } => {}
        }
        self.resources.push(result);
    }

    /// Rewrites the result owning `deployment_id` to failed. Returns false if
    /// no result carries that deployment.
    pub fn fail_deployment(&mut self, deployment_id: &str, error: String) -> bool {
        let Some(result) = self.resources.iter_mut()
            .find(|r| r.action.pending_deployment_id() == Some(deployment_id)) else {
            return false;
        };

        let uuid = result.action.uuid().map(str::to_string);
        result.action = Action::Failed {
            uuid,
            deployment_id: Some(deployment_id.to_string()),
            error,
        };
        self.total_failed += 1;
        true
    }

    pub fn pending_deployments(&self) -> Vec<(String, String)> {
        self.resources.iter()
            .filter_map(|r| r.action.pending_deployment_id().map(|id| (r.name.clone(), id.to_string())))
            .collect()
    }

    pub fn finish(mut self) -> Self {
        self.success = self.total_failed == 0;
        self
    }
}
