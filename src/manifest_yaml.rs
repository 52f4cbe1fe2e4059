use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestYaml {
    pub project_id: String,
    pub destination_id: Option<String>,
    pub server_id: Option<String>,
    pub environment: String,
    // a list, not a map: declaration order is the processing order
    pub resources: Option<Vec<ResourceSpecYaml>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceSpecYaml {
    pub name: String,
    pub description: Option<String>,
    pub image: String,
    pub env_secret: Option<String>,
    pub ports: Option<Vec<PortYaml>>,
    // strings in the form "host:container"
    pub port_mappings: Option<Vec<String>>,
    pub domains: Option<DomainsYaml>,
    pub health_check: Option<HealthCheckYaml>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortYaml {
    Number(u16),
    Text(String),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainsYaml {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckYaml {
    pub path: Option<String>,
    pub port: Option<u16>,
    pub interval: Option<u32>,
    pub timeout: Option<u32>,
    pub retries: Option<u32>,
}
