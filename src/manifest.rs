#[derive(Debug, Clone)]
pub struct Manifest {
    pub project_id: String,
    pub destination_id: Option<String>,
    pub server_id: Option<String>,
    pub environment: String,
    pub resources: Vec<ResourceSpec>,
}

impl Manifest {
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ResourceSpec {
    // unique within a manifest, used to find the remote application
    pub name: String,
    pub description: Option<String>,
    // image reference without a tag, the tag is supplied per run
    pub image: String,
    pub env_secret: Option<String>,
    pub ports: Vec<u16>,
    pub port_mappings: Vec<PortMapping>,
    pub domains: Vec<String>,
    pub health_check: Option<HealthCheck>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    pub path: String,
    pub port: Option<u16>,
    pub interval: u32,
    pub timeout: u32,
    pub retries: u32,
}
