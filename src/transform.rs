use crate::manifest::*;
use crate::manifest_yaml::*;
use anyhow::{Context, Result, anyhow};

const DEFAULT_HEALTH_CHECK_PATH: &str = "/";
const DEFAULT_HEALTH_CHECK_INTERVAL: u32 = 5;
const DEFAULT_HEALTH_CHECK_TIMEOUT: u32 = 5;
const DEFAULT_HEALTH_CHECK_RETRIES: u32 = 10;

pub fn convert_manifest(yaml: ManifestYaml) -> Result<Manifest> {
    let resources = yaml.resources.unwrap_or_default().into_iter()
        .map(|r| {
            let name = r.name.clone();
            convert_resource(r).with_context(|| format!("Invalid resource {}", name))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Manifest {
        project_id: yaml.project_id,
        destination_id: yaml.destination_id.filter(|s| !s.trim().is_empty()),
        server_id: yaml.server_id.filter(|s| !s.trim().is_empty()),
        environment: yaml.environment,
        resources,
    })
}

fn convert_resource(yaml: ResourceSpecYaml) -> Result<ResourceSpec> {
    let ports = yaml.ports.unwrap_or_default().into_iter()
        .map(convert_port)
        .collect::<Result<Vec<_>>>()?;

    let port_mappings = yaml.port_mappings.unwrap_or_default().iter()
        .map(|s| parse_port_mapping(s))
        .collect::<Result<Vec<_>>>()?;

    let domains = match yaml.domains {
        Some(DomainsYaml::Single(d)) => vec![d],
        Some(DomainsYaml::Multiple(list)) => list,
        None => vec![],
    };

    let health_check = yaml.health_check.map(|hc| HealthCheck {
        path: hc.path.unwrap_or_else(|| DEFAULT_HEALTH_CHECK_PATH.to_string()),
        port: hc.port,
        interval: hc.interval.unwrap_or(DEFAULT_HEALTH_CHECK_INTERVAL),
        timeout: hc.timeout.unwrap_or(DEFAULT_HEALTH_CHECK_TIMEOUT),
        retries: hc.retries.unwrap_or(DEFAULT_HEALTH_CHECK_RETRIES),
    });

    Ok(ResourceSpec {
        name: yaml.name,
        description: yaml.description,
        image: yaml.image.trim().to_string(),
        env_secret: yaml.env_secret.filter(|s| !s.trim().is_empty()),
        ports,
        port_mappings,
        domains,
        health_check,
    })
}

fn convert_port(yaml: PortYaml) -> Result<u16> {
    match yaml {
        PortYaml::Number(port) => Ok(port),
        PortYaml::Text(s) => s.trim().parse::<u16>()
            .map_err(|_| anyhow!("Invalid port: {}", s)),
    }
}

pub fn parse_port_mapping(s: &str) -> Result<PortMapping> {
    let (host, container) = s.split_once(':')
        .ok_or_else(|| anyhow!("Port mapping {} must be in the form host:container", s))?;

    let host = host.trim().parse::<u16>()
        .map_err(|_| anyhow!("Invalid host port in mapping {}", s))?;
    let container = container.trim().parse::<u16>()
        .map_err(|_| anyhow!("Invalid container port in mapping {}", s))?;

    Ok(PortMapping { host, container })
}
