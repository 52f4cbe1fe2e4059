use crate::manifest::*;
use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet};

pub fn validate(manifest: &Manifest, secrets: Option<&HashMap<String, String>>) -> Result<()> {
    if manifest.project_id.trim().is_empty() {
        return Err(anyhow!("project_id must not be empty"));
    }
    if manifest.environment.trim().is_empty() {
        return Err(anyhow!("environment must not be empty"));
    }

    // Check resource names
    let mut seen = HashSet::new();
    for resource in &manifest.resources {
        if !is_valid_name(&resource.name) {
            return Err(anyhow!("Resource name {} must consist of lowercase letters, digits and dashes", resource.name));
        }
        if !seen.insert(resource.name.as_str()) {
            return Err(anyhow!("Resource {} is declared more than once", resource.name));
        }
    }

    for resource in &manifest.resources {
        validate_image(resource)?;

        if resource.ports.is_empty() {
            return Err(anyhow!("Resource {} must expose at least one port", resource.name));
        }
        for mapping in &resource.port_mappings {
            if !resource.ports.contains(&mapping.container) {
                return Err(anyhow!("Resource {} maps {}:{} but does not expose port {}",
                    resource.name, mapping.host, mapping.container, mapping.container));
            }
        }
    }

    // Check secrets
    if let Some(secrets) = secrets {
        let missing: Vec<&str> = manifest.resources.iter()
            .filter_map(|r| r.env_secret.as_deref())
            .filter(|name| !secrets.contains_key(*name))
            .collect();

        if !missing.is_empty() {
            return Err(anyhow!("Secrets {:?} referenced by the manifest are not provided", missing));
        }
    }

    Ok(())
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn validate_image(resource: &ResourceSpec) -> Result<()> {
    let image = &resource.image;
    if image.is_empty() {
        return Err(anyhow!("Resource {} has no image", resource.name));
    }
    if image.contains('@') {
        return Err(anyhow!("Image {} of {} must not pin a digest, the tag is set per deployment", image, resource.name));
    }

    // a colon after the last slash is a tag, before it a registry port
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    if last_segment.contains(':') {
        return Err(anyhow!("Image {} of {} must not carry a tag, the tag is set per deployment", image, resource.name));
    }
    Ok(())
}
