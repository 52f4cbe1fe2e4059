use anyhow::{Context, Result, bail};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::manifest;
use crate::manifest_yaml;
use crate::transform;

pub fn load_manifest(path: Option<&Path>) -> Result<manifest::Manifest> {
    let path = match path {
        Some(p) if p.is_dir() => find_manifest_in_dir(p)?,
        Some(p) => p.to_path_buf(),
        None => find_manifest_in_dir(Path::new("."))?,
    };

    load_manifest_from_file(&path)
}

fn find_manifest_in_dir(dir: &Path) -> Result<PathBuf> {
    let path_yaml = dir.join("deploy.yaml");
    let path_yml = dir.join("deploy.yml");

    if path_yaml.exists() {
        Ok(path_yaml)
    } else if path_yml.exists() {
        Ok(path_yml)
    } else {
        bail!("Could not find deploy.yaml or deploy.yml in {:?}", dir);
    }
}

fn load_manifest_from_file(path: &Path) -> Result<manifest::Manifest> {
    let file = File::open(path).context(format!("Failed to open {:?}", path))?;
    let yaml: manifest_yaml::ManifestYaml = serde_yaml::from_reader(file).context(format!("Failed to parse {:?}", path))?;
    transform::convert_manifest(yaml).context("Failed to process manifest")
}
