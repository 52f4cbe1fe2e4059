use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::sync::OnceLock;
use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;

use crate::api::EnvVarPayload;

fn assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("valid assignment pattern"))
}

/// Parses dotenv style `KEY=value` content. Lines that do not look like an
/// assignment are dropped, so this never fails.
pub fn parse_secret_content(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    for line in content.lines() {
        let trimmed = line.trim();

        // Skip comments and empty lines
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some(caps) = assignment_pattern().captures(trimmed) else {
            continue;
        };

        let key = &caps[1];
        if let Some(value) = unquote(&caps[2]) {
            vars.insert(key.to_string(), value.to_string());
        }
    }

    vars
}

// None means an opening quote without its closing pair.
fn unquote(value: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if value.starts_with(quote) {
            if value.len() >= 2 && value.ends_with(quote) {
                return Some(&value[1..value.len() - 1]);
            }
            return None;
        }
    }
    Some(value)
}

pub fn to_env_payloads(vars: &BTreeMap<String, String>) -> Vec<EnvVarPayload> {
    vars.iter()
        .map(|(key, value)| EnvVarPayload {
            key: key.clone(),
            value: value.clone(),
            is_preview: false,
            is_literal: true,
            is_multiline: value.contains('\n'),
            is_shown_once: false,
        })
        .collect()
}

fn split_source(arg: &str) -> Result<(String, String)> {
    let (name, source) = arg.split_once('=')
        .ok_or_else(|| anyhow!("Secret source {} must be in the form NAME=VALUE", arg))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Empty secret name in {}", arg);
    }
    Ok((name.to_string(), source.trim().to_string()))
}

/// Builds the secret name -> raw content mapping from `NAME=PATH` file
/// sources and `NAME=VAR` environment sources.
pub fn load_secret_sources(files: &[String], env_vars: &[String]) -> Result<HashMap<String, String>> {
    let mut secrets = HashMap::new();

    for arg in files {
        let (name, path) = split_source(arg)?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read secret file {} for {}", path, name))?;
        secrets.insert(name, content);
    }

    for arg in env_vars {
        let (name, var_name) = split_source(arg)?;
        let content = env::var(&var_name)
            .with_context(|| format!("Secret environment variable {} not set", var_name))?;
        secrets.insert(name, content);
    }

    Ok(secrets)
}
