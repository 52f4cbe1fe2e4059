use anyhow::{Result, bail};
use std::time::Duration;

pub const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    // base url including the api prefix, e.g. https://coolify.example.com/api/v1
    pub base_url: String,
    pub token: String,
    pub deploy_timeout: Duration,
    pub poll_interval: Duration,
}

impl ApiConfig {
    pub fn new(api_url: &str, token: &str, deploy_timeout_secs: u64, poll_interval_secs: u64) -> Result<Self> {
        let api_url = api_url.trim().trim_end_matches('/');
        if api_url.is_empty() {
            bail!("API url is empty. Pass --api-url or set COOLIFY_URL");
        }
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            bail!("API url {} must start with http:// or https://", api_url);
        }
        if token.trim().is_empty() {
            bail!("API token is empty. Pass --token or set COOLIFY_TOKEN");
        }
        if poll_interval_secs == 0 {
            bail!("Poll interval must be at least one second");
        }

        let base_url = if api_url.ends_with("/api/v1") {
            api_url.to_string()
        } else {
            format!("{}/api/v1", api_url)
        };

        Ok(ApiConfig {
            base_url,
            token: token.trim().to_string(),
            deploy_timeout: Duration::from_secs(deploy_timeout_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
        })
    }
}
