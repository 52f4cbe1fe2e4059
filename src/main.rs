use clap::{Args, Parser, Subcommand};
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

mod api;
mod config;
mod manifest;
mod manifest_loader;
mod manifest_yaml;
mod outcome;
mod reconciler;
mod report;
mod secrets;
mod transform;
mod validator;

use api::http::HttpApi;
use config::{ApiConfig, DEFAULT_DEPLOY_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS};
use reconciler::{ReconcileOptions, Reconciler};

#[derive(Parser)]
#[command(name = "cooldeploy")]
#[command(about = "Reconciles applications on a Coolify instance with a deploy manifest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, update and prune applications, then deploy and wait
    Apply {
        #[command(flatten)]
        input: ManifestInput,
        /// Image tag to deploy
        #[arg(long)]
        tag: String,
        /// Overrides server_id from the manifest
        #[arg(long)]
        server: Option<String>,
        #[arg(long, env = "COOLIFY_URL", default_value = "")]
        api_url: String,
        #[arg(long, env = "COOLIFY_TOKEN", default_value = "", hide_env_values = true)]
        token: String,
        /// Seconds to wait for each deployment
        #[arg(long, default_value_t = DEFAULT_DEPLOY_TIMEOUT_SECS)]
        deploy_timeout: u64,
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
        poll_interval: u64,
        /// Print the result as json
        #[arg(long)]
        json: bool,
    },
    /// Check the manifest and secret sources without calling the API
    Validate {
        #[command(flatten)]
        input: ManifestInput,
    },
    /// Show which keys a secret file yields
    ParseSecret {
        path: String,
    },
}

#[derive(Args)]
struct ManifestInput {
    /// Manifest file or directory containing deploy.yaml
    #[arg(short, long)]
    manifest: Option<String>,
    /// Secret content from a file, NAME=PATH
    #[arg(short = 's', long = "secret")]
    secret_files: Vec<String>,
    /// Secret content from an environment variable, NAME=VAR
    #[arg(long = "secret-env")]
    secret_envs: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Apply { input, tag, server, api_url, token, deploy_timeout, poll_interval, json } => {
            let config = ApiConfig::new(api_url, token, *deploy_timeout, *poll_interval)?;
            let options = ReconcileOptions { image_tag: tag.trim().to_string(), server_id: server.clone() };
            apply_command(input, config, &options, *json).await?;
        }
        Commands::Validate { input } => {
            validate_command(input)?;
        }
        Commands::ParseSecret { path } => {
            parse_secret_command(path)?;
        }
    }
    Ok(())
}

fn load_input(input: &ManifestInput) -> Result<(manifest::Manifest, HashMap<String, String>)> {
    let manifest = manifest_loader::load_manifest(input.manifest.as_deref().map(Path::new))?;
    let secrets = secrets::load_secret_sources(&input.secret_files, &input.secret_envs)?;
    validator::validate(&manifest, Some(&secrets)).context("Validation failed")?;
    Ok((manifest, secrets))
}

async fn apply_command(input: &ManifestInput, config: ApiConfig, options: &ReconcileOptions, json: bool) -> Result<()> {
    let tag = &options.image_tag;
    if tag.is_empty() {
        bail!("--tag must not be empty");
    }

    let (manifest, secrets) = load_input(input)?;
    println!(
        "Reconciling {} resources in environment {} with tag {}",
        manifest.resources.len(), manifest.environment, tag
    );

    let api = HttpApi::new(config)?;
    let reconciler = Reconciler::new(Arc::new(api));
    let result = reconciler.reconcile(&manifest, &secrets, options).await;

    if json {
        println!("{}", report::render_json(&result)?);
    } else {
        println!("{}", report::render_text(&result));
    }

    if !result.success {
        bail!("{} of the requested changes failed", result.total_failed);
    }
    Ok(())
}

fn validate_command(input: &ManifestInput) -> Result<()> {
    let (manifest, secrets) = load_input(input)?;
    println!(
        "Successfully validated manifest: {} resources for environment {}, {} secrets",
        manifest.resources.len(), manifest.environment, secrets.len()
    );
    Ok(())
}

fn parse_secret_command(path: &str) -> Result<()> {
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path))?;
    let vars = secrets::parse_secret_content(&content);

    for payload in secrets::to_env_payloads(&vars) {
        if payload.is_multiline {
            println!("{} (multiline)", payload.key);
        } else {
            println!("{}", payload.key);
        }
    }
    println!("{} variables", vars.len());
    Ok(())
}
