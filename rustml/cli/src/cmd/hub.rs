use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use rustml_hub::{HubApi, SnapshotSource, DEFAULT_PATTERNS};

#[derive(Args)]
pub struct HubArgs {
    /// Hub cache directory (defaults to the user cache dir).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Access token for gated or private repositories.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: HubCommand,
}

#[derive(Subcommand)]
enum HubCommand {
    /// Download a model snapshot from HuggingFace Hub.
    Download {
        /// Model identifier (e.g. "openai-community/gpt2").
        model_id: String,

        /// Glob of repository files to fetch; repeatable.
        /// Defaults to "*.safetensors" and "*.json".
        #[arg(long = "pattern")]
        patterns: Vec<String>,
    },

    /// List repositories present in the cache.
    List,

    /// Print the cached config.json of a model.
    Info {
        /// Model identifier (e.g. "openai-community/gpt2").
        model_id: String,
    },
}

impl HubArgs {
    fn api(&self) -> HubApi {
        let api = self.cache_dir.as_ref().map_or_else(HubApi::new, HubApi::with_cache_dir);
        match &self.token {
            Some(token) => api.with_token(token),
            None => api,
        }
    }
}

fn download(api: &HubApi, model_id: &str, patterns: &[String]) -> Result<()> {
    let patterns: Vec<String> = if patterns.is_empty() {
        DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect()
    } else {
        patterns.to_vec()
    };
    eprintln!("Fetching {model_id} ({}) ...", patterns.join(", "));
    let bar = super::transfer_bar();
    let dir = api.snapshot(model_id, &patterns, &super::report_to(&bar));
    bar.finish_and_clear();
    let dir = dir.with_context(|| format!("Failed to download model: {model_id}"))?;
    println!("{}", dir.display());
    Ok(())
}

fn list(api: &HubApi) -> Result<()> {
    let cache = api.cache_dir();
    if !cache.exists() {
        eprintln!("Cache directory does not exist: {}", cache.display());
        return Ok(());
    }
    let models = api
        .cached_models()
        .with_context(|| format!("Failed to scan cache: {}", cache.display()))?;
    if models.is_empty() {
        eprintln!("No cached models found.");
    }
    models.iter().for_each(|id| println!("{id}"));
    Ok(())
}

fn info(api: &HubApi, model_id: &str) -> Result<()> {
    let config = api
        .get_cached(model_id)
        .with_context(|| format!("Model not cached: {model_id}"))?
        .load_config_sync()
        .with_context(|| format!("Unreadable config.json for {model_id}"))?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

pub fn run(args: HubArgs) -> Result<()> {
    let api = args.api();
    match &args.command {
        HubCommand::Download { model_id, patterns } => download(&api, model_id, patterns),
        HubCommand::List => list(&api),
        HubCommand::Info { model_id } => info(&api, model_id),
    }
}
