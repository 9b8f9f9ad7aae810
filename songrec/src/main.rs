//! songrec - audio recovery pipeline
//!
//! Loads configuration, ensures the folder table exists, and runs one full
//! pipeline pass. Exits 0 once the pass completes, whatever happened to
//! individual files; only configuration problems are fatal.

use anyhow::{Context, Result};
use clap::Parser;
use songrec::{Collaborators, FolderSet, Orchestrator, PipelineContext};
use songrec_common::config::{load_config, CONFIG_ENV_VAR};
use std::path::PathBuf;
use tracing::{info, warn};

/// Command-line arguments for songrec
#[derive(Parser, Debug)]
#[command(name = "songrec")]
#[command(about = "Validate, convert, identify and re-tag a folder of audio files")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Number of files processed concurrently (overrides config)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    songrec_common::logging::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    if let Some(workers) = args.workers {
        config.pipeline.workers = workers;
    }

    info!("Starting songrec v{}", env!("CARGO_PKG_VERSION"));
    match &config.source {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => warn!("No config file found, using built-in defaults"),
    }

    let api_key = config.recognition.resolve_api_key().with_context(|| {
        format!(
            "No recognition API key: set [recognition].api_key or {}",
            songrec_common::config::API_KEY_ENV_VAR
        )
    })?;

    let folders = FolderSet::new(config.folders.clone());
    folders.validate().context("Invalid folder configuration")?;
    folders
        .ensure_exist()
        .await
        .context("Failed to create folders")?;
    for (label, path) in folders.config().labelled() {
        info!(folder = label, path = %path.display(), "Folder");
    }

    let collaborators = Collaborators::production(&config, api_key)?;
    let ctx = PipelineContext::new(folders, config.pipeline.clone(), collaborators);
    let orchestrator = Orchestrator::new(ctx);

    let summary = orchestrator.run_pass().await;

    println!(
        "Processed {} file(s): {} succeeded, {} discarded as duplicates, {} video, {} skipped",
        summary.processed, summary.succeeded, summary.discarded, summary.video, summary.skipped
    );
    for (state, count) in &summary.quarantined {
        println!("  quarantined as {}: {}", state, count);
    }

    Ok(())
}
