//! Document Activation - command-line front end
//!
//! Each invocation loads the durable state, performs one coordinator
//! operation, flushes state and exits non-zero on a classified failure.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc_activation::{ActivationCoordinator, Config, FileSource, Outcome};

#[derive(Parser)]
#[command(name = "doc_activation")]
#[command(author, version, about = "Activation cache for a remote document retrieval engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Remote engine base URL
    #[arg(long, global = true, env = "REMOTE_ENGINE_URL")]
    remote_url: Option<String>,

    /// Directory holding the durable state
    #[arg(long, global = true, env = "STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Record time-to-live in seconds
    #[arg(long, global = true, env = "CACHE_TTL_SECS")]
    ttl_secs: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Make sure a document is ready to query, uploading it if needed
    Ensure {
        document_id: String,

        /// Local file holding the document bytes
        path: PathBuf,

        /// Display name sent with the upload (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Reactivate a previously provisioned document without uploading
    Reactivate {
        document_id: String,

        #[arg(long)]
        name: Option<String>,
    },

    /// Show the cached record for a document
    Status { document_id: String },

    /// List all live records
    List,

    /// Forget a document that was deleted or replaced
    Invalidate { document_id: String },

    /// Clear a document's status so the next ensure starts afresh
    Reset { document_id: String },

    /// Remove every record
    Clear,

    /// Print cache statistics
    Stats,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(url) = &self.remote_url {
            config.remote_url = url.clone();
        }
        if let Some(dir) = &self.state_dir {
            config.state_dir = dir.clone();
        }
        if let Some(ttl) = self.ttl_secs {
            config.cache_ttl = ttl;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "doc_activation=debug"
    } else {
        "doc_activation=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config();
    info!(
        remote_url = %config.remote_url,
        state_dir = %config.state_dir.display(),
        ttl_secs = config.cache_ttl,
        "Configuration loaded"
    );

    let coordinator =
        ActivationCoordinator::from_config(&config).context("failed to initialize coordinator")?;

    let sweeper = coordinator.spawn_sweeper(config.sweep_every());
    let outcome = run(&coordinator, cli.command).await;
    sweeper.abort();

    if let Err(e) = coordinator.flush().await {
        warn!(error = %e, "Failed to flush cache state");
    }

    outcome
}

async fn run(coordinator: &ActivationCoordinator, command: Commands) -> Result<()> {
    match command {
        Commands::Ensure {
            document_id,
            path,
            name,
        } => {
            let name = name.unwrap_or_else(|| display_name_for(&path, &document_id));
            let source = Arc::new(FileSource::new(path));
            let outcome = coordinator
                .ensure_ready(&document_id, &name, source)
                .await;
            report(outcome)
        }
        Commands::Reactivate { document_id, name } => {
            let name = name.unwrap_or_else(|| document_id.clone());
            report(coordinator.reactivate(&document_id, &name).await)
        }
        Commands::Status { document_id } => match coordinator.status(&document_id).await {
            Some(record) => print_json(&record),
            None => anyhow::bail!("no cached record for {}", document_id),
        },
        Commands::List => print_json(&coordinator.records().await),
        Commands::Invalidate { document_id } => {
            coordinator.invalidate(&document_id).await;
            Ok(())
        }
        Commands::Reset { document_id } => {
            coordinator.reset_status(&document_id).await;
            Ok(())
        }
        Commands::Clear => {
            let removed = coordinator.clear_all().await;
            println!("removed {} records", removed);
            Ok(())
        }
        Commands::Stats => {
            let stats = coordinator.stats().await;
            info!(
                records = stats.total_records(),
                hit_rate = stats.hit_rate(),
                "Cache statistics"
            );
            print_json(&stats)
        }
    }
}

fn report(outcome: Outcome) -> Result<()> {
    let activation = outcome?;
    if let Some(diagnostic) = &activation.diagnostic {
        warn!(diagnostic = %diagnostic, "Activation completed with a diagnostic");
    }
    print_json(&activation)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn display_name_for(path: &std::path::Path, fallback: &str) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}
