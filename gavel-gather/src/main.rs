//! gavel-gather - Event Gathering Pipeline
//!
//! Runs one gather cycle: discover events for the configured time span,
//! transcribe new media, and merge everything into the document store.
//! Scheduling repeated runs (cron, containers) is deliberately left to
//! the deployment.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gavel_gather::{modules, GatherConfig, GatherDeps, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting gavel-gather (event gathering pipeline)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path =
        gavel_common::config::resolve_config_path(None, "GAVEL_CONFIG", "gather.toml")?;
    info!("Configuration: {}", config_path.display());
    let config = GatherConfig::load(&config_path)?;

    let database = modules::build_database(&config.database).await?;
    info!("Document store ready ({})", config.database.module);

    let deps = GatherDeps {
        scraper: modules::build_scraper(&config.scraper)?,
        audio_splitter: modules::build_audio_splitter(&config.audio_splitter)?,
        sr_model: modules::build_sr_model(&config.sr_model)?,
        caption_model: config
            .caption_model
            .as_ref()
            .map(modules::build_sr_model)
            .transpose()?,
        file_store: modules::build_file_store(&config.file_store)?,
        database,
    };

    let orchestrator = Orchestrator::new(deps, config.options());
    let span = config.span_ending_now();

    let cancel_token = CancellationToken::new();

    {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Cancellation requested, finishing in-flight events");
                token.cancel();
            }
        });
    }

    if let Some(timeout_secs) = config.run_timeout_secs {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(timeout_secs)).await;
            warn!(timeout_secs, "Run timeout reached, stopping new candidates");
            token.cancel();
        });
    }

    let summary = orchestrator.run(span, cancel_token).await?;

    info!(
        discovered = summary.discovered,
        skipped = summary.skipped,
        merged = summary.merged,
        failed = summary.failed,
        "Gather complete"
    );

    Ok(())
}
