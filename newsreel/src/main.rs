/*
newsreel - single-binary main.rs
Serves the authenticated trigger endpoint, or performs one run from the command line.
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{init_db_pool, Config};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use newsreel::assembler::{HttpVideoAssembler, MusicDirectory};
use newsreel::batch::BatchSelector;
use newsreel::imaging::HttpImageProducer;
use newsreel::llm::remote::RemoteLlmProvider;
use newsreel::llm::{LlmContentEnhancer, LlmMetadataSynthesizer, LlmProvider};
use newsreel::orchestrator::{Collaborators, RunOrchestrator};
use newsreel::publisher::{Publisher, VideoMetadata, YoutubePublisher};
use newsreel::server::{launch_rocket, AppState};
use newsreel::sources::NewsAggregator;
use newsreel::storage::{self, MemoryTitleStore, SqliteTitleStore, TitleStore};

#[derive(Parser, Debug)]
#[command(name = "newsreel", about = "News-to-shorts video pipeline")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /api/v1/trigger` until shut down
    Serve,
    /// Perform a single run now
    RunOnce {
        /// Skip the upload step
        #[arg(long)]
        no_publish: bool,
        /// Use an in-memory title store; nothing is recorded as processed
        #[arg(long)]
        dry_run: bool,
        /// Also write the video to this file
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = load_config(args.config).await?;

    match args.command {
        Command::Serve => {
            let store = sqlite_store(&config).await?;
            let orchestrator = build_orchestrator(&config, store)?;
            let publisher = build_publisher(&config)?;
            let trigger_secret = std::env::var(&config.server.trigger_secret_env).ok();
            if trigger_secret.is_none() {
                warn!(
                    env = %config.server.trigger_secret_env,
                    "trigger secret not set; every trigger request will be rejected"
                );
            }

            let state = AppState {
                orchestrator: Arc::new(orchestrator),
                publisher,
                publish: config.publish.clone(),
                trigger_secret,
            };
            if let Err(e) = launch_rocket(state, &config.server).await {
                error!(%e, "Rocket server failed");
                return Err(e);
            }
        }
        Command::RunOnce {
            no_publish,
            dry_run,
            output,
        } => {
            let store: Arc<dyn TitleStore> = if dry_run {
                info!("dry run: processed titles are kept in memory only");
                Arc::new(MemoryTitleStore::new())
            } else {
                sqlite_store(&config).await?
            };
            let orchestrator = build_orchestrator(&config, store)?;

            let run = orchestrator.run().await;
            if !run.success {
                anyhow::bail!("run failed: {}", run.error.unwrap_or_default());
            }
            let Some(video) = run.video else {
                info!("no new content, nothing to publish");
                return Ok(());
            };

            if let Some(path) = output {
                tokio::fs::write(&path, &video)
                    .await
                    .with_context(|| format!("failed to write video to {}", path.display()))?;
                info!(path = %path.display(), bytes = video.len(), "video written");
            }

            if no_publish {
                info!(frames = run.frame_count, title = %run.title, "publishing skipped (--no-publish)");
                return Ok(());
            }

            let publisher = build_publisher(&config)?;
            let metadata = VideoMetadata::from_synthesized(&run.title, &run.description, &config.publish);
            match publisher.publish(&video, &metadata).await {
                Ok(published) => {
                    info!(video_id = %published.video_id, url = %published.video_url, "video published")
                }
                Err(e) if e.is_auth_expired() => {
                    error!(%e, "publishing needs a new refresh token");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

/// `config.default.toml` overlaid with `--config` (or `./config.toml` when present).
async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await
    .context("failed to load configuration")?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

async fn sqlite_store(config: &Config) -> Result<Arc<dyn TitleStore>> {
    let db_path = match tokio::fs::canonicalize(&config.database.path).await {
        Ok(p) => p.to_string_lossy().to_string(),
        Err(_) => config.database.path.clone(),
    };
    info!(db_path = %db_path, "resolved DB path");

    let pool = init_db_pool(&db_path)
        .await
        .with_context(|| format!("failed to initialize database pool at {}", db_path))?;
    storage::ensure_schema(&pool).await?;
    Ok(Arc::new(SqliteTitleStore::new(pool)))
}

fn build_orchestrator(config: &Config, store: Arc<dyn TitleStore>) -> Result<RunOrchestrator> {
    let llm_key = Config::secret(&config.llm.api_key_env)?;
    let provider: Arc<dyn LlmProvider> = Arc::new(RemoteLlmProvider::from_config(&config.llm, llm_key));
    info!(model = %config.llm.model, url = %config.llm.api_url, "LLM provider initialized");

    let images_key = Config::secret(&config.images.api_key_env)?;
    let aggregator = NewsAggregator::from_config(config)?;
    info!(sources = ?aggregator.source_names(), "article sources configured");

    let collaborators = Collaborators {
        enhancer: Arc::new(LlmContentEnhancer::new(provider.clone())),
        images: Arc::new(HttpImageProducer::new(&config.images, images_key)),
        metadata: Arc::new(LlmMetadataSynthesizer::new(provider)),
        audio: Arc::new(MusicDirectory::from_config(&config.assembler)),
        assembler: Arc::new(HttpVideoAssembler::new(&config.assembler)),
    };

    Ok(RunOrchestrator::new(
        aggregator,
        BatchSelector::new(store),
        collaborators,
        &config.pipeline,
        &config.images.overlay,
    ))
}

fn build_publisher(config: &Config) -> Result<Arc<dyn Publisher>> {
    let p = &config.publish;
    let publisher = YoutubePublisher::new(
        p,
        Config::secret(&p.client_id_env)?,
        Config::secret(&p.client_secret_env)?,
        Config::secret(&p.refresh_token_env)?,
    );
    Ok(Arc::new(publisher))
}
