/*!
common/src/lib.rs

Shared configuration types and DB helper functions for Newsreel.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that layers an optional override file on top of defaults
- A helper to initialize the SQLite pool backing the processed-article log
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/newsreel.db")
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/newsreel.db".to_string(),
        }
    }
}

/// HTTP trigger server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Name of the env var holding the bearer secret expected by the trigger endpoint
    pub trigger_secret_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            trigger_secret_env: "CRON_SECRET".to_string(),
        }
    }
}

/// Batch selection and throttling policy for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Articles per video; a batch is accepted only if none of its titles were used before
    pub batch_size: usize,
    /// Pause between two articles of the same run (upstream rate limits)
    pub inter_article_delay_seconds: u64,
    /// Max articles taken from each feed before ranking
    pub per_feed_limit: usize,
    /// Pause between two feed fetches
    pub feed_delay_seconds: u64,
    pub fetch_timeout_seconds: u64,
    /// Summaries longer than this are cut and suffixed with "..."
    pub summary_max_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            inter_article_delay_seconds: 5,
            per_feed_limit: 20,
            feed_delay_seconds: 1,
            fetch_timeout_seconds: 10,
            summary_max_chars: 300,
        }
    }
}

/// Remote chat-completion endpoint used for enhancement and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key_env: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.together.xyz/v1/chat/completions".to_string(),
            api_key_env: "TOGETHER_API_KEY".to_string(),
            model: "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free".to_string(),
            timeout_seconds: 30,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Text overlay styling for the title+summary frame.
/// Colors are any SVG color value (e.g. "rgb(0, 191, 255)").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub title_font_size: f32,
    pub title_font_family: String,
    pub title_font_weight: String,
    pub title_color: String,
    pub summary_font_size: f32,
    pub summary_font_family: String,
    pub summary_font_weight: String,
    pub summary_color: String,
    pub x_ratio: f32,
    pub y_ratio: f32,
    pub max_width_ratio: f32,
    pub title_line_height: f32,
    pub summary_line_height: f32,
    pub gap_between_title_and_summary: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            title_font_size: 20.0,
            title_font_family: "Helvetica, Arial, sans-serif".to_string(),
            title_font_weight: "bold".to_string(),
            title_color: "rgb(0, 191, 255)".to_string(),
            summary_font_size: 14.0,
            summary_font_family: "Aptos, Arial, sans-serif".to_string(),
            summary_font_weight: "600".to_string(),
            summary_color: "rgb(195, 195, 195)".to_string(),
            x_ratio: 0.5,
            y_ratio: 0.5,
            max_width_ratio: 0.85,
            title_line_height: 40.0,
            summary_line_height: 30.0,
            gap_between_title_and_summary: 30.0,
        }
    }
}

/// Background image generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub api_url: String,
    pub api_key_env: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub blur_sigma: f32,
    pub timeout_seconds: u64,
    pub overlay: OverlayStyle,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.together.xyz/v1/images/generations".to_string(),
            api_key_env: "TOGETHER_API_KEY".to_string(),
            model: "black-forest-labs/FLUX.1-schnell-Free".to_string(),
            width: 512,
            height: 768,
            steps: 2,
            blur_sigma: 1.0,
            timeout_seconds: 60,
            overlay: OverlayStyle::default(),
        }
    }
}

/// External rendering service that turns frames + audio into a video
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    pub api_url: String,
    /// Rendering is slow; the reference allows 8 minutes
    pub timeout_seconds: u64,
    /// Directory holding .mp3/.wav background tracks
    pub music_dir: String,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5000/create-video".to_string(),
            timeout_seconds: 480,
            music_dir: "music".to_string(),
        }
    }
}

/// Video hosting upload (OAuth2 refresh-token flow)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub client_id_env: String,
    pub client_secret_env: String,
    pub refresh_token_env: String,
    pub token_url: String,
    pub upload_url: String,
    pub privacy: String,
    pub category: String,
    pub tags: Vec<String>,
    pub default_title: String,
    pub default_description: String,
    pub timeout_seconds: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            client_id_env: "GOOGLE_CLIENT_ID".to_string(),
            client_secret_env: "GOOGLE_CLIENT_SECRET".to_string(),
            refresh_token_env: "GOOGLE_REFRESH_TOKEN".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            upload_url: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
            privacy: "public".to_string(),
            category: "28".to_string(),
            tags: [
                "Shorts",
                "DidYouKnow",
                "MindBlown",
                "AIRevolution",
                "ArtificialIntelligence",
                "QuantumComputing",
                "QuantumTech",
                "Science",
                "ScienceDaily",
                "Facts",
                "TechAndScience",
                "Latest",
                "FutureTech",
                "Breakthroughs",
                "TechUpdate",
                "InfographicShorts",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            default_title: "Mind-Blowing Update in AI, Quantum & Tech".to_string(),
            default_description: "Discover the latest in AI, Machine Learning, Quantum Computing, and breakthrough tech, simplified! Stay ahead with cutting-edge science and innovation.".to_string(),
            timeout_seconds: 300,
        }
    }
}

/// Extra RSS/Atom feed merged into the candidate pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    pub name: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub llm: LlmConfig,
    pub images: ImagesConfig,
    pub assembler: AssemblerConfig,
    pub publish: PublishConfig,
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            anyhow::bail!("pipeline.batch_size must be a positive integer");
        }
        if self.pipeline.summary_max_chars == 0 {
            anyhow::bail!("pipeline.summary_max_chars must be a positive integer");
        }
        Ok(())
    }

    /// Read a secret from the environment variable named in config.
    pub fn secret(env_name: &str) -> Result<String> {
        std::env::var(env_name).with_context(|| format!("env var '{}' not set", env_name))
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// Creates the parent directory if necessary and returns a configured `SqlitePool` in WAL
/// mode. Schema creation is left to the caller.
///
/// Example:
///   let pool = init_db_pool("data/newsreel.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_reference_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        assert_eq!(cfg.pipeline.batch_size, 2);
        assert_eq!(cfg.pipeline.inter_article_delay_seconds, 5);
        assert_eq!(cfg.pipeline.summary_max_chars, 300);
        assert_eq!(cfg.assembler.timeout_seconds, 480);
        assert_eq!(cfg.server.trigger_secret_env, "CRON_SECRET");
        assert!(cfg.feeds.is_empty());
    }

    #[tokio::test]
    async fn override_file_wins_per_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        tokio::fs::write(
            &default_path,
            r#"
            [pipeline]
            batch_size = 3
            per_feed_limit = 10

            [images.overlay]
            title_font_size = 24.0
            "#,
        )
        .await
        .unwrap();
        tokio::fs::write(
            &override_path,
            r#"
            [pipeline]
            batch_size = 4

            [[feeds]]
            url = "https://hnrss.org/newest"
            "#,
        )
        .await
        .unwrap();

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load config");
        assert_eq!(cfg.pipeline.batch_size, 4);
        assert_eq!(cfg.pipeline.per_feed_limit, 10);
        assert_eq!(cfg.images.overlay.title_font_size, 24.0);
        assert_eq!(cfg.images.overlay.summary_line_height, 30.0);
        assert_eq!(cfg.feeds.len(), 1);
    }

    #[tokio::test]
    async fn shipped_default_file_matches_builtin_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config.default.toml");
        let cfg = Config::from_file(&path).await.expect("load shipped defaults");
        let builtin = Config::default();
        assert_eq!(cfg.images.overlay, builtin.images.overlay);
        assert_eq!(cfg.pipeline.batch_size, builtin.pipeline.batch_size);
        assert_eq!(cfg.pipeline.per_feed_limit, builtin.pipeline.per_feed_limit);
        assert_eq!(cfg.assembler.api_url, builtin.assembler.api_url);
        assert_eq!(cfg.publish.tags, builtin.publish.tags);
        assert_eq!(cfg.llm.model, builtin.llm.model);
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[pipeline]\nbatch_size = 0\n").await.unwrap();

        let err = Config::load_with_defaults(None, Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[tokio::test]
    async fn db_pool_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("newsreel.db");
        let pool = init_db_pool(&db_path.to_string_lossy()).await.expect("init pool");
        let conn = pool.acquire().await.expect("acquire conn");
        drop(conn);
        assert!(db_path.exists());
    }
}
