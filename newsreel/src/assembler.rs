use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Turns ordered frames plus an audio track into an encoded video.
#[async_trait::async_trait]
pub trait VideoAssembler: Send + Sync {
    /// Frame position is temporal order in the output.
    async fn assemble(&self, frames: &[Vec<u8>], audio: &[u8]) -> PipelineResult<Vec<u8>>;
}

/// Chooses the background track of a video.
#[async_trait::async_trait]
pub trait AudioPicker: Send + Sync {
    async fn pick(&self) -> PipelineResult<Vec<u8>>;
}

/// Random `.mp3`/`.wav` track from a directory.
pub struct MusicDirectory {
    dir: PathBuf,
}

impl MusicDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(cfg: &common::AssemblerConfig) -> Self {
        Self::new(&cfg.music_dir)
    }
}

async fn list_tracks(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        PipelineError::Assembly(format!("failed to read music dir {}: {}", dir.display(), e))
    })?;
    let mut tracks = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::Assembly(format!("failed to list music dir: {}", e)))?
    {
        let path = entry.path();
        let is_track = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("mp3") || e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if is_track {
            tracks.push(path);
        }
    }
    tracks.sort();
    Ok(tracks)
}

#[async_trait::async_trait]
impl AudioPicker for MusicDirectory {
    async fn pick(&self) -> PipelineResult<Vec<u8>> {
        let tracks = list_tracks(&self.dir).await?;
        let track = tracks
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| {
                PipelineError::Assembly(format!("no music files found in {}", self.dir.display()))
            })?;
        debug!(track = %track.display(), "assembler: background track chosen");
        tokio::fs::read(&track).await.map_err(|e| {
            PipelineError::Assembly(format!("failed to read music file {}: {}", track.display(), e))
        })
    }
}

/// Client for the local rendering service (`POST /create-video`).
pub struct HttpVideoAssembler {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct CreateVideoRequest {
    images: Vec<String>,
    music: String,
}

impl HttpVideoAssembler {
    pub fn new(cfg: &common::AssemblerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: cfg.api_url.clone(),
            timeout: Duration::from_secs(cfg.timeout_seconds),
        }
    }
}

#[async_trait::async_trait]
impl VideoAssembler for HttpVideoAssembler {
    async fn assemble(&self, frames: &[Vec<u8>], audio: &[u8]) -> PipelineResult<Vec<u8>> {
        info!(frames = frames.len(), audio_bytes = audio.len(), "assembler: requesting video");

        let engine = base64::engine::general_purpose::STANDARD;
        let payload = CreateVideoRequest {
            images: frames.iter().map(|f| engine.encode(f)).collect(),
            music: engine.encode(audio),
        };

        let timed_out = || {
            PipelineError::Assembly(format!("timed out after {}s", self.timeout.as_secs()))
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&self.api_url)
                .header("Cache-Control", "no-cache")
                .json(&payload)
                .send(),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| PipelineError::Assembly(format!("API call failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Assembly(format!(
                "API call failed with status {}: {}",
                status, body
            )));
        }

        let video = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| PipelineError::Assembly(format!("failed to read video body: {}", e)))?;
        info!(bytes = video.len(), "assembler: video received");
        Ok(video.to_vec())
    }
}
