use std::time::Duration;

use common::PublishConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};

/// Upload metadata for one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub privacy: String,
    pub category: String,
}

impl VideoMetadata {
    /// Synthesized title/description, with the configured defaults standing in for empty ones.
    pub fn from_synthesized(title: &str, description: &str, cfg: &PublishConfig) -> Self {
        let pick = |value: &str, fallback: &str| {
            if value.trim().is_empty() {
                fallback.to_string()
            } else {
                value.trim().to_string()
            }
        };
        Self {
            title: pick(title, &cfg.default_title),
            description: pick(description, &cfg.default_description),
            tags: cfg.tags.clone(),
            privacy: cfg.privacy.clone(),
            category: cfg.category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedVideo {
    pub video_id: String,
    pub video_url: String,
    pub short_url: String,
}

impl PublishedVideo {
    pub fn from_id(video_id: impl Into<String>) -> Self {
        let video_id = video_id.into();
        Self {
            video_url: format!("https://youtube.com/watch?v={}", video_id),
            short_url: format!("https://youtu.be/{}", video_id),
            video_id,
        }
    }
}

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Upload `video`. A rejected refresh token is reported as `AuthExpired`.
    async fn publish(&self, video: &[u8], metadata: &VideoMetadata) -> PipelineResult<PublishedVideo>;
}

/// Access token valid for a single publish. The secret is overwritten when dropped.
pub struct ScopedAccessToken {
    token: String,
}

impl ScopedAccessToken {
    fn new(token: String) -> Self {
        Self { token }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl Drop for ScopedAccessToken {
    fn drop(&mut self) {
        let zeroed = "\0".repeat(self.token.len());
        self.token.replace_range(.., &zeroed);
        debug!("publisher: access token released");
    }
}

impl std::fmt::Debug for ScopedAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ScopedAccessToken(***)")
    }
}

/// True for the token errors that need a manual re-authentication.
pub fn is_auth_expired_message(message: &str) -> bool {
    message.contains("invalid_grant") || message.contains("Token has been expired")
}

/// YouTube Data API v3 uploader. Refreshes the OAuth2 access token before every
/// upload, then uses the resumable upload protocol.
pub struct YoutubePublisher {
    client: reqwest::Client,
    token_url: String,
    upload_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

impl YoutubePublisher {
    pub fn new(
        cfg: &PublishConfig,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: cfg.token_url.clone(),
            upload_url: cfg.upload_url.clone(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            timeout: Duration::from_secs(cfg.timeout_seconds),
        }
    }

    async fn timed<T, F>(&self, fut: F) -> PipelineResult<T>
    where
        F: std::future::Future<Output = Result<T, reqwest::Error>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| PipelineError::Timeout {
                stage: "publish",
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| PipelineError::Publish(format!("HTTP request failed: {}", e)))
    }

    /// Exchange the refresh token for a short-lived access token.
    pub async fn acquire_token(&self) -> PipelineResult<ScopedAccessToken> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .timed(self.client.post(&self.token_url).form(&form).send())
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if is_auth_expired_message(&body) {
                warn!("publisher: refresh token rejected, manual re-authentication required");
                return Err(PipelineError::AuthExpired(
                    "Authentication tokens expired. Please re-authenticate manually.".to_string(),
                ));
            }
            return Err(PipelineError::Publish(format!("token refresh failed {}: {}", status, body)));
        }

        let parsed: TokenResponse = self.timed(response.json()).await?;
        info!("publisher: tokens refreshed");
        Ok(ScopedAccessToken::new(parsed.access_token))
    }

    async fn upload(
        &self,
        token: &ScopedAccessToken,
        video: &[u8],
        metadata: &VideoMetadata,
    ) -> PipelineResult<PublishedVideo> {
        let resource = serde_json::json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "categoryId": metadata.category,
                "tags": metadata.tags,
            },
            "status": {
                "privacyStatus": metadata.privacy,
                "selfDeclaredMadeForKids": false,
            },
        });

        let session = self
            .timed(
                self.client
                    .post(&self.upload_url)
                    .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                    .header("Authorization", token.bearer())
                    .header("X-Upload-Content-Type", "video/mp4")
                    .header("X-Upload-Content-Length", video.len().to_string())
                    .json(&resource)
                    .send(),
            )
            .await?;
        let session = check_status(session, "upload session").await?;

        let location = session
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Publish("upload session has no Location header".to_string()))?;
        debug!(%location, "publisher: resumable session opened");

        let response = self
            .timed(
                self.client
                    .put(&location)
                    .header("Authorization", token.bearer())
                    .header("Content-Type", "video/mp4")
                    .body(video.to_vec())
                    .send(),
            )
            .await?;
        let response = check_status(response, "video upload").await?;

        let uploaded: UploadResponse = self.timed(response.json()).await?;
        Ok(PublishedVideo::from_id(uploaded.id))
    }
}

async fn check_status(response: reqwest::Response, step: &str) -> PipelineResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if is_auth_expired_message(&body) {
        return Err(PipelineError::AuthExpired(format!("{} rejected: {}", step, body)));
    }
    Err(PipelineError::Publish(format!("{} failed {}: {}", step, status, body)))
}

#[async_trait::async_trait]
impl Publisher for YoutubePublisher {
    async fn publish(&self, video: &[u8], metadata: &VideoMetadata) -> PipelineResult<PublishedVideo> {
        let token = self.acquire_token().await?;
        info!(title = %metadata.title, bytes = video.len(), "publisher: uploading");
        let published = self.upload(&token, video, metadata).await?;
        info!(video_id = %published.video_id, "publisher: upload successful");
        Ok(published)
    }
}
