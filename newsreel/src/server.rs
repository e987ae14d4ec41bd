use std::sync::Arc;

use anyhow::{anyhow, Result};
use common::{PublishConfig, ServerConfig};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde_json::{json, Value};

use crate::orchestrator::RunOrchestrator;
use crate::publisher::{Publisher, VideoMetadata};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RunOrchestrator>,
    pub publisher: Arc<dyn Publisher>,
    pub publish: PublishConfig,
    /// Expected bearer secret. `None` rejects every trigger.
    pub trigger_secret: Option<String>,
}

/// Bearer credential from the `Authorization` header, if any.
///
/// The guard never fails; the handler decides, so a rejection still gets a JSON body.
pub struct BearerToken(Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BearerToken {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = req
            .headers()
            .get_one("Authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string());
        Outcome::Success(BearerToken(token))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl BearerToken {
    fn matches(&self, secret: Option<&str>) -> bool {
        match (self.0.as_deref(), secret) {
            (Some(given), Some(expected)) if !expected.is_empty() => {
                constant_time_eq(given.as_bytes(), expected.as_bytes())
            }
            _ => false,
        }
    }
}

#[get("/health")]
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run the pipeline once and publish the result.
#[post("/api/v1/trigger")]
async fn trigger(state: &State<AppState>, token: BearerToken) -> (Status, Json<Value>) {
    if !token.matches(state.trigger_secret.as_deref()) {
        tracing::warn!("trigger: unauthorized request");
        return (
            Status::Unauthorized,
            Json(json!({ "success": false, "error": "Unauthorized" })),
        );
    }

    let run = state.orchestrator.run().await;
    if !run.success {
        return (
            Status::InternalServerError,
            Json(json!({
                "success": false,
                "error": run.error.unwrap_or_else(|| "Run failed".to_string()),
            })),
        );
    }

    let Some(video) = run.video.as_deref() else {
        tracing::info!("trigger: run produced no video");
        return (
            Status::BadRequest,
            Json(json!({ "success": false, "error": "No new content" })),
        );
    };

    let metadata = VideoMetadata::from_synthesized(&run.title, &run.description, &state.publish);
    match state.publisher.publish(video, &metadata).await {
        Ok(published) => {
            tracing::info!(video_id = %published.video_id, "trigger: video published");
            (
                Status::Ok,
                Json(json!({
                    "success": true,
                    "video_id": published.video_id,
                    "video_url": published.video_url,
                    "short_url": published.short_url,
                    "title": metadata.title,
                    "frame_count": run.frame_count,
                })),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "trigger: publish failed");
            (
                Status::InternalServerError,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                    "reauth_required": e.is_auth_expired(),
                })),
            )
        }
    }
}

/// Rocket instance with the trigger routes mounted on `figment`.
pub fn build_rocket(state: AppState, figment: rocket::figment::Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .mount("/", routes![health, trigger])
}

pub async fn launch_rocket(state: AppState, server: &ServerConfig) -> Result<()> {
    let fig = rocket::Config::figment()
        .merge(("address", server.bind.clone()))
        .merge(("port", server.port));

    tracing::info!(bind = %server.bind, port = server.port, "Starting Rocket HTTP server");
    build_rocket(state, fig)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
