pub mod pull_request;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::github::types::PullRequestEvent;
use crate::webhooks::pull_request::PullRequestPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Arc<PullRequestPipeline>,
}

/// Inbound GitHub webhook endpoint. Always acknowledges with `200 OK`
/// and the body `"OK"`; only when wait-for-completion mode is on does a
/// pipeline failure turn into a `500` with a JSON error body.
pub async fn handle_github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.config.github_webhook_secret {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, signature) {
            warn!("webhook delivery rejected: bad or missing signature");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "invalid signature"})),
            )
                .into_response();
        }
    }

    let event_name = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if event_name != "pull_request" {
        info!("ignoring {} event", if event_name.is_empty() { "unnamed" } else { event_name });
        return (StatusCode::OK, "OK").into_response();
    }

    let delivery_id = headers
        .get("x-github-delivery")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let event: PullRequestEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!("malformed pull_request payload on delivery {}: {}", delivery_id, err);
            if state.config.wait_for_completion {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({"error": err.to_string()})),
                )
                    .into_response();
            }
            return (StatusCode::OK, "OK").into_response();
        }
    };

    if state.config.wait_for_completion {
        match state.pipeline.handle_delivery(event, delivery_id).await {
            Ok(()) => (StatusCode::OK, "OK").into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": err.to_string()})),
            )
                .into_response(),
        }
    } else {
        let pipeline = state.pipeline.clone();
        // Failures are logged inside handle_delivery.
        tokio::spawn(async move {
            let _ = pipeline.handle_delivery(event, delivery_id).await;
        });
        (StatusCode::OK, "OK").into_response()
    }
}

type HmacSha256 = Hmac<Sha256>;

fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(hex_digest) = header.and_then(|h| h.strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
