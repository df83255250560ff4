use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::Router;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tower::ServiceExt;

use cla_assistant::cla::HttpClaOracle;
use cla_assistant::comment::GithubCommentService;
use cla_assistant::config::AppConfig;
use cla_assistant::database::Database;
use cla_assistant::github::HttpGithubClient;
use cla_assistant::webhooks::pull_request::PullRequestPipeline;
use cla_assistant::webhooks::{handle_github_webhook, AppState};

async fn app(config: AppConfig) -> Router {
    let db = Database::new("sqlite::memory:", None).await.unwrap();
    db.run_schema().await.unwrap();
    // Nothing is linked, so no outbound call is ever made.
    let github = Arc::new(HttpGithubClient::new("http://127.0.0.1:1", "http://127.0.0.1:1").unwrap());
    let oracle = Arc::new(HttpClaOracle::new("http://127.0.0.1:1").unwrap());
    let comments = Arc::new(GithubCommentService::new(github.clone(), config.clone()));
    let pipeline = Arc::new(PullRequestPipeline::new(
        config.clone(),
        db,
        github,
        oracle,
        comments,
    ));
    Router::new()
        .route("/webhooks/github", post(handle_github_webhook))
        .with_state(AppState { config, pipeline })
}

fn request(event: &str, body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/github")
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .header("x-github-delivery", "delivery-1");
    if let Some(signature) = signature {
        builder = builder.header("x-hub-signature-256", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn pr_body() -> String {
    json!({
        "action": "opened",
        "number": 42,
        "repository": {
            "id": 7,
            "name": "widgets",
            "private": false,
            "owner": {"login": "acme", "id": 99}
        },
        "pull_request": {
            "number": 42,
            "user": {"login": "alice", "id": 1},
            "created_at": "2024-01-01T00:00:00Z"
        }
    })
    .to_string()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn acknowledges_pull_request_event_with_ok() {
    let app = app(AppConfig::default()).await;
    let response = app
        .oneshot(request("pull_request", &pr_body(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");
}

#[tokio::test]
async fn ignores_other_event_types() {
    let app = app(AppConfig::default()).await;
    let response = app
        .oneshot(request("issues", &pr_body(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");
}

#[tokio::test]
async fn malformed_payload_fails_in_wait_mode() {
    // Default test config waits for completion, so the parse failure
    // surfaces as a 500 with a JSON error body.
    let app = app(AppConfig::default()).await;
    let response = app
        .oneshot(request("pull_request", "{\"action\": 5}", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_string(response).await.contains("error"));
}

#[tokio::test]
async fn malformed_payload_is_acknowledged_without_wait_mode() {
    let config = AppConfig {
        wait_for_completion: false,
        ..AppConfig::default()
    };
    let app = app(config).await;
    let response = app
        .oneshot(request("pull_request", "{\"action\": 5}", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rejects_bad_signature_when_secret_is_configured() {
    let config = AppConfig {
        github_webhook_secret: Some("s3cret".to_string()),
        ..AppConfig::default()
    };
    let app = app(config).await;
    let response = app
        .oneshot(request("pull_request", &pr_body(), Some("sha256=0000".to_string())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn accepts_correctly_signed_delivery() {
    let config = AppConfig {
        github_webhook_secret: Some("s3cret".to_string()),
        ..AppConfig::default()
    };
    let app = app(config).await;

    let body = pr_body();
    let mut mac = Hmac::<Sha256>::new_from_slice(b"s3cret").unwrap();
    mac.update(body.as_bytes());
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    let response = app
        .oneshot(request("pull_request", &body, Some(signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");
}
