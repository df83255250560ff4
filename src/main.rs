use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{response::Json, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cla_assistant::cla::HttpClaOracle;
use cla_assistant::comment::GithubCommentService;
use cla_assistant::config::AppConfig;
use cla_assistant::database::Database;
use cla_assistant::github::HttpGithubClient;
use cla_assistant::webhooks::pull_request::PullRequestPipeline;
use cla_assistant::webhooks::{handle_github_webhook, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cla_assistant=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CLA assistant");

    let config = AppConfig::load()?;
    info!("Configuration loaded");

    let database = Database::new(&config.database_url, config.github_admin_token.clone()).await?;
    database.run_schema().await?;
    info!("Database connected");

    let github = Arc::new(HttpGithubClient::new(
        &config.github_api_url,
        &config.github_graphql_url,
    )?);
    let oracle = Arc::new(HttpClaOracle::new(&config.signature_service_url)?);
    let comments = Arc::new(GithubCommentService::new(github.clone(), config.clone()));

    let pipeline = Arc::new(PullRequestPipeline::new(
        config.clone(),
        database,
        github,
        oracle,
        comments,
    ));

    let state = AppState {
        config: config.clone(),
        pipeline,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/webhooks/github", post(handle_github_webhook))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).into_inner())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cla-assistant",
        "timestamp": chrono::Utc::now()
    }))
}
