use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cla_assistant::config::AppConfig;
use cla_assistant::github::HttpGithubClient;
use cla_assistant::status::StatusReporter;

fn reporter(server: &MockServer) -> StatusReporter {
    let client = HttpGithubClient::new(&server.uri(), &format!("{}/graphql", server.uri())).unwrap();
    StatusReporter::new(Arc::new(client), AppConfig::default())
}

async fn mock_combined_status(server: &MockServer, statuses: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/commits/abc/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "pending",
            "statuses": statuses
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn matching_status_issues_no_create_call() {
    let server = MockServer::start().await;
    mock_combined_status(
        &server,
        json!([{
            "context": "license/cla",
            "state": "success",
            "description": "All CLA requirements met.",
            "target_url": "https://cla-assistant.io/acme/widgets?pullRequest=42"
        }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/statuses/abc"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    reporter(&server)
        .update("t", "acme", "widgets", 42, Some("abc"), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn differing_status_issues_exactly_one_create_call() {
    let server = MockServer::start().await;
    mock_combined_status(
        &server,
        json!([{
            "context": "license/cla",
            "state": "pending",
            "description": "Contributor License Agreement is not signed yet.",
            "target_url": "https://cla-assistant.io/acme/widgets?pullRequest=42"
        }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/statuses/abc"))
        .and(body_string_contains("All CLA requirements met."))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    reporter(&server)
        .update("t", "acme", "widgets", 42, Some("abc"), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn absent_status_is_created_for_signed_update() {
    let server = MockServer::start().await;
    mock_combined_status(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/statuses/abc"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    reporter(&server)
        .update("t", "acme", "widgets", 42, Some("abc"), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn no_cla_variant_skips_commits_without_a_cla_status() {
    let server = MockServer::start().await;
    mock_combined_status(
        &server,
        json!([{"context": "ci/build", "state": "success", "description": null, "target_url": null}]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/statuses/abc"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    reporter(&server)
        .update_for_no_cla("t", "acme", "widgets", 42, Some("abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn not_required_variant_creates_success_status() {
    let server = MockServer::start().await;
    mock_combined_status(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/statuses/abc"))
        .and(body_string_contains("No Contributor License Agreement required."))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    reporter(&server)
        .update_for_cla_not_required("t", "acme", "widgets", 42, Some("abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn pending_legacy_context_is_migrated_to_success() {
    let server = MockServer::start().await;
    mock_combined_status(
        &server,
        json!([{
            "context": "licence/cla",
            "state": "pending",
            "description": "Contributor License Agreement is not signed yet.",
            "target_url": null
        }]),
    )
    .await;
    // One create for the legacy context, one for the current one.
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/statuses/abc"))
        .and(body_string_contains("licence/cla"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/statuses/abc"))
        .and(body_string_contains("license/cla"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    reporter(&server)
        .update("t", "acme", "widgets", 42, Some("abc"), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn head_sha_is_resolved_when_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/42"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"number": 42, "head": {"sha": "abc"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mock_combined_status(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/statuses/abc"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    reporter(&server)
        .update("t", "acme", "widgets", 42, None, false)
        .await
        .unwrap();
}
