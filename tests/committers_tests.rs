use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cla_assistant::committers::CommitterEnumerator;
use cla_assistant::database::models::LinkedRepo;
use cla_assistant::database::Database;
use cla_assistant::github::HttpGithubClient;

async fn test_db() -> Database {
    let db = Database::new("sqlite::memory:", None).await.unwrap();
    db.run_schema().await.unwrap();
    db
}

fn enumerator(server: &MockServer, db: Database) -> CommitterEnumerator {
    let client = HttpGithubClient::new(&server.uri(), &format!("{}/graphql", server.uri())).unwrap();
    CommitterEnumerator::new(Arc::new(client), db)
}

fn commit_by(login: &str, id: i64) -> serde_json::Value {
    json!({"node": {"commit": {
        "author": {"name": null, "user": {"login": login, "databaseId": id}},
        "committer": {"name": null, "user": null}
    }}})
}

fn commits_page(edges: Vec<serde_json::Value>, cursor: Option<&str>) -> serde_json::Value {
    json!({"data": {"repository": {"pullRequest": {"commits": {
        "edges": edges,
        "pageInfo": {"hasNextPage": cursor.is_some(), "endCursor": cursor}
    }}}}})
}

#[tokio::test]
async fn committers_are_deduplicated_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commits_page(
            vec![commit_by("alice", 1), commit_by("alice", 1), commit_by("bob", 2)],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let committers = enumerator(&server, test_db().await)
        .get_committers("t", "acme", "widgets", 42, None)
        .await
        .unwrap();

    let names: Vec<_> = committers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);
}

#[tokio::test]
async fn pagination_stops_after_last_page() {
    let server = MockServer::start().await;
    // Second page, requested with the first page's cursor.
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("CUR1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commits_page(
            vec![commit_by("alice", 1), commit_by("bob", 2)],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    // First page.
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commits_page(
            vec![commit_by("alice", 1)],
            Some("CUR1"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let committers = enumerator(&server, test_db().await)
        .get_committers("t", "acme", "widgets", 42, None)
        .await
        .unwrap();

    let names: Vec<_> = committers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);
}

#[tokio::test]
async fn raw_git_identities_keep_an_empty_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commits_page(
            vec![json!({"node": {"commit": {
                "author": {"name": "Old Timer", "user": null},
                "committer": {"name": null, "user": null}
            }}})],
            None,
        )))
        .mount(&server)
        .await;

    let committers = enumerator(&server, test_db().await)
        .get_committers("t", "acme", "widgets", 42, None)
        .await
        .unwrap();

    assert_eq!(committers.len(), 1);
    assert_eq!(committers[0].name, "Old Timer");
    assert_eq!(committers[0].id, None);
}

#[tokio::test]
async fn moved_repository_is_recovered_once_via_repo_id() {
    let server = MockServer::start().await;
    let db = test_db().await;
    db.link_repo(&LinkedRepo {
        repo_id: 7,
        owner: "acme".to_string(),
        repo: "widgets".to_string(),
        gist: Some("g1".to_string()),
        token: "t".to_string(),
        shared_gist: false,
        min_file_changes: None,
        min_code_changes: None,
    })
    .await
    .unwrap();

    // Corrected coordinates succeed; the stale ones report a move.
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("widgets-ng"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commits_page(
            vec![commit_by("alice", 1)],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(301))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repositories/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "name": "widgets-ng",
            "owner": {"login": "acme", "id": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let committers = enumerator(&server, db.clone())
        .get_committers("t", "acme", "widgets", 42, Some(7))
        .await
        .unwrap();
    assert_eq!(committers[0].name, "alice");

    // The rename was persisted on the linked entity.
    let repo = db.find_repo(Some(7), "", "").await.unwrap().unwrap();
    assert_eq!(repo.repo, "widgets-ng");
    assert_eq!(repo.owner, "acme");
}

#[tokio::test]
async fn moved_repository_without_repo_id_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(301))
        .expect(1)
        .mount(&server)
        .await;

    let err = enumerator(&server, test_db().await)
        .get_committers("t", "acme", "widgets", 42, None)
        .await
        .unwrap_err();
    assert!(err.is_moved());
}

#[tokio::test]
async fn missing_commit_data_yields_an_empty_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"repository": null}})),
        )
        .mount(&server)
        .await;

    let committers = enumerator(&server, test_db().await)
        .get_committers("t", "acme", "widgets", 42, None)
        .await
        .unwrap();
    assert!(committers.is_empty());
}
