//! Paged GraphQL query for a pull request's commit history.

use serde::Deserialize;

/// Query text for one page of PR commits (page size 100). `cursor` is
/// the `endCursor` of the previous page, absent on the first call.
pub fn pr_committers_query(owner: &str, repo: &str, number: i64, cursor: Option<&str>) -> String {
    let after = match cursor {
        Some(c) => format!(", after: \"{}\"", c),
        None => String::new(),
    };
    format!(
        "query {{ repository(owner: \"{owner}\", name: \"{repo}\") {{ \
         pullRequest(number: {number}) {{ \
         commits(first: 100{after}) {{ \
         edges {{ node {{ commit {{ \
         author {{ name user {{ login databaseId }} }} \
         committer {{ name user {{ login databaseId }} }} \
         }} }} }} \
         pageInfo {{ hasNextPage endCursor }} \
         }} }} }} }}"
    )
}

#[derive(Debug, Deserialize)]
pub struct GraphqlResponse {
    pub data: Option<ResponseData>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseData {
    pub repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub pull_request: Option<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestNode {
    pub commits: CommitConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitConnection {
    pub edges: Vec<CommitEdge>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct CommitEdge {
    pub node: CommitNode,
}

#[derive(Debug, Deserialize)]
pub struct CommitNode {
    pub commit: Commit,
}

/// Commit author/committer, each possibly a registered user or a raw
/// git identity.
#[derive(Debug, Deserialize)]
pub struct Commit {
    pub author: Option<GitActor>,
    pub committer: Option<GitActor>,
}

#[derive(Debug, Deserialize)]
pub struct GitActor {
    pub name: Option<String>,
    pub user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNode {
    pub login: String,
    pub database_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}
