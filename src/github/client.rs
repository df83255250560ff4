use async_trait::async_trait;
use reqwest::redirect::Policy;
use serde_json::json;
use tracing::info;

use crate::error::ClaError;
use crate::github::graphql::{self, CommitConnection, GraphqlResponse};
use crate::github::types::{
    CombinedStatus, CommitStatus, IssueComment, PullRequestInfo, RepositoryInfo,
};

/// Remote-call surface of the GitHub API used by the CLA pipeline.
/// Callers own the retry policy; this layer only maps transport and
/// status-code failures onto `ClaError::Remote`.
#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn get_pull_request(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<PullRequestInfo, ClaError>;

    async fn get_combined_status(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CombinedStatus, ClaError>;

    async fn create_status(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<(), ClaError>;

    /// Canonical repository coordinates, looked up by numeric id so the
    /// call itself cannot be redirected.
    async fn get_repository_by_id(
        &self,
        token: &str,
        repo_id: i64,
    ) -> Result<RepositoryInfo, ClaError>;

    /// One page of the PR's commit history via GraphQL. Reports a moved
    /// repository as `Remote {status: 301}`.
    async fn pull_request_commits(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        cursor: Option<&str>,
    ) -> Result<CommitConnection, ClaError>;

    async fn list_issue_comments(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<IssueComment>, ClaError>;

    async fn create_issue_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<(), ClaError>;

    async fn update_issue_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        comment_id: i64,
        body: &str,
    ) -> Result<(), ClaError>;

    async fn delete_issue_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        comment_id: i64,
    ) -> Result<(), ClaError>;
}

pub struct HttpGithubClient {
    http: reqwest::Client,
    api_url: String,
    graphql_url: String,
}

impl HttpGithubClient {
    pub fn new(api_url: &str, graphql_url: &str) -> Result<Self, ClaError> {
        // Redirects stay visible: a 301 from GitHub means the repository
        // moved and the committer enumerator handles it explicitly.
        let http = reqwest::Client::builder()
            .user_agent("cla-assistant")
            .redirect(Policy::none())
            .build()?;
        Ok(HttpGithubClient {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            graphql_url: graphql_url.to_string(),
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        token: &str,
        path: &str,
    ) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_url, path))
            .header("Authorization", format!("token {}", token))
            .header("Accept", "application/vnd.github+json")
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, ClaError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ClaError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl GithubApi for HttpGithubClient {
    async fn get_pull_request(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<PullRequestInfo, ClaError> {
        let response = self
            .request(
                reqwest::Method::GET,
                token,
                &format!("/repos/{owner}/{repo}/pulls/{number}"),
            )
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    async fn get_combined_status(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CombinedStatus, ClaError> {
        let response = self
            .request(
                reqwest::Method::GET,
                token,
                &format!("/repos/{owner}/{repo}/commits/{sha}/status"),
            )
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    async fn create_status(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<(), ClaError> {
        let response = self
            .request(
                reqwest::Method::POST,
                token,
                &format!("/repos/{owner}/{repo}/statuses/{sha}"),
            )
            .json(status)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn get_repository_by_id(
        &self,
        token: &str,
        repo_id: i64,
    ) -> Result<RepositoryInfo, ClaError> {
        let response = self
            .request(
                reqwest::Method::GET,
                token,
                &format!("/repositories/{repo_id}"),
            )
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    async fn pull_request_commits(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        cursor: Option<&str>,
    ) -> Result<CommitConnection, ClaError> {
        let query = graphql::pr_committers_query(owner, repo, number, cursor);
        let response = self
            .http
            .post(&self.graphql_url)
            .header("Authorization", format!("bearer {}", token))
            .json(&json!({ "query": query }))
            .send()
            .await?;
        let body: GraphqlResponse = self.check(response).await?.json().await?;

        if let Some(errors) = &body.errors {
            if let Some(first) = errors.first() {
                info!("graphql error on {}/{}#{}: {}", owner, repo, number, first.message);
            }
        }

        body.data
            .and_then(|d| d.repository)
            .and_then(|r| r.pull_request)
            .map(|pr| pr.commits)
            .ok_or_else(|| {
                ClaError::NotFound(format!("no commit data for {}/{}#{}", owner, repo, number))
            })
    }

    async fn list_issue_comments(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<IssueComment>, ClaError> {
        let response = self
            .request(
                reqwest::Method::GET,
                token,
                &format!("/repos/{owner}/{repo}/issues/{number}/comments?per_page=100"),
            )
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    async fn create_issue_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<(), ClaError> {
        let response = self
            .request(
                reqwest::Method::POST,
                token,
                &format!("/repos/{owner}/{repo}/issues/{number}/comments"),
            )
            .json(&json!({ "body": body }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn update_issue_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        comment_id: i64,
        body: &str,
    ) -> Result<(), ClaError> {
        let response = self
            .request(
                reqwest::Method::PATCH,
                token,
                &format!("/repos/{owner}/{repo}/issues/comments/{comment_id}"),
            )
            .json(&json!({ "body": body }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn delete_issue_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        comment_id: i64,
    ) -> Result<(), ClaError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                token,
                &format!("/repos/{owner}/{repo}/issues/comments/{comment_id}"),
            )
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}
