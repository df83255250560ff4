use std::sync::Arc;

use async_trait::async_trait;

use crate::cla::UserMap;
use crate::config::AppConfig;
use crate::error::ClaError;
use crate::github::GithubApi;

/// Marker embedded in every badge comment so it can be found and edited
/// in place instead of appended on each delivery.
const BADGE_MARKER: &str = "<!-- cla-assistant badge -->";

#[async_trait]
pub trait CommentService: Send + Sync {
    /// Post or update the CLA badge comment on a PR.
    async fn badge_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        signed: bool,
        user_map: &UserMap,
    ) -> Result<(), ClaError>;

    /// Remove the badge comment, if present.
    async fn delete_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<(), ClaError>;
}

/// Badge comments via the GitHub issues API.
pub struct GithubCommentService {
    github: Arc<dyn GithubApi>,
    config: AppConfig,
}

impl GithubCommentService {
    pub fn new(github: Arc<dyn GithubApi>, config: AppConfig) -> Self {
        GithubCommentService { github, config }
    }

    fn badge_body(&self, owner: &str, repo: &str, number: i64, signed: bool, user_map: &UserMap) -> String {
        let url = self.config.cla_url(owner, repo, number);
        if signed {
            return format!(
                "{BADGE_MARKER}\n[![CLA assistant check]({}/pull/badge/signed)]({url})\n\
                 All committers have signed the CLA.",
                self.config.cla_server_url
            );
        }
        let mut body = format!(
            "{BADGE_MARKER}\n[![CLA assistant check]({}/pull/badge/not_signed)]({url})\n\
             Thank you for your submission. Before we can merge this pull request, \
             the following committers still need to [sign our Contributor License Agreement]({url}):\n",
            self.config.cla_server_url
        );
        for name in &user_map.not_signed {
            body.push_str(&format!("- [ ] @{}\n", name));
        }
        if !user_map.unknown.is_empty() {
            body.push_str(&format!(
                "\nThe following commits were authored by identities with no GitHub account: {}\n",
                user_map.unknown.join(", ")
            ));
        }
        body
    }

    async fn find_badge_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Option<i64>, ClaError> {
        let comments = self
            .github
            .list_issue_comments(token, owner, repo, number)
            .await?;
        Ok(comments
            .iter()
            .find(|c| c.body.contains(BADGE_MARKER) || c.body.contains("CLA assistant check"))
            .map(|c| c.id))
    }
}

#[async_trait]
impl CommentService for GithubCommentService {
    async fn badge_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        signed: bool,
        user_map: &UserMap,
    ) -> Result<(), ClaError> {
        let body = self.badge_body(owner, repo, number, signed, user_map);
        match self.find_badge_comment(token, owner, repo, number).await? {
            Some(comment_id) => {
                self.github
                    .update_issue_comment(token, owner, repo, comment_id, &body)
                    .await
            }
            None => {
                self.github
                    .create_issue_comment(token, owner, repo, number, &body)
                    .await
            }
        }
    }

    async fn delete_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<(), ClaError> {
        if let Some(comment_id) = self.find_badge_comment(token, owner, repo, number).await? {
            self.github
                .delete_issue_comment(token, owner, repo, comment_id)
                .await?;
        }
        Ok(())
    }
}
