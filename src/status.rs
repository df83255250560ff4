use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::error::ClaError;
use crate::github::types::CommitStatus;
use crate::github::GithubApi;

pub const CLA_CONTEXT: &str = "license/cla";
/// Pre-rename spelling still present on old commits; migrated to
/// success once, never written for new statuses.
const LEGACY_CONTEXT: &str = "licence/cla";

pub const SIGNED_DESCRIPTION: &str = "All CLA requirements met.";
pub const PENDING_DESCRIPTION: &str = "Contributor License Agreement is not signed yet.";
pub const NOT_REQUIRED_DESCRIPTION: &str = "No Contributor License Agreement required.";

/// Applies the `license/cla` commit status idempotently: statuses are
/// only created when the desired tuple differs from what is already on
/// the head commit.
#[derive(Clone)]
pub struct StatusReporter {
    github: Arc<dyn GithubApi>,
    config: AppConfig,
}

impl StatusReporter {
    pub fn new(github: Arc<dyn GithubApi>, config: AppConfig) -> Self {
        StatusReporter { github, config }
    }

    /// Reflect the signature verdict on the PR's head commit.
    pub async fn update(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        sha: Option<&str>,
        signed: bool,
    ) -> Result<(), ClaError> {
        let status = CommitStatus {
            context: CLA_CONTEXT.to_string(),
            state: if signed { "success" } else { "pending" }.to_string(),
            description: Some(
                if signed {
                    SIGNED_DESCRIPTION
                } else {
                    PENDING_DESCRIPTION
                }
                .to_string(),
            ),
            target_url: Some(self.config.cla_url(owner, repo, number)),
        };
        self.update_if_needed(token, owner, repo, number, sha, status, false)
            .await
    }

    /// The oracle decided no CLA applies to this PR: report success.
    pub async fn update_for_cla_not_required(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        sha: Option<&str>,
    ) -> Result<(), ClaError> {
        let status = success_status(NOT_REQUIRED_DESCRIPTION);
        self.update_if_needed(token, owner, repo, number, sha, status, false)
            .await
    }

    /// The linked entity carries no CLA at all: clear a stale pending
    /// status if one exists, otherwise leave the commit untouched.
    pub async fn update_for_no_cla(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        sha: Option<&str>,
    ) -> Result<(), ClaError> {
        let status = success_status(NOT_REQUIRED_DESCRIPTION);
        self.update_if_needed(token, owner, repo, number, sha, status, true)
            .await
    }

    async fn update_if_needed(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        sha: Option<&str>,
        status: CommitStatus,
        allow_absent: bool,
    ) -> Result<(), ClaError> {
        let sha = match sha {
            Some(sha) => sha.to_string(),
            None => {
                self.github
                    .get_pull_request(token, owner, repo, number)
                    .await?
                    .head
                    .sha
            }
        };

        let combined = self
            .github
            .get_combined_status(token, owner, repo, &sha)
            .await?;

        // One-time migration: a pending status under the old context
        // spelling gets flipped to success alongside the new one.
        if status.state == "success" {
            let legacy_pending = combined
                .statuses
                .iter()
                .any(|s| s.context == LEGACY_CONTEXT && s.state == "pending");
            if legacy_pending {
                let legacy = CommitStatus {
                    context: LEGACY_CONTEXT.to_string(),
                    ..status.clone()
                };
                if let Err(err) = self
                    .github
                    .create_status(token, owner, repo, &sha, &legacy)
                    .await
                {
                    warn!("failed to migrate legacy CLA status on {}/{}@{}: {}", owner, repo, sha, err);
                }
            }
        }

        let current = combined.statuses.iter().find(|s| s.context == CLA_CONTEXT);

        match current {
            None if allow_absent => Ok(()),
            Some(current)
                if current.state == status.state
                    && current.description == status.description
                    && current.target_url == status.target_url =>
            {
                Ok(())
            }
            _ => {
                self.github
                    .create_status(token, owner, repo, &sha, &status)
                    .await
                    .map_err(|err| {
                        warn!(
                            "create status failed for {}/{}#{} (token rights?): {}",
                            owner, repo, number, err
                        );
                        err
                    })
            }
        }
    }
}

fn success_status(description: &str) -> CommitStatus {
    CommitStatus {
        context: CLA_CONTEXT.to_string(),
        state: "success".to_string(),
        description: Some(description.to_string()),
        target_url: None,
    }
}
