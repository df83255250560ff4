use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::Database;
use crate::error::ClaError;
use crate::github::graphql::Commit;
use crate::github::GithubApi;

/// An identity credited with authoring a commit in a PR. `id` is empty
/// for raw git identities with no registered GitHub account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committer {
    pub name: String,
    pub id: Option<i64>,
}

/// Who gets credit for a commit: author.user, then committer.user, then
/// the raw author, then the raw committer.
fn credit_for(commit: &Commit) -> Option<Committer> {
    for actor in [&commit.author, &commit.committer] {
        if let Some(user) = actor.as_ref().and_then(|a| a.user.as_ref()) {
            return Some(Committer {
                name: user.login.clone(),
                id: user.database_id,
            });
        }
    }
    for actor in [&commit.author, &commit.committer] {
        if let Some(name) = actor.as_ref().and_then(|a| a.name.clone()) {
            return Some(Committer { name, id: None });
        }
    }
    None
}

/// Enumerates a PR's unique committers page by page.
#[derive(Clone)]
pub struct CommitterEnumerator {
    github: Arc<dyn GithubApi>,
    db: Database,
}

impl CommitterEnumerator {
    pub fn new(github: Arc<dyn GithubApi>, db: Database) -> Self {
        CommitterEnumerator { github, db }
    }

    /// Materialized, deduplicated committer set for one PR.
    ///
    /// An empty result is not an error here; the orchestrator owns the
    /// retry policy for GitHub's read-after-write lag. A moved
    /// repository is recovered once by re-resolving the canonical
    /// coordinates through `repo_id` and persisting the rename; without
    /// a `repo_id` the move is terminal.
    pub async fn get_committers(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        number: i64,
        linked_repo_id: Option<i64>,
    ) -> Result<Vec<Committer>, ClaError> {
        let mut owner = owner.to_string();
        let mut repo = repo.to_string();
        let mut cursor: Option<String> = None;
        let mut committers: Vec<Committer> = Vec::new();
        let mut recovered_move = false;

        loop {
            let page = match self
                .github
                .pull_request_commits(token, &owner, &repo, number, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(err) if err.is_moved() && !recovered_move => {
                    let Some(repo_id) = linked_repo_id else {
                        return Err(err);
                    };
                    let canonical = self.github.get_repository_by_id(token, repo_id).await?;
                    if canonical.owner.login == owner && canonical.name == repo {
                        // Nothing to correct; the move is real.
                        return Err(err);
                    }
                    info!(
                        "repository {}/{} moved to {}/{}, updating linked entity",
                        owner, repo, canonical.owner.login, canonical.name
                    );
                    self.db
                        .update_repo_coordinates(repo_id, &canonical.owner.login, &canonical.name)
                        .await?;
                    owner = canonical.owner.login;
                    repo = canonical.name;
                    cursor = None;
                    committers.clear();
                    recovered_move = true;
                    continue;
                }
                // Missing commit data inside a 200 response; surfaces as
                // an empty set so the caller's unready-retry applies.
                Err(ClaError::NotFound(_)) => return Ok(Vec::new()),
                Err(err) => return Err(err),
            };

            for edge in &page.edges {
                if let Some(committer) = credit_for(&edge.node.commit) {
                    if !committers.iter().any(|c| c.name == committer.name) {
                        committers.push(committer);
                    }
                }
            }

            if page.page_info.has_next_page {
                cursor = page.page_info.end_cursor;
            } else {
                break;
            }
        }

        Ok(committers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::graphql::{GitActor, UserNode};

    fn actor(name: Option<&str>, login: Option<&str>, id: Option<i64>) -> Option<GitActor> {
        Some(GitActor {
            name: name.map(str::to_string),
            user: login.map(|l| UserNode {
                login: l.to_string(),
                database_id: id,
            }),
        })
    }

    #[test]
    fn registered_author_wins() {
        let commit = Commit {
            author: actor(Some("Raw Name"), Some("alice"), Some(5)),
            committer: actor(Some("Other"), Some("bob"), Some(6)),
        };
        let committer = credit_for(&commit).unwrap();
        assert_eq!(committer.name, "alice");
        assert_eq!(committer.id, Some(5));
    }

    #[test]
    fn committer_user_beats_raw_author() {
        let commit = Commit {
            author: actor(Some("Raw Name"), None, None),
            committer: actor(None, Some("bob"), Some(6)),
        };
        let committer = credit_for(&commit).unwrap();
        assert_eq!(committer.name, "bob");
    }

    #[test]
    fn raw_author_when_no_registered_user() {
        let commit = Commit {
            author: actor(Some("Raw Name"), None, None),
            committer: actor(Some("Other"), None, None),
        };
        let committer = credit_for(&commit).unwrap();
        assert_eq!(committer.name, "Raw Name");
        assert_eq!(committer.id, None);
    }

    #[test]
    fn no_identity_at_all() {
        let commit = Commit {
            author: None,
            committer: None,
        };
        assert!(credit_for(&commit).is_none());
    }
}
