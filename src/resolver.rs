use glob::Pattern;
use tracing::warn;

use crate::database::models::{LinkedOrg, LinkedRepo};
use crate::database::Database;
use crate::error::ClaError;

/// The CLA configuration governing a repository: either the repo's own
/// link or its organization's. A `gist` of `None` on either variant
/// means "linked, CLA intentionally not required".
#[derive(Debug, Clone)]
pub enum LinkedEntity {
    Repo(LinkedRepo),
    Org(LinkedOrg),
}

impl LinkedEntity {
    pub fn gist(&self) -> Option<&str> {
        match self {
            LinkedEntity::Repo(r) => r.gist.as_deref(),
            LinkedEntity::Org(o) => o.gist.as_deref(),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            LinkedEntity::Repo(r) => &r.token,
            LinkedEntity::Org(o) => &o.token,
        }
    }

    /// Present only for repo-level links; the committer enumerator needs
    /// it for moved-repository recovery.
    pub fn repo_id(&self) -> Option<i64> {
        match self {
            LinkedEntity::Repo(r) => Some(r.repo_id),
            LinkedEntity::Org(_) => None,
        }
    }

    /// Whether the org's exclusion pattern exempts this repo from the
    /// CLA. Repo-level links are never excluded.
    pub fn is_excluded(&self, repo_name: &str) -> bool {
        let LinkedEntity::Org(org) = self else {
            return false;
        };
        let Some(pattern) = org.exclude_pattern.as_deref() else {
            return false;
        };
        match Pattern::new(pattern) {
            Ok(p) => p.matches(repo_name),
            Err(err) => {
                warn!("invalid exclude pattern {:?} on org {}: {}", pattern, org.org, err);
                false
            }
        }
    }
}

/// Finds the linked entity governing a repo: repo-level link first
/// (by id, then by name), org-level link as fallback.
#[derive(Clone)]
pub struct LinkedEntityResolver {
    db: Database,
}

impl LinkedEntityResolver {
    pub fn new(db: Database) -> Self {
        LinkedEntityResolver { db }
    }

    /// `Ok(None)` means nothing is linked at all. An excluded org is
    /// still returned so callers can tell "linked but excluded" apart
    /// from "not linked" (via `is_excluded`).
    pub async fn resolve(
        &self,
        owner: &str,
        repo: &str,
        repo_id: Option<i64>,
        org_id: Option<i64>,
    ) -> Result<Option<LinkedEntity>, ClaError> {
        if let Some(linked_repo) = self.db.find_repo(repo_id, owner, repo).await? {
            return Ok(Some(LinkedEntity::Repo(linked_repo)));
        }
        if let Some(org_id) = org_id {
            if let Some(org) = self.db.find_org(org_id).await? {
                return Ok(Some(LinkedEntity::Org(org)));
            }
        }
        Ok(None)
    }
}
