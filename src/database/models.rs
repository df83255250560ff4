use serde::{Deserialize, Serialize};

/// Repo-level CLA configuration. A missing `gist` means the repo is
/// linked but a CLA is intentionally not required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedRepo {
    pub repo_id: i64,
    pub owner: String,
    pub repo: String,
    pub gist: Option<String>,
    pub token: String,
    pub shared_gist: bool,
    pub min_file_changes: Option<i64>,
    pub min_code_changes: Option<i64>,
}

/// Org-level CLA configuration. `exclude_pattern` is a glob of repo
/// names exempted from the org's CLA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedOrg {
    pub org_id: i64,
    pub org: String,
    pub gist: Option<String>,
    pub token: String,
    pub exclude_pattern: Option<String>,
    pub shared_gist: bool,
    pub min_file_changes: Option<i64>,
    pub min_code_changes: Option<i64>,
}

/// Audit record of an open CLA-relevant pull request.
/// Unique by `(user_id, repo_id, number)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub repo_id: i64,
    pub owner: String,
    pub repo: String,
    pub number: i64,
    pub user: String,
    pub user_id: i64,
    pub created_at: String,
}

/// One `(repo, owner)` bucket of PR numbers awaiting a user's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequestBucket {
    pub repo: String,
    pub owner: String,
    pub numbers: Vec<i64>,
}

/// Per-user view of the pending-request ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequests {
    pub name: String,
    pub requests: Vec<SignatureRequestBucket>,
}
