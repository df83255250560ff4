pub mod models;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::error::ClaError;
use models::{LinkedOrg, LinkedRepo, PendingRequests, PullRequestRecord, SignatureRequestBucket};

/// Persistence handle for linked entities, pull-request records and the
/// pending-request ledger rows.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    /// When set, replaces the stored token on every loaded entity.
    admin_token: Option<String>,
}

impl Database {
    pub async fn new(database_url: &str, admin_token: Option<String>) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Database { pool, admin_token })
    }

    pub async fn run_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn entity_token(&self, stored: String) -> String {
        self.admin_token.clone().unwrap_or(stored)
    }

    /// Repo lookup: `repo_id` primary, `(owner, repo)` fallback.
    pub async fn find_repo(
        &self,
        repo_id: Option<i64>,
        owner: &str,
        repo: &str,
    ) -> Result<Option<LinkedRepo>, ClaError> {
        let row = match repo_id {
            Some(id) => {
                sqlx::query("SELECT * FROM linked_repos WHERE repo_id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM linked_repos WHERE owner = $1 AND repo = $2")
                    .bind(owner)
                    .bind(repo)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        Ok(row.map(|row| LinkedRepo {
            repo_id: row.get("repo_id"),
            owner: row.get("owner"),
            repo: row.get("repo"),
            gist: row.get("gist"),
            token: self.entity_token(row.get("token")),
            shared_gist: row.get("shared_gist"),
            min_file_changes: row.get("min_file_changes"),
            min_code_changes: row.get("min_code_changes"),
        }))
    }

    pub async fn find_org(&self, org_id: i64) -> Result<Option<LinkedOrg>, ClaError> {
        let row = sqlx::query("SELECT * FROM linked_orgs WHERE org_id = $1")
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| LinkedOrg {
            org_id: row.get("org_id"),
            org: row.get("org"),
            gist: row.get("gist"),
            token: self.entity_token(row.get("token")),
            exclude_pattern: row.get("exclude_pattern"),
            shared_gist: row.get("shared_gist"),
            min_file_changes: row.get("min_file_changes"),
            min_code_changes: row.get("min_code_changes"),
        }))
    }

    pub async fn link_repo(&self, repo: &LinkedRepo) -> Result<(), ClaError> {
        sqlx::query(
            "INSERT INTO linked_repos \
             (repo_id, owner, repo, gist, token, shared_gist, min_file_changes, min_code_changes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(repo.repo_id)
        .bind(&repo.owner)
        .bind(&repo.repo)
        .bind(&repo.gist)
        .bind(&repo.token)
        .bind(repo.shared_gist)
        .bind(repo.min_file_changes)
        .bind(repo.min_code_changes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn link_org(&self, org: &LinkedOrg) -> Result<(), ClaError> {
        sqlx::query(
            "INSERT INTO linked_orgs \
             (org_id, org, gist, token, exclude_pattern, shared_gist, min_file_changes, min_code_changes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(org.org_id)
        .bind(&org.org)
        .bind(&org.gist)
        .bind(&org.token)
        .bind(&org.exclude_pattern)
        .bind(org.shared_gist)
        .bind(org.min_file_changes)
        .bind(org.min_code_changes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn unlink_repo(&self, repo_id: i64) -> Result<(), ClaError> {
        sqlx::query("DELETE FROM linked_repos WHERE repo_id = $1")
            .bind(repo_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn unlink_org(&self, org_id: i64) -> Result<(), ClaError> {
        sqlx::query("DELETE FROM linked_orgs WHERE org_id = $1")
            .bind(org_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Repo was renamed or transferred; rewrite its stored coordinates.
    pub async fn update_repo_coordinates(
        &self,
        repo_id: i64,
        owner: &str,
        repo: &str,
    ) -> Result<(), ClaError> {
        sqlx::query("UPDATE linked_repos SET owner = $1, repo = $2 WHERE repo_id = $3")
            .bind(owner)
            .bind(repo)
            .bind(repo_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert a pull-request record. A concurrent duplicate delivery
    /// surfaces as `PersistenceConflict`; the caller decides whether that
    /// is benign.
    pub async fn store_pull_request(&self, pr: &PullRequestRecord) -> Result<(), ClaError> {
        sqlx::query(
            "INSERT INTO pull_requests (repo_id, owner, repo, number, user, user_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(pr.repo_id)
        .bind(&pr.owner)
        .bind(&pr.repo)
        .bind(pr.number)
        .bind(&pr.user)
        .bind(pr.user_id)
        .bind(&pr.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert variant for reconciliation: insert only if absent, no-op
    /// otherwise.
    pub async fn store_pull_request_if_absent(
        &self,
        pr: &PullRequestRecord,
    ) -> Result<(), ClaError> {
        sqlx::query(
            "INSERT INTO pull_requests (repo_id, owner, repo, number, user, user_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, repo_id, number) DO NOTHING",
        )
        .bind(pr.repo_id)
        .bind(&pr.owner)
        .bind(&pr.repo)
        .bind(pr.number)
        .bind(&pr.user)
        .bind(pr.user_id)
        .bind(&pr.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_pull_request(
        &self,
        user_id: i64,
        repo_id: i64,
        number: i64,
    ) -> Result<(), ClaError> {
        sqlx::query("DELETE FROM pull_requests WHERE user_id = $1 AND repo_id = $2 AND number = $3")
            .bind(user_id)
            .bind(repo_id)
            .bind(number)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn pull_request_exists(
        &self,
        user_id: i64,
        repo_id: i64,
        number: i64,
    ) -> Result<bool, ClaError> {
        let row = sqlx::query(
            "SELECT 1 AS present FROM pull_requests \
             WHERE user_id = $1 AND repo_id = $2 AND number = $3",
        )
        .bind(user_id)
        .bind(repo_id)
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Atomic set-if-absent append to a user's pending-request bucket.
    /// Returns whether a new row was inserted.
    pub async fn add_signature_request(
        &self,
        name: &str,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<bool, ClaError> {
        let result = sqlx::query(
            "INSERT INTO signature_requests (name, owner, repo, number) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (name, owner, repo, number) DO NOTHING",
        )
        .bind(name)
        .bind(owner)
        .bind(repo)
        .bind(number)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ledger view for one user: rows grouped into `(repo, owner)`
    /// buckets, insertion order preserved.
    pub async fn pending_requests(&self, name: &str) -> Result<Option<PendingRequests>, ClaError> {
        let rows = sqlx::query(
            "SELECT owner, repo, number FROM signature_requests \
             WHERE name = $1 ORDER BY rowid",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut requests: Vec<SignatureRequestBucket> = Vec::new();
        for row in rows {
            let owner: String = row.get("owner");
            let repo: String = row.get("repo");
            let number: i64 = row.get("number");
            match requests
                .iter_mut()
                .find(|b| b.repo == repo && b.owner == owner)
            {
                Some(bucket) => {
                    if !bucket.numbers.contains(&number) {
                        bucket.numbers.push(number);
                    }
                }
                None => requests.push(SignatureRequestBucket {
                    repo,
                    owner,
                    numbers: vec![number],
                }),
            }
        }

        Ok(Some(PendingRequests {
            name: name.to_string(),
            requests,
        }))
    }
}
