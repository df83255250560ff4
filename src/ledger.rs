use tracing::debug;

use crate::database::models::PendingRequests;
use crate::database::Database;
use crate::error::ClaError;

/// Per-user bookkeeping of open PRs awaiting a CLA signature. Only
/// committers the oracle reports as not-yet-signed are recorded.
#[derive(Clone)]
pub struct PendingRequestLedger {
    db: Database,
}

impl PendingRequestLedger {
    pub fn new(db: Database) -> Self {
        PendingRequestLedger { db }
    }

    /// Append `number` to each user's `(repo, owner)` bucket. The store
    /// guarantees set-if-absent semantics, so concurrent deliveries for
    /// the same user cannot clobber each other and re-deliveries are
    /// no-ops.
    pub async fn record(
        &self,
        committer_names: &[String],
        repo: &str,
        owner: &str,
        number: i64,
    ) -> Result<(), ClaError> {
        for name in committer_names {
            let inserted = self
                .db
                .add_signature_request(name, owner, repo, number)
                .await?;
            if inserted {
                debug!("recorded pending CLA request for {} on {}/{}#{}", name, owner, repo, number);
            }
        }
        Ok(())
    }

    pub async fn requests_for(&self, name: &str) -> Result<Option<PendingRequests>, ClaError> {
        self.db.pending_requests(name).await
    }
}
