use thiserror::Error;

/// Error taxonomy for the CLA pipeline.
///
/// The orchestrator is the only place that decides retry vs. abort vs.
/// log-and-continue; component methods return the most specific variant
/// they can.
#[derive(Error, Debug)]
pub enum ClaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// GitHub returned an empty commit list for a PR that should have
    /// commits. Read-after-write lag; eligible for bounded retry.
    #[error("no committers found for {owner}/{repo}#{number}")]
    CommittersUnready {
        owner: String,
        repo: String,
        number: i64,
    },

    #[error("remote service error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("duplicate record: {0}")]
    PersistenceConflict(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook processing error: {0}")]
    Fatal(String),
}

impl ClaError {
    /// 404-class conditions are benign: the PR or repo vanished while we
    /// were processing the delivery.
    pub fn is_not_found(&self) -> bool {
        match self {
            ClaError::NotFound(_) => true,
            ClaError::Remote { status, .. } => *status == 404,
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClaError::PersistenceConflict(_))
    }

    /// The repository moved (HTTP 301-equivalent); the committer
    /// enumerator may recover by re-resolving its canonical coordinates.
    pub fn is_moved(&self) -> bool {
        matches!(self, ClaError::Remote { status: 301, .. })
    }
}

impl From<sqlx::Error> for ClaError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.is_unique_violation() {
                return ClaError::PersistenceConflict(db.to_string());
            }
        }
        ClaError::Database(err)
    }
}
