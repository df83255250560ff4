use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::cla::{ClaCheckArgs, ClaOracle, UserMap};
use crate::comment::CommentService;
use crate::committers::{Committer, CommitterEnumerator};
use crate::config::AppConfig;
use crate::database::models::PullRequestRecord;
use crate::database::Database;
use crate::error::ClaError;
use crate::github::types::PullRequestEvent;
use crate::github::GithubApi;
use crate::ledger::PendingRequestLedger;
use crate::metrics;
use crate::resolver::{LinkedEntity, LinkedEntityResolver};
use crate::status::StatusReporter;

/// Actions that trigger the full CLA pipeline.
const PIPELINE_ACTIONS: &[&str] = &["opened", "reopened", "synchronize"];
/// Actions that feed the pull-request store bookkeeping.
const STORE_ACTIONS: &[&str] = &["opened", "reopened", "closed"];

/// Immutable per-delivery context, built once from the webhook payload
/// and threaded by value; stages return enriched copies.
#[derive(Debug, Clone)]
pub struct WebhookContext {
    pub action: String,
    pub owner: String,
    pub repo: String,
    pub repo_id: i64,
    pub number: i64,
    pub org_id: Option<i64>,
    pub user: String,
    pub user_id: i64,
    pub created_at: String,
    pub delivery_id: String,
    /// Populated after entity resolution.
    pub token: Option<String>,
    pub gist: Option<String>,
}

impl WebhookContext {
    pub fn from_event(event: &PullRequestEvent, delivery_id: &str) -> Result<Self, ClaError> {
        let repository = event
            .repository
            .as_ref()
            .ok_or_else(|| ClaError::Validation("event has no repository".to_string()))?;
        let pull_request = event
            .pull_request
            .as_ref()
            .ok_or_else(|| ClaError::Validation("event has no pull_request".to_string()))?;
        let number = event.number.unwrap_or(pull_request.number);

        // The org id falls back to the repo owner for user-owned repos,
        // as GitHub omits the organization object there.
        let org_id = event
            .organization
            .as_ref()
            .map(|o| o.id)
            .or(Some(repository.owner.id));

        Ok(WebhookContext {
            action: event.action.clone(),
            owner: repository.owner.login.clone(),
            repo: repository.name.clone(),
            repo_id: repository.id,
            number,
            org_id,
            user: pull_request.user.login.clone(),
            user_id: pull_request.user.id,
            created_at: pull_request.created_at.clone(),
            delivery_id: delivery_id.to_string(),
            token: None,
            gist: None,
        })
    }

    fn with_entity(self, entity: &LinkedEntity) -> Self {
        WebhookContext {
            token: Some(entity.token().to_string()),
            gist: entity.gist().map(str::to_string),
            // A repo-level link owns the CLA outright; the oracle must
            // not fall back to the org's agreement.
            org_id: match entity {
                LinkedEntity::Repo(_) => None,
                LinkedEntity::Org(_) => self.org_id,
            },
            ..self
        }
    }

    /// Token after entity resolution. Calling this earlier is a logic
    /// error, reported as such rather than panicking.
    fn token(&self) -> Result<&str, ClaError> {
        self.token
            .as_deref()
            .ok_or_else(|| ClaError::Fatal("context used before entity resolution".to_string()))
    }

    fn cla_args(&self) -> Result<ClaCheckArgs, ClaError> {
        Ok(ClaCheckArgs {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            repo_id: Some(self.repo_id),
            org_id: self.org_id,
            number: self.number,
            gist: self.gist.clone(),
            token: self.token()?.to_string(),
        })
    }
}

/// Per-delivery state machine: resolve the linked entity, check whether
/// a CLA is required, enumerate committers, consult the signature
/// oracle, then reflect the verdict as commit status, badge comment and
/// pending-request ledger entries.
pub struct PullRequestPipeline {
    config: AppConfig,
    db: Database,
    github: Arc<dyn GithubApi>,
    oracle: Arc<dyn ClaOracle>,
    comments: Arc<dyn CommentService>,
    resolver: LinkedEntityResolver,
    committers: CommitterEnumerator,
    status: StatusReporter,
    ledger: PendingRequestLedger,
}

impl PullRequestPipeline {
    pub fn new(
        config: AppConfig,
        db: Database,
        github: Arc<dyn GithubApi>,
        oracle: Arc<dyn ClaOracle>,
        comments: Arc<dyn CommentService>,
    ) -> Self {
        let resolver = LinkedEntityResolver::new(db.clone());
        let committers = CommitterEnumerator::new(github.clone(), db.clone());
        let status = StatusReporter::new(github.clone(), config.clone());
        let ledger = PendingRequestLedger::new(db.clone());
        PullRequestPipeline {
            config,
            db,
            github,
            oracle,
            comments,
            resolver,
            committers,
            status,
            ledger,
        }
    }

    /// Entry point for one webhook delivery. The store bookkeeping runs
    /// as an independent concern next to the CLA pipeline; its failures
    /// never abort the delivery.
    pub async fn handle_delivery(
        &self,
        event: PullRequestEvent,
        delivery_id: String,
    ) -> Result<(), ClaError> {
        let (processed, bookkept) = tokio::join!(
            self.process(&event, &delivery_id),
            self.manage_pull_request_store(&event)
        );

        if let Err(err) = bookkept {
            if err.is_conflict() {
                // Concurrent duplicate delivery; the unique key did its job.
                debug!("duplicate pull request record for delivery {}", delivery_id);
            } else {
                error!("pull request store bookkeeping failed for delivery {}: {}", delivery_id, err);
            }
        }

        if let Err(err) = &processed {
            error!(
                "delivery {} failed for {}: {}",
                delivery_id,
                event
                    .repository
                    .as_ref()
                    .map(|r| format!("{}/{}", r.owner.login, r.name))
                    .unwrap_or_else(|| "<unknown repo>".to_string()),
                err
            );
        }
        processed
    }

    async fn process(&self, event: &PullRequestEvent, delivery_id: &str) -> Result<(), ClaError> {
        if !PIPELINE_ACTIONS.contains(&event.action.as_str()) {
            return Ok(());
        }
        let Some(repository) = event.repository.as_ref() else {
            return Ok(());
        };
        if repository.private && !self.config.process_private_repos {
            return Ok(());
        }
        if let Some(url) = event.pull_request.as_ref().and_then(|pr| pr.html_url.as_deref()) {
            info!("pull request {} {}", event.action, url);
        }

        // Let GitHub's own eventual consistency settle before querying
        // commit data.
        sleep(Duration::from_millis(self.config.enforce_delay_ms)).await;

        let ctx = WebhookContext::from_event(event, delivery_id)?;
        match self.run(ctx).await {
            // The PR or repo vanished mid-processing; expected, benign.
            Err(err) if err.is_not_found() => {
                info!("delivery {}: target disappeared during processing ({})", delivery_id, err);
                Ok(())
            }
            other => other,
        }
    }

    async fn run(&self, ctx: WebhookContext) -> Result<(), ClaError> {
        let started = Instant::now();

        let Some(entity) = self
            .resolver
            .resolve(&ctx.owner, &ctx.repo, Some(ctx.repo_id), ctx.org_id)
            .await?
        else {
            debug!("{}/{} is not linked, ignoring delivery {}", ctx.owner, ctx.repo, ctx.delivery_id);
            return Ok(());
        };

        if entity.is_excluded(&ctx.repo) {
            debug!("{}/{} is excluded from its org CLA", ctx.owner, ctx.repo);
            return Ok(());
        }

        let ctx = ctx.with_entity(&entity);
        let token = ctx.token()?.to_string();

        if ctx.gist.is_none() {
            // Linked with no CLA configured: clear a stale pending
            // status if one exists, nothing else to do.
            return self
                .status
                .update_for_no_cla(&token, &ctx.owner, &ctx.repo, ctx.number, None)
                .await;
        }

        // Org-governed repos are processed only while they still exist
        // on GitHub; a 404 here ends the delivery as benign.
        if matches!(entity, LinkedEntity::Org(_)) {
            self.github.get_repository_by_id(&token, ctx.repo_id).await?;
        }

        if !self.oracle.is_cla_required(&ctx.cla_args()?).await? {
            self.status
                .update_for_cla_not_required(&token, &ctx.owner, &ctx.repo, ctx.number, None)
                .await?;
            self.comments
                .delete_comment(&token, &ctx.owner, &ctx.repo, ctx.number)
                .await?;
            return Ok(());
        }

        let Some(committers) = self.enumerate_with_retry(&ctx, &token, entity.repo_id()).await? else {
            // Gave up on an empty committer list; already logged.
            return Ok(());
        };

        let (signed, user_map) = match self.oracle.check(&ctx.cla_args()?, &committers).await {
            Ok(result) => (result.signed, result.user_map),
            Err(err) => {
                // The oracle being down must not leave the PR without a
                // status; fall back to "not signed".
                warn!("CLA check failed for {}/{}#{}: {}", ctx.owner, ctx.repo, ctx.number, err);
                (false, UserMap::default())
            }
        };

        let mut deferred: Option<ClaError> = None;

        if let Err(err) = self
            .status
            .update(&token, &ctx.owner, &ctx.repo, ctx.number, None, signed)
            .await
        {
            warn!("status update failed for {}/{}#{}: {}", ctx.owner, ctx.repo, ctx.number, err);
            deferred = Some(err);
        }

        if !(self.config.close_comment_on_success && signed) {
            if let Err(err) = self
                .comments
                .badge_comment(&token, &ctx.owner, &ctx.repo, ctx.number, signed, &user_map)
                .await
            {
                warn!("badge comment failed for {}/{}#{}: {}", ctx.owner, ctx.repo, ctx.number, err);
                deferred.get_or_insert(err);
            }
        }

        if !signed && !user_map.not_signed.is_empty() {
            self.ledger
                .record(&user_map.not_signed, &ctx.repo, &ctx.owner, ctx.number)
                .await?;
        }

        self.emit_metrics(&ctx, started, signed).await;

        match deferred {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Bounded retry for GitHub's read-after-write lag on fresh PRs:
    /// after the initial attempt, up to two scheduled retries with
    /// increasing delay, then a terminal logged failure.
    async fn enumerate_with_retry(
        &self,
        ctx: &WebhookContext,
        token: &str,
        linked_repo_id: Option<i64>,
    ) -> Result<Option<Vec<Committer>>, ClaError> {
        let mut attempt: u64 = 0;
        loop {
            let committers = self
                .committers
                .get_committers(token, &ctx.owner, &ctx.repo, ctx.number, linked_repo_id)
                .await?;
            if !committers.is_empty() {
                return Ok(Some(committers));
            }
            attempt += 1;
            if attempt > 2 {
                let err = ClaError::CommittersUnready {
                    owner: ctx.owner.clone(),
                    repo: ctx.repo.clone(),
                    number: ctx.number,
                };
                warn!(
                    delivery_id = %ctx.delivery_id,
                    attempts = attempt,
                    "{}; giving up",
                    err
                );
                return Ok(None);
            }
            sleep(Duration::from_millis(
                10_000 * attempt * self.config.handle_delay,
            ))
            .await;
        }
    }

    async fn emit_metrics(&self, ctx: &WebhookContext, started: Instant, signed: bool) {
        let employee = match self.oracle.is_employee(ctx.user_id).await {
            Ok(employee) => employee,
            Err(err) => {
                debug!("employee lookup failed for user {}: {}", ctx.user_id, err);
                false
            }
        };
        let initial_signed = (ctx.action == "opened").then_some(signed);
        metrics::delivery_processed(
            &ctx.owner,
            &ctx.repo,
            ctx.number,
            &ctx.delivery_id,
            started.elapsed(),
            employee,
            initial_signed,
        );
    }

    /// Keeps the audit list of open CLA-relevant PRs in step with
    /// opened/reopened/closed events. Runs for public repos with a CLA
    /// configured; independent of the status/comment pipeline.
    async fn manage_pull_request_store(&self, event: &PullRequestEvent) -> Result<(), ClaError> {
        let Some(repository) = event.repository.as_ref() else {
            return Ok(());
        };
        if repository.private {
            return Ok(());
        }
        if !STORE_ACTIONS.contains(&event.action.as_str()) {
            return Ok(());
        }
        let Some(pull_request) = event.pull_request.as_ref() else {
            return Ok(());
        };

        let entity = self
            .resolver
            .resolve(
                &repository.owner.login,
                &repository.name,
                Some(repository.id),
                event
                    .organization
                    .as_ref()
                    .map(|o| o.id)
                    .or(Some(repository.owner.id)),
            )
            .await?;
        let Some(entity) = entity else {
            return Ok(());
        };
        if entity.gist().is_none() {
            return Ok(());
        }

        let record = PullRequestRecord {
            repo_id: repository.id,
            owner: repository.owner.login.clone(),
            repo: repository.name.clone(),
            number: event.number.unwrap_or(pull_request.number),
            user: pull_request.user.login.clone(),
            user_id: pull_request.user.id,
            created_at: pull_request.created_at.clone(),
        };

        match event.action.as_str() {
            "opened" => self.db.store_pull_request(&record).await,
            // A reopened PR usually still has its record from `opened`.
            "reopened" => self.db.store_pull_request_if_absent(&record).await,
            "closed" => {
                self.db
                    .remove_pull_request(record.user_id, record.repo_id, record.number)
                    .await
            }
            _ => Ok(()),
        }
    }
}
