//! Contract of the external signature service ("the oracle"): it owns
//! CLA signature state; this service only consults it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::committers::Committer;
use crate::error::ClaError;

/// Arguments the oracle needs to judge one pull request.
#[derive(Debug, Clone, Serialize)]
pub struct ClaCheckArgs {
    pub owner: String,
    pub repo: String,
    pub repo_id: Option<i64>,
    pub org_id: Option<i64>,
    pub number: i64,
    pub gist: Option<String>,
    #[serde(skip)]
    pub token: String,
}

/// Committers partitioned by signature state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMap {
    #[serde(default)]
    pub signed: Vec<String>,
    #[serde(default)]
    pub not_signed: Vec<String>,
    #[serde(default)]
    pub unknown: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckResult {
    pub signed: bool,
    #[serde(default)]
    pub user_map: UserMap,
}

#[async_trait]
pub trait ClaOracle: Send + Sync {
    /// Whether the CLA applies to this PR at all (respects the entity's
    /// min-file/min-code-change thresholds).
    async fn is_cla_required(&self, args: &ClaCheckArgs) -> Result<bool, ClaError>;

    /// Signature verdict for the PR's committers plus the per-committer
    /// breakdown.
    async fn check(
        &self,
        args: &ClaCheckArgs,
        committers: &[Committer],
    ) -> Result<CheckResult, ClaError>;

    /// Internal employees are exempted from CLA reporting (not from
    /// enforcement).
    async fn is_employee(&self, user_id: i64) -> Result<bool, ClaError>;
}

pub struct HttpClaOracle {
    http: reqwest::Client,
    base_url: String,
}

impl HttpClaOracle {
    pub fn new(base_url: &str) -> Result<Self, ClaError> {
        let http = reqwest::Client::builder()
            .user_agent("cla-assistant")
            .build()?;
        Ok(HttpClaOracle {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check_response(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ClaError> {
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

#[derive(Debug, Deserialize)]
struct RequiredResponse {
    required: bool,
}

#[derive(Debug, Deserialize)]
struct EmployeeResponse {
    employee: bool,
}

#[async_trait]
impl ClaOracle for HttpClaOracle {
    async fn is_cla_required(&self, args: &ClaCheckArgs) -> Result<bool, ClaError> {
        let response = self
            .http
            .post(format!("{}/cla/required", self.base_url))
            .json(args)
            .send()
            .await?;
        let body: RequiredResponse = self.check_response(response).await?.json().await?;
        Ok(body.required)
    }

    async fn check(
        &self,
        args: &ClaCheckArgs,
        committers: &[Committer],
    ) -> Result<CheckResult, ClaError> {
        let response = self
            .http
            .post(format!("{}/cla/check", self.base_url))
            .json(&serde_json::json!({ "args": args, "committers": committers }))
            .send()
            .await?;
        Ok(self.check_response(response).await?.json().await?)
    }

    async fn is_employee(&self, user_id: i64) -> Result<bool, ClaError> {
        let response = self
            .http
            .get(format!("{}/employee/{}", self.base_url, user_id))
            .send()
            .await?;
        let body: EmployeeResponse = self.check_response(response).await?.json().await?;
        Ok(body.employee)
    }
}
