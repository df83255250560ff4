use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub github_api_url: String,
    pub github_graphql_url: String,
    pub github_webhook_secret: Option<String>,
    /// When set, overrides the token stored on every linked entity.
    pub github_admin_token: Option<String>,
    /// Base URL of the CLA web UI; status target URLs point here.
    pub cla_server_url: String,
    pub signature_service_url: String,
    /// Settle delay before processing a delivery, so GitHub's own
    /// read-after-write lag can catch up.
    pub enforce_delay_ms: u64,
    /// Multiplier applied to the empty-committers retry delay. Tests set
    /// this to 0.
    pub handle_delay: u64,
    pub process_private_repos: bool,
    pub close_comment_on_success: bool,
    /// When enabled, the webhook response waits for the pipeline and
    /// reports a 500 on failure instead of acknowledging up front.
    pub wait_for_completion: bool,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://cla-assistant.db".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let github_api_url =
            env::var("GITHUB_API_URL").unwrap_or_else(|_| "https://api.github.com".to_string());

        let github_graphql_url = env::var("GITHUB_GRAPHQL_URL")
            .unwrap_or_else(|_| "https://api.github.com/graphql".to_string());

        let github_webhook_secret = env::var("GITHUB_WEBHOOK_SECRET").ok();

        let github_admin_token = env::var("GITHUB_ADMIN_TOKEN").ok();

        let cla_server_url =
            env::var("CLA_SERVER_URL").unwrap_or_else(|_| "https://cla-assistant.io".to_string());

        let signature_service_url = env::var("SIGNATURE_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());

        let enforce_delay_ms = env::var("ENFORCE_DELAY_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()?;

        let handle_delay = env::var("HANDLE_DELAY")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let process_private_repos = env::var("PROCESS_PRIVATE_REPOS")
            .map(|v| v == "true")
            .unwrap_or(false);

        let close_comment_on_success = env::var("CLOSE_COMMENT_ON_SUCCESS")
            .map(|v| v == "true")
            .unwrap_or(false);

        let wait_for_completion = env::var("WAIT_FOR_COMPLETION")
            .map(|v| v == "true")
            .unwrap_or(false);

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            github_api_url,
            github_graphql_url,
            github_webhook_secret,
            github_admin_token,
            cla_server_url,
            signature_service_url,
            enforce_delay_ms,
            handle_delay,
            process_private_repos,
            close_comment_on_success,
            wait_for_completion,
        })
    }

    /// Target URL shown on the commit status, pointing at the CLA page
    /// for this pull request.
    pub fn cla_url(&self, owner: &str, repo: &str, number: i64) -> String {
        format!(
            "{}/{}/{}?pullRequest={}",
            self.cla_server_url, owner, repo, number
        )
    }
}

impl Default for AppConfig {
    /// In-memory, zero-delay settings. Used by tests; `load` is the
    /// production path.
    fn default() -> Self {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            github_api_url: "https://api.github.com".to_string(),
            github_graphql_url: "https://api.github.com/graphql".to_string(),
            github_webhook_secret: None,
            github_admin_token: None,
            cla_server_url: "https://cla-assistant.io".to_string(),
            signature_service_url: "http://localhost:5000".to_string(),
            enforce_delay_ms: 0,
            handle_delay: 0,
            process_private_repos: false,
            close_comment_on_success: false,
            wait_for_completion: true,
        }
    }
}
