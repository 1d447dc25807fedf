//! HTTP client for the Dokploy-style deployment platform API.
//!
//! One uniform `call` wrapper owns authentication, per-attempt timeout
//! and retry with exponential backoff; the typed port methods only build
//! payloads. Some endpoints answer bare quoted strings instead of JSON,
//! so non-JSON bodies are returned as trimmed text.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tenantd_domain::platform::{
    AttachGitSource, ConfigureBuild, CreateApplication, CreateDomain, CreatePostgres,
    CreateProject, DeploymentPlatform, PlatformError, PlatformResult,
};
use tenantd_domain::PlatformResponse;
use tracing::{debug, error, warn};

/// Retry policy with exponential backoff for platform calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Cap applied to every computed delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt`
    /// (1-indexed): `initial * multiplier^(attempt-1)`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Connection settings for the platform API.
#[derive(Debug, Clone)]
pub struct PlatformClientConfig {
    /// Base URL including the api prefix, e.g. `https://deploy.example.com/api`.
    pub api_base: String,
    pub api_key: String,
    /// Per-attempt timeout.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl PlatformClientConfig {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(40),
            retry: RetryPolicy::default(),
        }
    }
}

/// Failure of a single attempt, before retry accounting.
#[derive(Debug)]
enum CallFailure {
    Status { status: u16, body: String },
    Transport { cause: String },
}

impl CallFailure {
    fn into_platform_error(self, operation: &str, attempts: u32) -> PlatformError {
        match self {
            CallFailure::Status { status, body } => PlatformError::Status {
                operation: operation.to_string(),
                status,
                attempts,
                body,
            },
            CallFailure::Transport { cause } => PlatformError::Transport {
                operation: operation.to_string(),
                attempts,
                cause,
            },
        }
    }
}

impl std::fmt::Display for CallFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallFailure::Status { status, body } => write!(f, "status {status}: {body}"),
            CallFailure::Transport { cause } => write!(f, "{cause}"),
        }
    }
}

/// Parse a successful body: JSON when it is JSON, trimmed text otherwise.
fn decode_body(text: &str) -> PlatformResponse {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return PlatformResponse::Empty;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => PlatformResponse::Json(value),
        Err(_) => PlatformResponse::Text(trimmed.trim_matches('"').to_string()),
    }
}

pub struct DokployPlatformClient {
    http: reqwest::Client,
    config: PlatformClientConfig,
}

impl DokployPlatformClient {
    pub fn new(config: PlatformClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        payload: Option<&Value>,
    ) -> Result<PlatformResponse, CallFailure> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header("x-api-key", &self.config.api_key)
            .header(ACCEPT, "application/json");
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|err| CallFailure::Transport {
            cause: err.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CallFailure::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(decode_body(&body))
    }

    /// Uniform retrying call wrapper used by every port method.
    async fn call(
        &self,
        method: Method,
        path: &str,
        operation: &str,
        payload: Option<Value>,
    ) -> PlatformResult {
        let url = format!("{}{}", self.config.api_base, path);
        let retry = self.config.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(operation, attempt, max = retry.max_attempts, %url, "calling deployment platform");
            match self.attempt(&method, &url, payload.as_ref()).await {
                Ok(response) => return Ok(response),
                Err(failure) => {
                    if retry.should_retry(attempt) {
                        let delay = retry.delay_for_attempt(attempt);
                        warn!(
                            operation,
                            attempt,
                            delay_secs = delay.as_secs(),
                            error = %failure,
                            "platform call failed; backing off"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        error!(operation, attempts = attempt, error = %failure,
                            "platform call exhausted its retry budget");
                        return Err(failure.into_platform_error(operation, attempt));
                    }
                }
            }
        }
    }
}

#[async_trait]
impl DeploymentPlatform for DokployPlatformClient {
    async fn create_project(&self, spec: CreateProject) -> PlatformResult {
        let payload = json!({
            "name": spec.name,
            "description": spec.description,
        });
        self.call(Method::POST, "/project.create", "project.create", Some(payload))
            .await
    }

    async fn create_application(&self, spec: CreateApplication) -> PlatformResult {
        let payload = json!({
            "name": spec.name,
            "description": spec.description,
            "projectId": spec.project_id,
        });
        self.call(
            Method::POST,
            "/application.create",
            "application.create",
            Some(payload),
        )
        .await
    }

    async fn attach_git_source(&self, spec: AttachGitSource) -> PlatformResult {
        let payload = json!({
            "applicationId": spec.application_id,
            "customGitUrl": spec.repository_url,
            "customGitBranch": spec.branch,
            "customGitBuildPath": spec.build_path,
            "enableSubmodules": false,
        });
        // The platform spells this endpoint "saveGitProdiver".
        self.call(
            Method::POST,
            "/application.saveGitProdiver",
            "application.saveGitProvider",
            Some(payload),
        )
        .await
    }

    async fn configure_build(&self, spec: ConfigureBuild) -> PlatformResult {
        let mut payload = json!({
            "applicationId": spec.application_id,
            "buildType": spec.build_type,
            "dockerfile": spec.dockerfile,
            "dockerContextPath": spec.docker_context_path,
            "dockerBuildStage": spec.docker_build_stage,
            "isStaticSpa": spec.is_static_spa,
        });
        if let Some(publish_directory) = spec.publish_directory {
            payload["publishDirectory"] = Value::String(publish_directory);
        }
        self.call(
            Method::POST,
            "/application.saveBuildType",
            "application.saveBuildType",
            Some(payload),
        )
        .await
    }

    async fn save_environment(&self, application_id: &str, env: &str) -> PlatformResult {
        let payload = json!({
            "applicationId": application_id,
            "env": env,
        });
        self.call(
            Method::POST,
            "/application.saveEnvironment",
            "application.saveEnvironment",
            Some(payload),
        )
        .await
    }

    async fn create_postgres(&self, spec: CreatePostgres) -> PlatformResult {
        let payload = json!({
            "name": spec.name,
            "appName": spec.app_name,
            "databaseName": spec.database_name,
            "databaseUser": spec.database_user,
            "databasePassword": spec.database_password,
            "dockerImage": spec.docker_image,
            "projectId": spec.project_id,
            "description": format!("Postgres {} for project {}", spec.database_name, spec.project_id),
        });
        self.call(Method::POST, "/postgres.create", "postgres.create", Some(payload))
            .await
    }

    async fn deploy_postgres(&self, postgres_id: &str) -> PlatformResult {
        let payload = json!({ "postgresId": postgres_id });
        self.call(Method::POST, "/postgres.deploy", "postgres.deploy", Some(payload))
            .await
    }

    async fn deploy_application(&self, application_id: &str) -> PlatformResult {
        let payload = json!({ "applicationId": application_id });
        self.call(
            Method::POST,
            "/application.deploy",
            "application.deploy",
            Some(payload),
        )
        .await
    }

    async fn create_domain(&self, spec: CreateDomain) -> PlatformResult {
        let payload = json!({
            "host": spec.host,
            "port": spec.port,
            "https": spec.https,
            "applicationId": spec.application_id,
            "certificateType": spec.certificate_type,
            "domainType": spec.domain_type,
        });
        self.call(Method::POST, "/domain.create", "domain.create", Some(payload))
            .await
    }

    async fn delete_domain(&self, domain_id: &str) -> PlatformResult {
        let payload = json!({ "domainId": domain_id });
        self.call(Method::POST, "/domain.delete", "domain.delete", Some(payload))
            .await
    }

    async fn list_projects(&self) -> PlatformResult {
        self.call(Method::GET, "/project.all", "project.all", None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantd_domain::extract_id;

    #[test]
    fn backoff_is_exponential_and_capped() {
        let retry = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6).map(|a| retry.delay_for_attempt(a).as_secs()).collect();
        assert_eq!(delays, vec![3, 6, 12, 24, 48, 60]);
    }

    #[test]
    fn retry_budget_is_respected() {
        let retry = RetryPolicy::default();
        assert!(retry.should_retry(1));
        assert!(retry.should_retry(4));
        assert!(!retry.should_retry(5));
    }

    #[test]
    fn decode_json_object_body() {
        let response = decode_body("{\"projectId\": \"p-1\"}");
        assert_eq!(extract_id(&response), Some("p-1".to_string()));
    }

    #[test]
    fn decode_bare_quoted_string_body() {
        // serde_json parses a bare quoted string as Value::String
        let response = decode_body("\"abc123\"");
        assert_eq!(extract_id(&response), Some("abc123".to_string()));
    }

    #[test]
    fn decode_plain_text_body() {
        assert_eq!(
            decode_body("deployment queued"),
            PlatformResponse::Text("deployment queued".to_string())
        );
        assert_eq!(decode_body("   "), PlatformResponse::Empty);
    }
}
