//! HTTP adapter for the tenant's own endpoints: the public health check
//! and the internal admin-provisioning callback.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tenantd_application::{AdminProvisionSpec, EndpointError, HealthStatus, TenantEndpoint};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TenantEndpointConfig {
    /// Path probed on the backend host, e.g. `/health`.
    pub health_path: String,
    /// Shared token sent with the provisioning callback.
    pub callback_token: String,
    pub request_timeout: Duration,
}

impl TenantEndpointConfig {
    pub fn new(callback_token: impl Into<String>) -> Self {
        Self {
            health_path: "/health".to_string(),
            callback_token: callback_token.into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpTenantEndpoint {
    http: reqwest::Client,
    config: TenantEndpointConfig,
}

impl HttpTenantEndpoint {
    pub fn new(config: TenantEndpointConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl TenantEndpoint for HttpTenantEndpoint {
    async fn check_health(&self, host: &str) -> HealthStatus {
        let url = format!("https://{host}{}", self.config.health_path);
        debug!(%url, "probing backend health");
        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) => HealthStatus::Unhealthy {
                reason: format!("status {}", response.status()),
            },
            Err(err) => HealthStatus::Unhealthy {
                reason: err.to_string(),
            },
        }
    }

    async fn provision_admin(
        &self,
        host: &str,
        spec: AdminProvisionSpec,
    ) -> Result<(), EndpointError> {
        let url = format!("https://{host}/internal/provision");
        let payload = json!({
            "admin_email": spec.admin_email,
            "admin_password": spec.admin_password,
            "tenant_id": spec.tenant_id,
            "company": spec.company,
        });
        let response = self
            .http
            .post(&url)
            .header("X-Provision-Token", &self.config.callback_token)
            .json(&payload)
            .send()
            .await
            .map_err(|err| EndpointError(err.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(EndpointError(format!("status {status}: {body}")))
        }
    }
}
