//! Backend health monitor and finalize step.
//!
//! Runs outside the orchestrator's call stack: each poll is a scheduled
//! job that returns immediately, and an unhealthy backend reschedules the
//! next poll with exponential backoff instead of blocking a worker.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tenantd_domain::{
    health_job_id, JobScheduler, Progress, ProvisionLedger, ProvisionRequest, ReplacePolicy,
    RequestId, Result, ScheduleOutcome, ScheduledJob,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Health state of a tenant backend as observed from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy { reason: String },
}

/// Payload for the tenant's internal admin-provisioning callback.
#[derive(Debug, Clone)]
pub struct AdminProvisionSpec {
    pub admin_email: String,
    pub admin_password: String,
    pub tenant_id: String,
    pub company: String,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct EndpointError(pub String);

/// Port to the freshly provisioned tenant itself: health endpoint and the
/// one-shot admin-provisioning callback.
#[async_trait]
pub trait TenantEndpoint: Send + Sync {
    async fn check_health(&self, host: &str) -> HealthStatus;

    async fn provision_admin(
        &self,
        host: &str,
        spec: AdminProvisionSpec,
    ) -> std::result::Result<(), EndpointError>;
}

/// Tunables for the health poll loop.
#[derive(Debug, Clone)]
pub struct HealthSettings {
    /// Delay before the first poll after structural provisioning.
    pub initial_delay: Duration,
    /// Polls before giving up and failing the request.
    pub max_attempts: u32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            max_attempts: 10,
        }
    }
}

/// Backoff between unhealthy polls: 2^(tries-1) minutes for the first six
/// tries, 60 minutes from then on.
pub fn poll_backoff(tries: u32) -> Duration {
    let minutes = match tries {
        0 | 1 => 1,
        2..=6 => 1u64 << (tries - 1),
        _ => 60,
    };
    Duration::from_secs(minutes * 60)
}

pub struct HealthMonitor {
    ledger: Arc<dyn ProvisionLedger>,
    endpoint: Arc<dyn TenantEndpoint>,
    scheduler: Arc<dyn JobScheduler>,
    settings: HealthSettings,
}

impl HealthMonitor {
    pub fn new(
        ledger: Arc<dyn ProvisionLedger>,
        endpoint: Arc<dyn TenantEndpoint>,
        scheduler: Arc<dyn JobScheduler>,
        settings: HealthSettings,
    ) -> Self {
        Self {
            ledger,
            endpoint,
            scheduler,
            settings,
        }
    }

    /// Schedule the first poll after structural provisioning.
    pub async fn schedule_first(
        monitor: &Arc<HealthMonitor>,
        request_id: &RequestId,
    ) -> Result<ScheduleOutcome> {
        let delay = monitor.settings.initial_delay;
        Self::schedule_in(monitor, request_id, delay).await
    }

    /// Schedule (or reschedule) a poll. Health polls always replace: the
    /// newest deadline wins.
    async fn schedule_in(
        monitor: &Arc<HealthMonitor>,
        request_id: &RequestId,
        delay: Duration,
    ) -> Result<ScheduleOutcome> {
        let run_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        debug!(%request_id, delay_secs = delay.as_secs(), "scheduling backend health poll");
        let job = ScheduledJob::new(
            health_job_id(request_id),
            run_at,
            ReplacePolicy::Replace,
            Self::poll_task(Arc::clone(monitor), request_id.clone()),
        );
        monitor.scheduler.schedule(job).await
    }

    /// Job body: poll once and reschedule when the monitor asks for it.
    fn poll_task(
        monitor: Arc<HealthMonitor>,
        request_id: RequestId,
    ) -> futures::future::BoxFuture<'static, ()> {
        Box::pin(async move {
            match monitor.poll(&request_id).await {
                Ok(Some(delay)) => {
                    if let Err(err) = Self::schedule_in(&monitor, &request_id, delay).await {
                        error!(%request_id, error = %err, "failed to reschedule health poll");
                    }
                }
                Ok(None) => {}
                Err(err) => error!(%request_id, error = %err, "health poll aborted"),
            }
        })
    }

    /// One poll of the backend. Returns the delay until the next poll, or
    /// `None` when the loop is over (completed, failed or exhausted).
    pub async fn poll(&self, request_id: &RequestId) -> Result<Option<Duration>> {
        let Some(mut request) = self.ledger.find_by_id(request_id).await? else {
            warn!(%request_id, "health poll for unknown request");
            return Ok(None);
        };
        if request.is_terminal() {
            debug!(%request_id, "request is terminal; stopping health polls");
            return Ok(None);
        }
        let Some(host) = request.backend_domain.clone() else {
            request.mark_failed("health_check", "backend domain is not set");
            self.ledger.update(&request).await?;
            return Ok(None);
        };

        match self.endpoint.check_health(&host).await {
            HealthStatus::Healthy => {
                info!(%request_id, %host, "backend healthy; finalizing tenant");
                self.finalize(&mut request, &host).await?;
                Ok(None)
            }
            HealthStatus::Unhealthy { reason } => {
                request.health_attempts += 1;
                let tries = request.health_attempts;
                if tries >= self.settings.max_attempts {
                    warn!(%request_id, tries, "backend never became healthy; giving up");
                    request.mark_failed(
                        "health_check",
                        &format!("backend unhealthy after {tries} checks: {reason}"),
                    );
                    self.ledger.update(&request).await?;
                    return Ok(None);
                }
                request.append_detail(&format!("Health check {tries} failed: {reason}"));
                self.ledger.update(&request).await?;
                let delay = poll_backoff(tries);
                debug!(%request_id, tries, next_in_secs = delay.as_secs(), "backend not healthy yet");
                Ok(Some(delay))
            }
        }
    }

    /// Backend is up: provision the admin user once and complete the row.
    async fn finalize(&self, request: &mut ProvisionRequest, host: &str) -> Result<()> {
        let admin_password = request
            .admin_password
            .clone()
            .or_else(|| request.database.as_ref().map(|db| db.password.clone()))
            .unwrap_or_default();
        let spec = AdminProvisionSpec {
            admin_email: request.email.clone(),
            admin_password,
            tenant_id: request.subdomain.clone(),
            company: request.company.clone(),
        };

        match self.endpoint.provision_admin(host, spec).await {
            Ok(()) => {
                request.advance(Progress::Completed);
                request.append_detail(&format!(
                    "Provisioning complete. backend=https://{host}, frontend=https://{}",
                    request.frontend_domain.as_deref().unwrap_or("-")
                ));
                self.ledger.update(request).await?;
                info!(request_id = %request.id, "tenant provisioning completed");
            }
            Err(err) => {
                request.mark_failed("finalize", &format!("admin provisioning callback: {err}"));
                self.ledger.update(request).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_backoff_doubles_then_caps() {
        let minutes: Vec<u64> = (1..=8).map(|t| poll_backoff(t).as_secs() / 60).collect();
        assert_eq!(minutes, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }
}
