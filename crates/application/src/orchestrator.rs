//! Orchestrator - fixed-order transition loop over the provisioning
//! state machine.
//!
//! Each step re-derives "already done" from the persisted progress
//! alone, so re-invoking the orchestrator on a partially completed row
//! resumes exactly where the previous run stopped. The first unresolved
//! failure short-circuits the run; nothing is raised past this layer.

use crate::health::HealthMonitor;
use crate::steps::StepOutcome;
use std::sync::Arc;
use std::time::Duration;
use tenantd_domain::{
    DeploymentPlatform, DomainError, ProvisionLedger, ProvisionRequest, RequestId, Result,
};
use tracing::{error, info, warn};

/// Tunables for the provisioning workflow.
#[derive(Debug, Clone)]
pub struct ProvisioningSettings {
    /// Apex under which tenant hosts are created, e.g. `apps.example.com`.
    pub base_domain: String,
    /// Default backend repository when the request carries no override.
    pub backend_repo: String,
    /// Default frontend repository when the request carries no override.
    pub frontend_repo: String,
    pub git_branch: String,
    pub backend_dockerfile: String,
    pub frontend_publish_directory: String,
    pub postgres_image: String,
    /// Container port the backend domain routes to.
    pub backend_port: u16,
    /// Container port the frontend domain routes to.
    pub frontend_port: u16,
    /// Pause between triggering deploys and frontend provisioning, applied
    /// only when a deploy was actually triggered in the current run.
    pub post_deploy_wait: Duration,
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        Self {
            base_domain: "apps.localhost".to_string(),
            backend_repo: "https://github.com/example/tenant-backend.git".to_string(),
            frontend_repo: "https://github.com/example/tenant-frontend.git".to_string(),
            git_branch: "main".to_string(),
            backend_dockerfile: "./Dockerfile".to_string(),
            frontend_publish_directory: "dist".to_string(),
            postgres_image: "postgres:15".to_string(),
            backend_port: 8000,
            frontend_port: 3000,
            post_deploy_wait: Duration::from_secs(120),
        }
    }
}

/// Result of one orchestrator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Structural provisioning finished; health checks scheduled.
    Provisioned,
    /// The row already reached `Completed`; nothing to do.
    AlreadyCompleted,
    /// A step failed (or the row was already failed); the ledger has the
    /// detail trail.
    Failed,
}

pub struct Orchestrator {
    pub(crate) ledger: Arc<dyn ProvisionLedger>,
    pub(crate) platform: Arc<dyn DeploymentPlatform>,
    pub(crate) health: Arc<HealthMonitor>,
    pub(crate) settings: ProvisioningSettings,
}

macro_rules! run_step {
    ($self:ident, $request:ident, $step:ident) => {
        match $self.$step(&mut $request).await? {
            StepOutcome::Failed => return Ok(RunOutcome::Failed),
            outcome => outcome,
        }
    };
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<dyn ProvisionLedger>,
        platform: Arc<dyn DeploymentPlatform>,
        health: Arc<HealthMonitor>,
        settings: ProvisioningSettings,
    ) -> Self {
        Self {
            ledger,
            platform,
            health,
            settings,
        }
    }

    /// Run (or resume) the provisioning workflow for one request.
    pub async fn run(&self, request_id: &RequestId) -> Result<RunOutcome> {
        let Some(mut request) = self.ledger.find_by_id(request_id).await? else {
            error!(%request_id, "provisioning run for unknown request");
            return Err(DomainError::RequestNotFound {
                request_id: request_id.clone(),
            });
        };

        if request.failed {
            warn!(%request_id, status = %request.status, "request is failed; waiting for operator retry");
            return Ok(RunOutcome::Failed);
        }
        if request.is_completed() {
            info!(%request_id, "request already completed");
            return Ok(RunOutcome::AlreadyCompleted);
        }

        info!(%request_id, progress = %request.progress, subdomain = %request.subdomain, "provisioning run started");
        request.status = "provisioning".to_string();
        request.touch();
        self.ledger.update(&request).await?;

        run_step!(self, request, create_project);
        run_step!(self, request, create_backend_app);
        run_step!(self, request, attach_backend_source);
        run_step!(self, request, configure_backend_build);
        run_step!(self, request, create_database);
        run_step!(self, request, write_backend_env);
        let db_deploy = run_step!(self, request, deploy_database);
        let app_deploy = run_step!(self, request, deploy_backend);

        let just_deployed =
            db_deploy == StepOutcome::Performed || app_deploy == StepOutcome::Performed;
        self.wait_after_deploy(&request, just_deployed).await;

        run_step!(self, request, create_frontend_app);
        run_step!(self, request, attach_frontend_source);
        run_step!(self, request, write_frontend_env);
        run_step!(self, request, configure_frontend_build);
        run_step!(self, request, deploy_frontend);
        run_step!(self, request, create_domains);

        // Persist before scheduling: an early-firing poll must observe the
        // final row, not race a stale copy.
        request.status = "awaiting_backend_health".to_string();
        request.append_detail("Structural provisioning complete; backend health checks scheduled");
        self.ledger.update(&request).await?;
        HealthMonitor::schedule_first(&self.health, &request.id).await?;
        info!(%request_id, "provisioning run finished; awaiting backend health");

        Ok(RunOutcome::Provisioned)
    }

    /// Give freshly triggered deploys time to come up before the frontend
    /// is provisioned against them. Skipped entirely on resume.
    async fn wait_after_deploy(&self, request: &ProvisionRequest, just_deployed: bool) {
        if !just_deployed || self.settings.post_deploy_wait.is_zero() {
            return;
        }
        info!(
            request_id = %request.id,
            wait_secs = self.settings.post_deploy_wait.as_secs(),
            "deploys just triggered; pausing before frontend provisioning"
        );
        tokio::time::sleep(self.settings.post_deploy_wait).await;
    }

    /// Terminal failure handling shared by every step: record the reason
    /// on the ledger before reporting failure upward.
    pub(crate) async fn fail_step(
        &self,
        request: &mut ProvisionRequest,
        step: &str,
        reason: &str,
    ) -> Result<StepOutcome> {
        error!(request_id = %request.id, step, reason, "provisioning step failed");
        request.mark_failed(step, reason);
        self.ledger.update(request).await?;
        Ok(StepOutcome::Failed)
    }

    /// A structural precondition is missing: a bug in step ordering or a
    /// corrupted row, never retried.
    pub(crate) async fn missing_precondition(
        &self,
        request: &mut ProvisionRequest,
        step: &str,
        field: &str,
    ) -> Result<StepOutcome> {
        self.fail_step(
            request,
            step,
            &format!("required field `{field}` is not set; refusing to continue"),
        )
        .await
    }
}
