//! Intake use cases: submit, status and operator retry.
//!
//! The inbound path only persists the ledger row and schedules the first
//! orchestrator run; all remote work happens on the job runner.

use crate::orchestrator::Orchestrator;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tenantd_domain::{
    provision_job_id, DomainError, JobScheduler, ProvisionIntake, ProvisionLedger,
    ProvisionRequest, ReplacePolicy, RequestId, Result, ScheduleOutcome, ScheduledJob,
};
use tracing::{error, info, warn};

/// Result of a submit call, mirroring the duplicate-submission contract.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// New workflow accepted and scheduled.
    Accepted { request_id: RequestId },
    /// The correlation id already maps to a completed run; the original
    /// result is returned and nothing is scheduled.
    AlreadyProvisioned { request: ProvisionRequest },
    /// The correlation id maps to a run that has not completed yet.
    AlreadyInProgress { request: ProvisionRequest },
}

pub struct ProvisioningService {
    ledger: Arc<dyn ProvisionLedger>,
    scheduler: Arc<dyn JobScheduler>,
    orchestrator: Arc<Orchestrator>,
    first_run_delay: Duration,
}

impl ProvisioningService {
    pub fn new(
        ledger: Arc<dyn ProvisionLedger>,
        scheduler: Arc<dyn JobScheduler>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            ledger,
            scheduler,
            orchestrator,
            first_run_delay: Duration::from_secs(1),
        }
    }

    pub fn with_first_run_delay(mut self, delay: Duration) -> Self {
        self.first_run_delay = delay;
        self
    }

    /// Accept a provisioning request: validate, dedupe, persist, schedule.
    pub async fn submit(&self, intake: ProvisionIntake) -> Result<SubmitOutcome> {
        if intake.client_name.trim().is_empty() {
            return Err(DomainError::InvalidRequest {
                message: "client_name is required".to_string(),
            });
        }
        if intake.subdomain.trim().is_empty() {
            return Err(DomainError::InvalidRequest {
                message: "subdomain is required".to_string(),
            });
        }

        if let Some(client_ref) = intake.client_ref.as_deref() {
            if let Some(existing) = self.ledger.find_by_client_ref(client_ref).await? {
                info!(client_ref, request_id = %existing.id, status = %existing.status,
                    "duplicate submission for known client_ref");
                return Ok(if existing.is_completed() {
                    SubmitOutcome::AlreadyProvisioned { request: existing }
                } else {
                    SubmitOutcome::AlreadyInProgress { request: existing }
                });
            }
        }
        if let Some(existing) = self.ledger.find_by_subdomain(&intake.subdomain).await? {
            warn!(subdomain = %intake.subdomain, request_id = %existing.id,
                "subdomain already taken");
            return Err(DomainError::DuplicateSubdomain {
                subdomain: intake.subdomain,
            });
        }

        let request = ProvisionRequest::new(intake);
        self.ledger.save(&request).await?;
        self.schedule_run(&request.id, ReplacePolicy::Keep).await?;
        info!(request_id = %request.id, subdomain = %request.subdomain,
            "provision request accepted");
        Ok(SubmitOutcome::Accepted {
            request_id: request.id,
        })
    }

    /// Current ledger row for a status query.
    pub async fn status(&self, request_id: &RequestId) -> Result<Option<ProvisionRequest>> {
        self.ledger.find_by_id(request_id).await
    }

    /// Operator retry of a failed run: clear the failure and reschedule.
    /// The orchestrator resumes from the persisted progress.
    pub async fn retry(&self, request_id: &RequestId) -> Result<()> {
        let Some(mut request) = self.ledger.find_by_id(request_id).await? else {
            return Err(DomainError::RequestNotFound {
                request_id: request_id.clone(),
            });
        };
        if !request.failed {
            return Err(DomainError::InvalidRequest {
                message: format!("request {request_id} is not failed (status {})", request.status),
            });
        }

        request.clear_failure();
        self.ledger.update(&request).await?;
        self.schedule_run(request_id, ReplacePolicy::Replace).await?;
        info!(%request_id, progress = %request.progress, "retry scheduled");
        Ok(())
    }

    async fn schedule_run(
        &self,
        request_id: &RequestId,
        replace: ReplacePolicy,
    ) -> Result<ScheduleOutcome> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let task_id = request_id.clone();
        let run_at = Utc::now()
            + chrono::Duration::from_std(self.first_run_delay)
                .unwrap_or_else(|_| chrono::Duration::zero());
        let job = ScheduledJob::new(
            provision_job_id(request_id),
            run_at,
            replace,
            async move {
                if let Err(err) = orchestrator.run(&task_id).await {
                    error!(request_id = %task_id, error = %err, "provisioning run aborted");
                }
            },
        );
        self.scheduler.schedule(job).await
    }
}
