//! Deploy triggers: postgres first, then the backend application.
//!
//! Deploys are fire-and-forget at the platform; readiness is observed
//! later by the health monitor.

use super::StepOutcome;
use crate::orchestrator::Orchestrator;
use tenantd_domain::{Progress, ProvisionRequest, Result};
use tracing::info;

impl Orchestrator {
    pub(crate) async fn deploy_database(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::DatabaseDeployTriggered) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(postgres_id) = request.postgres_id.clone() else {
            return self
                .missing_precondition(request, "deploy_database", "postgres_id")
                .await;
        };

        if let Err(err) = self.platform.deploy_postgres(&postgres_id).await {
            return self.fail_step(request, "deploy_database", &err.to_string()).await;
        }

        request.advance(Progress::DatabaseDeployTriggered);
        request.append_detail("Database deploy triggered");
        self.ledger.update(request).await?;
        info!(request_id = %request.id, %postgres_id, "database deploy triggered");
        Ok(StepOutcome::Performed)
    }

    pub(crate) async fn deploy_backend(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::BackendDeployTriggered) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(application_id) = request.backend_app_id.clone() else {
            return self
                .missing_precondition(request, "deploy_backend", "backend_app_id")
                .await;
        };

        if let Err(err) = self.platform.deploy_application(&application_id).await {
            return self.fail_step(request, "deploy_backend", &err.to_string()).await;
        }

        request.advance(Progress::BackendDeployTriggered);
        request.append_detail("Backend deploy triggered");
        self.ledger.update(request).await?;
        info!(request_id = %request.id, %application_id, "backend deploy triggered");
        Ok(StepOutcome::Performed)
    }
}
