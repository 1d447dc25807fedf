//! Backend service provisioning: application, git source and build
//! configuration.

use super::StepOutcome;
use crate::orchestrator::Orchestrator;
use tenantd_domain::platform::{AttachGitSource, ConfigureBuild, CreateApplication};
use tenantd_domain::{extract_id, Progress, ProvisionRequest, Result};
use tracing::info;

impl Orchestrator {
    pub(crate) async fn create_backend_app(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::BackendCreated) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(project_id) = request.project_id.clone() else {
            return self
                .missing_precondition(request, "create_backend_app", "project_id")
                .await;
        };

        let name = format!("{}-backend", request.subdomain);
        let spec = CreateApplication {
            project_id,
            name: name.clone(),
            description: format!("Backend application for tenant {}", request.subdomain),
        };
        let response = match self.platform.create_application(spec).await {
            Ok(response) => response,
            Err(err) => {
                return self
                    .fail_step(request, "create_backend_app", &err.to_string())
                    .await
            }
        };
        let Some(application_id) = extract_id(&response) else {
            return self
                .fail_step(
                    request,
                    "create_backend_app",
                    "response carried no application id",
                )
                .await;
        };

        request.backend_app_id = Some(application_id.clone());
        request.advance(Progress::BackendCreated);
        request.append_detail(&format!("Backend application created: {name} ({application_id})"));
        self.ledger.update(request).await?;
        info!(request_id = %request.id, %application_id, "backend application created");
        Ok(StepOutcome::Performed)
    }

    pub(crate) async fn attach_backend_source(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::BackendSourceAttached) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(application_id) = request.backend_app_id.clone() else {
            return self
                .missing_precondition(request, "attach_backend_source", "backend_app_id")
                .await;
        };

        let repository_url = request
            .backend_repo
            .clone()
            .unwrap_or_else(|| self.settings.backend_repo.clone());
        let spec = AttachGitSource {
            application_id,
            repository_url: repository_url.clone(),
            branch: self.settings.git_branch.clone(),
            build_path: "/".to_string(),
        };
        if let Err(err) = self.platform.attach_git_source(spec).await {
            return self
                .fail_step(request, "attach_backend_source", &err.to_string())
                .await;
        }

        request.advance(Progress::BackendSourceAttached);
        request.append_detail(&format!("Backend source attached: {repository_url}"));
        self.ledger.update(request).await?;
        Ok(StepOutcome::Performed)
    }

    pub(crate) async fn configure_backend_build(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::BackendBuildConfigured) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(application_id) = request.backend_app_id.clone() else {
            return self
                .missing_precondition(request, "configure_backend_build", "backend_app_id")
                .await;
        };

        let spec =
            ConfigureBuild::dockerfile(application_id, self.settings.backend_dockerfile.clone());
        if let Err(err) = self.platform.configure_build(spec).await {
            return self
                .fail_step(request, "configure_backend_build", &err.to_string())
                .await;
        }

        request.advance(Progress::BackendBuildConfigured);
        request.append_detail("Backend build configured (dockerfile)");
        self.ledger.update(request).await?;
        Ok(StepOutcome::Performed)
    }
}
