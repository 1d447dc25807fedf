//! Frontend service provisioning: mirror of the backend, served as a
//! static SPA and pointed at the backend's public host.

use super::{backend_host, StepOutcome};
use crate::orchestrator::Orchestrator;
use tenantd_domain::platform::{AttachGitSource, ConfigureBuild, CreateApplication};
use tenantd_domain::{extract_id, Progress, ProvisionRequest, Result};
use tracing::info;

impl Orchestrator {
    pub(crate) async fn create_frontend_app(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::FrontendCreated) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(project_id) = request.project_id.clone() else {
            return self
                .missing_precondition(request, "create_frontend_app", "project_id")
                .await;
        };

        let name = format!("{}-frontend", request.subdomain);
        let spec = CreateApplication {
            project_id,
            name: name.clone(),
            description: format!("Frontend application for tenant {}", request.subdomain),
        };
        let response = match self.platform.create_application(spec).await {
            Ok(response) => response,
            Err(err) => {
                return self
                    .fail_step(request, "create_frontend_app", &err.to_string())
                    .await
            }
        };
        let Some(application_id) = extract_id(&response) else {
            return self
                .fail_step(
                    request,
                    "create_frontend_app",
                    "response carried no application id",
                )
                .await;
        };

        request.frontend_app_id = Some(application_id.clone());
        request.advance(Progress::FrontendCreated);
        request.append_detail(&format!(
            "Frontend application created: {name} ({application_id})"
        ));
        self.ledger.update(request).await?;
        info!(request_id = %request.id, %application_id, "frontend application created");
        Ok(StepOutcome::Performed)
    }

    pub(crate) async fn attach_frontend_source(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::FrontendSourceAttached) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(application_id) = request.frontend_app_id.clone() else {
            return self
                .missing_precondition(request, "attach_frontend_source", "frontend_app_id")
                .await;
        };

        let repository_url = request
            .frontend_repo
            .clone()
            .unwrap_or_else(|| self.settings.frontend_repo.clone());
        let spec = AttachGitSource {
            application_id,
            repository_url: repository_url.clone(),
            branch: self.settings.git_branch.clone(),
            build_path: "/".to_string(),
        };
        if let Err(err) = self.platform.attach_git_source(spec).await {
            return self
                .fail_step(request, "attach_frontend_source", &err.to_string())
                .await;
        }

        request.advance(Progress::FrontendSourceAttached);
        request.append_detail(&format!("Frontend source attached: {repository_url}"));
        self.ledger.update(request).await?;
        Ok(StepOutcome::Performed)
    }

    /// The frontend build consumes the backend's public URL at build time;
    /// the backend host is deterministic (subdomain-derived) so this does
    /// not wait for domain creation.
    pub(crate) async fn write_frontend_env(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::FrontendEnvConfigured) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(application_id) = request.frontend_app_id.clone() else {
            return self
                .missing_precondition(request, "write_frontend_env", "frontend_app_id")
                .await;
        };

        let api_url = format!(
            "https://{}",
            backend_host(&request.subdomain, &self.settings.base_domain)
        );
        let env = format!("REACT_APP_API_URL={api_url}");
        if let Err(err) = self.platform.save_environment(&application_id, &env).await {
            return self
                .fail_step(request, "write_frontend_env", &err.to_string())
                .await;
        }

        request.advance(Progress::FrontendEnvConfigured);
        request.append_detail(&format!("Frontend environment configured (api {api_url})"));
        self.ledger.update(request).await?;
        Ok(StepOutcome::Performed)
    }

    pub(crate) async fn configure_frontend_build(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::FrontendBuildConfigured) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(application_id) = request.frontend_app_id.clone() else {
            return self
                .missing_precondition(request, "configure_frontend_build", "frontend_app_id")
                .await;
        };

        let spec = ConfigureBuild::static_site(
            application_id,
            self.settings.frontend_publish_directory.clone(),
        );
        if let Err(err) = self.platform.configure_build(spec).await {
            return self
                .fail_step(request, "configure_frontend_build", &err.to_string())
                .await;
        }

        request.advance(Progress::FrontendBuildConfigured);
        request.append_detail("Frontend build configured (static)");
        self.ledger.update(request).await?;
        Ok(StepOutcome::Performed)
    }

    pub(crate) async fn deploy_frontend(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::FrontendDeployTriggered) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(application_id) = request.frontend_app_id.clone() else {
            return self
                .missing_precondition(request, "deploy_frontend", "frontend_app_id")
                .await;
        };

        if let Err(err) = self.platform.deploy_application(&application_id).await {
            return self.fail_step(request, "deploy_frontend", &err.to_string()).await;
        }

        request.advance(Progress::FrontendDeployTriggered);
        request.append_detail("Frontend deploy triggered");
        self.ledger.update(request).await?;
        info!(request_id = %request.id, %application_id, "frontend deploy triggered");
        Ok(StepOutcome::Performed)
    }
}
