//! Project creation: the platform project that will hold every tenant
//! resource.

use super::StepOutcome;
use crate::orchestrator::Orchestrator;
use tenantd_domain::platform::CreateProject;
use tenantd_domain::{extract_id, Progress, ProvisionRequest, Result};
use tracing::{debug, info};

/// Readable project name derived from the client name, scoped by the
/// unique subdomain.
pub(crate) fn project_name(client_name: &str, subdomain: &str) -> String {
    let normalized = client_name
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join("-");
    if normalized.is_empty() {
        subdomain.to_string()
    } else {
        format!("{normalized}-{subdomain}")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl Orchestrator {
    pub(crate) async fn create_project(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::ProjectCreated) {
            return Ok(StepOutcome::AlreadyDone);
        }

        let name = project_name(&request.client_name, &request.subdomain);
        debug!(request_id = %request.id, %name, "creating platform project");
        let spec = CreateProject {
            name: name.clone(),
            description: format!(
                "Tenant {} ({})",
                request.client_name, request.subdomain
            ),
        };

        let response = match self.platform.create_project(spec).await {
            Ok(response) => response,
            Err(err) => return self.fail_step(request, "create_project", &err.to_string()).await,
        };
        let Some(project_id) = extract_id(&response) else {
            return self
                .fail_step(request, "create_project", "response carried no project id")
                .await;
        };

        request.project_id = Some(project_id.clone());
        request.advance(Progress::ProjectCreated);
        request.append_detail(&format!("Project created: {name} ({project_id})"));
        self.ledger.update(request).await?;
        info!(request_id = %request.id, %project_id, "project created");
        Ok(StepOutcome::Performed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_name_normalizes_client_name() {
        assert_eq!(project_name("acme school", "acme"), "Acme-School-acme");
        assert_eq!(project_name("  ACME   labs ", "acme"), "Acme-Labs-acme");
        assert_eq!(project_name("", "acme"), "acme");
    }
}
