//! Domain creation with compensation.
//!
//! The platform has no multi-resource transaction, so the two domains are
//! created one after another and the first is rolled back when the second
//! fails. Rollback only applies to a domain created in the current run; a
//! domain surviving from an earlier resumed attempt is left alone.

use super::StepOutcome;
use crate::orchestrator::Orchestrator;
use tenantd_domain::platform::CreateDomain;
use tenantd_domain::{extract_id, Progress, ProvisionRequest, Result};
use tracing::{info, warn};

pub(crate) fn frontend_host(subdomain: &str, base_domain: &str) -> String {
    format!("{subdomain}.{base_domain}")
}

pub(crate) fn backend_host(subdomain: &str, base_domain: &str) -> String {
    format!("{subdomain}-api.{base_domain}")
}

impl Orchestrator {
    pub(crate) async fn create_domains(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::DomainsConfigured) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(frontend_app_id) = request.frontend_app_id.clone() else {
            return self
                .missing_precondition(request, "create_domains", "frontend_app_id")
                .await;
        };
        let Some(backend_app_id) = request.backend_app_id.clone() else {
            return self
                .missing_precondition(request, "create_domains", "backend_app_id")
                .await;
        };

        let frontend = frontend_host(&request.subdomain, &self.settings.base_domain);
        let backend = backend_host(&request.subdomain, &self.settings.base_domain);

        // Frontend first. Tracks the created domain id so only a domain
        // from this very run is eligible for rollback.
        let mut created_this_run: Option<String> = None;
        if request.frontend_domain.is_none() {
            let spec = CreateDomain::application(
                frontend_app_id,
                frontend.clone(),
                self.settings.frontend_port,
            );
            match self.platform.create_domain(spec).await {
                Ok(response) => {
                    created_this_run = extract_id(&response);
                    request.frontend_domain = Some(frontend.clone());
                    request.append_detail(&format!("Frontend domain created: {frontend}"));
                    self.ledger.update(request).await?;
                }
                Err(err) => {
                    return self
                        .fail_step(request, "create_domains", &format!("frontend domain: {err}"))
                        .await;
                }
            }
        }

        let spec =
            CreateDomain::application(backend_app_id, backend.clone(), self.settings.backend_port);
        match self.platform.create_domain(spec).await {
            Ok(_) => {
                request.backend_domain = Some(backend.clone());
                request.advance(Progress::DomainsConfigured);
                request.append_detail(&format!("Backend domain created: {backend}"));
                self.ledger.update(request).await?;
                info!(request_id = %request.id, %frontend, %backend, "domains configured");
                Ok(StepOutcome::Performed)
            }
            Err(err) => {
                if let Some(domain_id) = created_this_run {
                    warn!(
                        request_id = %request.id,
                        %domain_id,
                        "backend domain creation failed; rolling back frontend domain"
                    );
                    match self.platform.delete_domain(&domain_id).await {
                        Ok(_) => {
                            request.frontend_domain = None;
                            request.append_detail(&format!(
                                "Frontend domain rolled back: {frontend}"
                            ));
                        }
                        Err(rollback_err) => {
                            // Best effort only; the failure outcome stands.
                            warn!(
                                request_id = %request.id,
                                %domain_id,
                                error = %rollback_err,
                                "frontend domain rollback failed"
                            );
                            request.append_detail(&format!(
                                "Frontend domain rollback failed: {rollback_err}"
                            ));
                        }
                    }
                }
                self.fail_step(request, "create_domains", &format!("backend domain: {err}"))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_derive_from_subdomain() {
        assert_eq!(frontend_host("acme", "apps.test"), "acme.apps.test");
        assert_eq!(backend_host("acme", "apps.test"), "acme-api.apps.test");
    }
}
