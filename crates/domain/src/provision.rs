//! ProvisionRequest aggregate - the persisted ledger row for one tenant.
//!
//! Progress is a single ordered state machine instead of a bag of
//! per-step booleans: a step is complete exactly when the row's progress
//! has reached the matching variant, so resumption is re-derived from one
//! persisted field. `failed` stays separate so a failed row keeps its
//! resume position for an operator retry.

use crate::shared_kernel::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Estados del ciclo de aprovisionamiento, en orden estricto de ejecución
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    /// Row created, nothing provisioned yet
    Pending,
    /// Platform project exists
    ProjectCreated,
    /// Backend application exists
    BackendCreated,
    /// Backend git source attached
    BackendSourceAttached,
    /// Backend dockerfile build configured
    BackendBuildConfigured,
    /// Postgres created and connection info discovered
    DatabaseCreated,
    /// Backend environment block written
    BackendEnvConfigured,
    /// Postgres deploy triggered
    DatabaseDeployTriggered,
    /// Backend deploy triggered
    BackendDeployTriggered,
    /// Frontend application exists
    FrontendCreated,
    /// Frontend git source attached
    FrontendSourceAttached,
    /// Frontend environment block written
    FrontendEnvConfigured,
    /// Frontend static build configured
    FrontendBuildConfigured,
    /// Frontend deploy triggered
    FrontendDeployTriggered,
    /// Both domains exist
    DomainsConfigured,
    /// Backend healthy and admin user provisioned
    Completed,
}

impl Progress {
    /// Stable string form used for persistence and status labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Progress::Pending => "pending",
            Progress::ProjectCreated => "project_created",
            Progress::BackendCreated => "backend_created",
            Progress::BackendSourceAttached => "backend_source_attached",
            Progress::BackendBuildConfigured => "backend_build_configured",
            Progress::DatabaseCreated => "database_created",
            Progress::BackendEnvConfigured => "backend_env_configured",
            Progress::DatabaseDeployTriggered => "database_deploy_triggered",
            Progress::BackendDeployTriggered => "backend_deploy_triggered",
            Progress::FrontendCreated => "frontend_created",
            Progress::FrontendSourceAttached => "frontend_source_attached",
            Progress::FrontendEnvConfigured => "frontend_env_configured",
            Progress::FrontendBuildConfigured => "frontend_build_configured",
            Progress::FrontendDeployTriggered => "frontend_deploy_triggered",
            Progress::DomainsConfigured => "domains_configured",
            Progress::Completed => "completed",
        }
    }

    /// Inverse of [`Progress::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        let all = [
            Progress::Pending,
            Progress::ProjectCreated,
            Progress::BackendCreated,
            Progress::BackendSourceAttached,
            Progress::BackendBuildConfigured,
            Progress::DatabaseCreated,
            Progress::BackendEnvConfigured,
            Progress::DatabaseDeployTriggered,
            Progress::BackendDeployTriggered,
            Progress::FrontendCreated,
            Progress::FrontendSourceAttached,
            Progress::FrontendEnvConfigured,
            Progress::FrontendBuildConfigured,
            Progress::FrontendDeployTriggered,
            Progress::DomainsConfigured,
            Progress::Completed,
        ];
        all.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Connection info for the tenant's database, discovered after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConnection {
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

/// Intake payload for a new provisioning request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvisionIntake {
    pub client_ref: Option<String>,
    pub client_name: String,
    pub subdomain: String,
    pub email: String,
    pub company: String,
    pub admin_password: Option<String>,
    pub backend_repo: Option<String>,
    pub frontend_repo: Option<String>,
}

/// Ledger row: the full persisted record of one provisioning attempt.
///
/// Mutated exclusively through a read-modify-persist cycle driven by the
/// step functions; never deleted (it doubles as the audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub id: RequestId,
    pub client_ref: Option<String>,
    pub client_name: String,
    pub subdomain: String,
    pub email: String,
    pub company: String,
    pub admin_password: Option<String>,
    pub backend_repo: Option<String>,
    pub frontend_repo: Option<String>,

    /// Free-text status label for operators
    pub status: String,
    /// Append-only human-readable audit trail
    pub detail: String,

    pub progress: Progress,
    pub failed: bool,
    pub health_attempts: u32,

    // Derived platform resource identifiers
    pub project_id: Option<String>,
    pub backend_app_id: Option<String>,
    pub frontend_app_id: Option<String>,
    pub postgres_id: Option<String>,
    pub database: Option<DatabaseConnection>,
    pub backend_domain: Option<String>,
    pub frontend_domain: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProvisionRequest {
    pub fn new(intake: ProvisionIntake) -> Self {
        let now = Utc::now();
        Self {
            id: RequestId::new(),
            client_ref: intake.client_ref,
            client_name: intake.client_name,
            subdomain: intake.subdomain,
            email: intake.email,
            company: intake.company,
            admin_password: intake.admin_password,
            backend_repo: intake.backend_repo,
            frontend_repo: intake.frontend_repo,
            status: "pending".to_string(),
            detail: String::new(),
            progress: Progress::Pending,
            failed: false,
            health_attempts: 0,
            project_id: None,
            backend_app_id: None,
            frontend_app_id: None,
            postgres_id: None,
            database: None,
            backend_domain: None,
            frontend_domain: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the given milestone has already been reached.
    pub fn reached(&self, progress: Progress) -> bool {
        self.progress >= progress
    }

    pub fn is_completed(&self) -> bool {
        self.progress == Progress::Completed
    }

    /// Terminal for the orchestrator: completed, or failed awaiting an
    /// operator retry.
    pub fn is_terminal(&self) -> bool {
        self.failed || self.is_completed()
    }

    /// Advance the state machine after a confirmed remote side effect.
    pub fn advance(&mut self, progress: Progress) {
        debug_assert!(progress > self.progress, "progress must be monotonic");
        self.progress = progress;
        self.status = progress.as_str().to_string();
        self.touch();
    }

    /// Append one line to the audit trail.
    pub fn append_detail(&mut self, line: &str) {
        if !self.detail.is_empty() {
            self.detail.push('\n');
        }
        self.detail.push_str(line);
        self.touch();
    }

    /// Mark the row failed. Progress is left untouched so a retry resumes
    /// from the last confirmed step.
    pub fn mark_failed(&mut self, step: &str, reason: &str) {
        self.failed = true;
        self.status = "failed".to_string();
        self.append_detail(&format!("Step {step} failed: {reason}"));
    }

    /// Operator action: clear the failure so the orchestrator may run again.
    pub fn clear_failure(&mut self) {
        self.failed = false;
        self.status = self.progress.as_str().to_string();
        self.append_detail("Failure cleared by operator; retry requested");
    }

    pub fn record_database(&mut self, postgres_id: String, connection: DatabaseConnection) {
        self.postgres_id = Some(postgres_id);
        self.database = Some(connection);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake() -> ProvisionIntake {
        ProvisionIntake {
            client_ref: Some("crm-42".to_string()),
            client_name: "Acme School".to_string(),
            subdomain: "acme".to_string(),
            email: "admin@acme.test".to_string(),
            company: "Acme".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn progress_order_is_total_and_monotonic() {
        assert!(Progress::Pending < Progress::ProjectCreated);
        assert!(Progress::BackendBuildConfigured < Progress::DatabaseCreated);
        assert!(Progress::FrontendDeployTriggered < Progress::DomainsConfigured);
        assert!(Progress::DomainsConfigured < Progress::Completed);
    }

    #[test]
    fn progress_labels_roundtrip() {
        for p in [
            Progress::Pending,
            Progress::BackendEnvConfigured,
            Progress::DomainsConfigured,
            Progress::Completed,
        ] {
            assert_eq!(Progress::parse(p.as_str()), Some(p));
        }
        assert_eq!(Progress::parse("unknown"), None);
    }

    #[test]
    fn new_request_starts_pending() {
        let request = ProvisionRequest::new(intake());
        assert_eq!(request.progress, Progress::Pending);
        assert!(!request.failed);
        assert!(!request.is_terminal());
        assert_eq!(request.status, "pending");
    }

    #[test]
    fn advance_updates_status_label() {
        let mut request = ProvisionRequest::new(intake());
        request.advance(Progress::ProjectCreated);
        assert_eq!(request.status, "project_created");
        assert!(request.reached(Progress::ProjectCreated));
        assert!(!request.reached(Progress::BackendCreated));
    }

    #[test]
    fn mark_failed_is_terminal_but_keeps_progress() {
        let mut request = ProvisionRequest::new(intake());
        request.advance(Progress::DatabaseCreated);
        request.mark_failed("deploy_database", "boom");
        assert!(request.failed);
        assert!(request.is_terminal());
        assert_eq!(request.progress, Progress::DatabaseCreated);
        assert!(request.detail.contains("deploy_database"));

        request.clear_failure();
        assert!(!request.failed);
        assert_eq!(request.status, "database_created");
    }

    #[test]
    fn detail_is_append_only() {
        let mut request = ProvisionRequest::new(intake());
        request.append_detail("first");
        request.append_detail("second");
        assert_eq!(request.detail, "first\nsecond");
    }
}
