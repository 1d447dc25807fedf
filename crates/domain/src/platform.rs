//! Deployment Platform port.
//!
//! One typed operation per remote API call the workflow needs. The
//! adapter owns transport, authentication and retry; callers see either a
//! [`PlatformResponse`] or a [`PlatformError`] that already carries the
//! exhausted attempt count. The port never touches the ledger.

use crate::response::PlatformResponse;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Error surfaced by the platform adapter after its own retry budget is
/// spent. `attempts` counts every try, including the first.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{operation} returned status {status} after {attempts} attempt(s): {body}")]
    Status {
        operation: String,
        status: u16,
        attempts: u32,
        body: String,
    },

    #[error("{operation} failed after {attempts} attempt(s): {cause}")]
    Transport {
        operation: String,
        attempts: u32,
        cause: String,
    },
}

impl PlatformError {
    pub fn operation(&self) -> &str {
        match self {
            PlatformError::Status { operation, .. } => operation,
            PlatformError::Transport { operation, .. } => operation,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PlatformError::Status { attempts, .. } => *attempts,
            PlatformError::Transport { attempts, .. } => *attempts,
        }
    }
}

pub type PlatformResult = std::result::Result<PlatformResponse, PlatformError>;

/// Spec for a new platform project (one per tenant).
#[derive(Debug, Clone, Serialize)]
pub struct CreateProject {
    pub name: String,
    pub description: String,
}

/// Spec for a new application inside a project.
#[derive(Debug, Clone, Serialize)]
pub struct CreateApplication {
    pub project_id: String,
    pub name: String,
    pub description: String,
}

/// Git source to attach to an application.
#[derive(Debug, Clone, Serialize)]
pub struct AttachGitSource {
    pub application_id: String,
    pub repository_url: String,
    pub branch: String,
    pub build_path: String,
}

/// Build configuration for an application.
///
/// Dockerfile builds leave `publish_directory` empty; static SPA builds
/// set `is_static_spa` plus the directory to publish.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigureBuild {
    pub application_id: String,
    pub build_type: String,
    pub dockerfile: String,
    pub docker_context_path: String,
    pub docker_build_stage: String,
    pub is_static_spa: bool,
    pub publish_directory: Option<String>,
}

impl ConfigureBuild {
    pub fn dockerfile(application_id: String, dockerfile: String) -> Self {
        Self {
            application_id,
            build_type: "dockerfile".to_string(),
            dockerfile,
            docker_context_path: String::new(),
            docker_build_stage: String::new(),
            is_static_spa: false,
            publish_directory: None,
        }
    }

    pub fn static_site(application_id: String, publish_directory: String) -> Self {
        Self {
            application_id,
            build_type: "static".to_string(),
            dockerfile: String::new(),
            docker_context_path: String::new(),
            docker_build_stage: String::new(),
            is_static_spa: true,
            publish_directory: Some(publish_directory),
        }
    }
}

/// Spec for the tenant's postgres instance.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePostgres {
    pub project_id: String,
    pub name: String,
    pub app_name: String,
    pub database_name: String,
    pub database_user: String,
    pub database_password: String,
    pub docker_image: String,
}

/// Spec for a public domain routed to an application.
#[derive(Debug, Clone, Serialize)]
pub struct CreateDomain {
    pub application_id: String,
    pub host: String,
    pub port: u16,
    pub https: bool,
    pub certificate_type: String,
    pub domain_type: String,
}

impl CreateDomain {
    /// HTTPS application domain with a Let's Encrypt certificate.
    pub fn application(application_id: String, host: String, port: u16) -> Self {
        Self {
            application_id,
            host,
            port,
            https: true,
            certificate_type: "letsencrypt".to_string(),
            domain_type: "application".to_string(),
        }
    }
}

/// Port to the remote deployment platform.
#[async_trait]
pub trait DeploymentPlatform: Send + Sync {
    async fn create_project(&self, spec: CreateProject) -> PlatformResult;

    async fn create_application(&self, spec: CreateApplication) -> PlatformResult;

    async fn attach_git_source(&self, spec: AttachGitSource) -> PlatformResult;

    async fn configure_build(&self, spec: ConfigureBuild) -> PlatformResult;

    /// Write the full KEY=VALUE environment block of an application.
    async fn save_environment(&self, application_id: &str, env: &str) -> PlatformResult;

    async fn create_postgres(&self, spec: CreatePostgres) -> PlatformResult;

    async fn deploy_postgres(&self, postgres_id: &str) -> PlatformResult;

    async fn deploy_application(&self, application_id: &str) -> PlatformResult;

    async fn create_domain(&self, spec: CreateDomain) -> PlatformResult;

    async fn delete_domain(&self, domain_id: &str) -> PlatformResult;

    /// Full project listing; the database step reads connection info out
    /// of it because the create call does not return credentials.
    async fn list_projects(&self) -> PlatformResult;
}
