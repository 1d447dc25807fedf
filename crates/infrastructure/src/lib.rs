//! Infrastructure adapters for the tenantd provisioning platform.
//!
//! Implements the domain ports against the real world: the deployment
//! platform's HTTP API, an in-process tokio job scheduler, the tenant's
//! own HTTP endpoints, and ledger stores (in-memory for tests and small
//! deployments, PostgreSQL for production).

pub mod endpoint;
pub mod persistence;
pub mod platform;
pub mod repositories;
pub mod scheduler;

pub use endpoint::HttpTenantEndpoint;
pub use persistence::postgres::PgProvisionLedger;
pub use platform::{DokployPlatformClient, PlatformClientConfig, RetryPolicy};
pub use repositories::InMemoryProvisionLedger;
pub use scheduler::TokioJobScheduler;
