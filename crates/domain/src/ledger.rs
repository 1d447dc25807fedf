//! Progress Ledger port.
//!
//! The persistence technology behind the ledger is an infrastructure
//! concern; the core only needs a record it can load, mutate and persist.

use crate::provision::ProvisionRequest;
use crate::shared_kernel::{RequestId, Result};
use async_trait::async_trait;

/// Repository port for [`ProvisionRequest`] rows.
///
/// `save` inserts a new row and enforces the uniqueness invariants
/// (client_ref, subdomain). `update` persists a mutated row. Rows are
/// never deleted: the ledger is also the audit trail.
#[async_trait]
pub trait ProvisionLedger: Send + Sync {
    async fn save(&self, request: &ProvisionRequest) -> Result<()>;

    async fn update(&self, request: &ProvisionRequest) -> Result<()>;

    async fn find_by_id(&self, request_id: &RequestId) -> Result<Option<ProvisionRequest>>;

    async fn find_by_client_ref(&self, client_ref: &str) -> Result<Option<ProvisionRequest>>;

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<ProvisionRequest>>;
}
