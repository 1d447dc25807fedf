// In-memory Repositories
// Implementación en memoria del ledger, para tests y despliegues pequeños

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tenantd_domain::{DomainError, ProvisionLedger, ProvisionRequest, RequestId, Result};
use tokio::sync::RwLock;

/// Ledger en memoria con las mismas invariantes de unicidad que el
/// esquema SQL (client_ref y subdomain únicos)
#[derive(Clone, Default)]
pub struct InMemoryProvisionLedger {
    rows: Arc<RwLock<HashMap<RequestId, ProvisionRequest>>>,
}

impl InMemoryProvisionLedger {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ProvisionLedger for InMemoryProvisionLedger {
    async fn save(&self, request: &ProvisionRequest) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(client_ref) = request.client_ref.as_deref() {
            if rows
                .values()
                .any(|row| row.id != request.id && row.client_ref.as_deref() == Some(client_ref))
            {
                return Err(DomainError::DuplicateClientRef {
                    client_ref: client_ref.to_string(),
                });
            }
        }
        if rows
            .values()
            .any(|row| row.id != request.id && row.subdomain == request.subdomain)
        {
            return Err(DomainError::DuplicateSubdomain {
                subdomain: request.subdomain.clone(),
            });
        }
        rows.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn update(&self, request: &ProvisionRequest) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn find_by_id(&self, request_id: &RequestId) -> Result<Option<ProvisionRequest>> {
        let rows = self.rows.read().await;
        Ok(rows.get(request_id).cloned())
    }

    async fn find_by_client_ref(&self, client_ref: &str) -> Result<Option<ProvisionRequest>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|row| row.client_ref.as_deref() == Some(client_ref))
            .cloned())
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<ProvisionRequest>> {
        let rows = self.rows.read().await;
        Ok(rows.values().find(|row| row.subdomain == subdomain).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantd_domain::provision::ProvisionIntake;

    fn request(client_ref: Option<&str>, subdomain: &str) -> ProvisionRequest {
        ProvisionRequest::new(ProvisionIntake {
            client_ref: client_ref.map(str::to_string),
            client_name: "Acme".to_string(),
            subdomain: subdomain.to_string(),
            email: "admin@acme.test".to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn save_and_find_back() {
        let ledger = InMemoryProvisionLedger::new();
        let row = request(Some("ref-1"), "acme");
        ledger.save(&row).await.unwrap();

        assert!(ledger.find_by_id(&row.id).await.unwrap().is_some());
        assert!(ledger.find_by_client_ref("ref-1").await.unwrap().is_some());
        assert!(ledger.find_by_subdomain("acme").await.unwrap().is_some());
        assert!(ledger.find_by_subdomain("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_subdomain_is_rejected() {
        let ledger = InMemoryProvisionLedger::new();
        ledger.save(&request(None, "acme")).await.unwrap();
        let err = ledger.save(&request(None, "acme")).await.unwrap_err();
        assert!(matches!(err, DomainError::DuplicateSubdomain { .. }));
    }

    #[tokio::test]
    async fn duplicate_client_ref_is_rejected() {
        let ledger = InMemoryProvisionLedger::new();
        ledger.save(&request(Some("ref-1"), "acme")).await.unwrap();
        let err = ledger.save(&request(Some("ref-1"), "beta")).await.unwrap_err();
        assert!(matches!(err, DomainError::DuplicateClientRef { .. }));
    }

    #[tokio::test]
    async fn update_persists_mutations() {
        let ledger = InMemoryProvisionLedger::new();
        let mut row = request(None, "acme");
        ledger.save(&row).await.unwrap();

        row.mark_failed("create_project", "boom");
        ledger.update(&row).await.unwrap();

        let loaded = ledger.find_by_id(&row.id).await.unwrap().unwrap();
        assert!(loaded.failed);
        assert!(loaded.detail.contains("create_project"));
    }
}
