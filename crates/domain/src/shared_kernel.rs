// Shared Kernel - Tipos base y errores compartidos entre bounded contexts

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identificador único para solicitudes de aprovisionamiento
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errores del dominio
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("Provision request not found: {request_id}")]
    RequestNotFound { request_id: RequestId },

    #[error("Client reference already registered: {client_ref}")]
    DuplicateClientRef { client_ref: String },

    #[error("Subdomain already registered: {subdomain}")]
    DuplicateSubdomain { subdomain: String },

    #[error("Invalid provision request: {message}")]
    InvalidRequest { message: String },

    #[error("Step {step} precondition missing: {field}")]
    MissingPrecondition { step: String, field: String },

    #[error("Ledger error: {message}")]
    LedgerError { message: String },

    #[error("Scheduler error: {message}")]
    SchedulerError { message: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_roundtrips_through_string() {
        let id = RequestId::new();
        let parsed = RequestId::from_string(&id.to_string());
        assert_eq!(parsed, Some(id));
    }

    #[test]
    fn request_id_rejects_garbage() {
        assert_eq!(RequestId::from_string("not-a-uuid"), None);
    }
}
