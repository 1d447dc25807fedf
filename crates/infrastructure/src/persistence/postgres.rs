//! PostgreSQL ledger store.
//!
//! Uniqueness of `client_ref` and `subdomain` is enforced by the schema;
//! constraint violations are mapped back to the matching domain errors.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tenantd_domain::{
    DatabaseConnection, DomainError, Progress, ProvisionLedger, ProvisionRequest, RequestId,
    Result,
};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS provision_requests (
    id UUID PRIMARY KEY,
    client_ref TEXT UNIQUE,
    client_name TEXT NOT NULL,
    subdomain TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    company TEXT NOT NULL DEFAULT '',
    admin_password TEXT,
    backend_repo TEXT,
    frontend_repo TEXT,
    status TEXT NOT NULL,
    detail TEXT NOT NULL DEFAULT '',
    progress TEXT NOT NULL,
    failed BOOLEAN NOT NULL DEFAULT FALSE,
    health_attempts INTEGER NOT NULL DEFAULT 0,
    project_id TEXT,
    backend_app_id TEXT,
    frontend_app_id TEXT,
    postgres_id TEXT,
    db_host TEXT,
    db_name TEXT,
    db_user TEXT,
    db_password TEXT,
    db_port INTEGER,
    backend_domain TEXT,
    frontend_domain TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)
"#;

const SELECT: &str = "SELECT * FROM provision_requests";

pub struct PgProvisionLedger {
    pool: PgPool,
}

impl PgProvisionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema bootstrap, run once at startup.
    pub async fn ensure_schema(&self) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        info!("provision_requests schema ensured");
        Ok(())
    }
}

fn map_sqlx_error(err: sqlx::Error, request: &ProvisionRequest) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.constraint() {
            Some("provision_requests_subdomain_key") => {
                return DomainError::DuplicateSubdomain {
                    subdomain: request.subdomain.clone(),
                };
            }
            Some("provision_requests_client_ref_key") => {
                return DomainError::DuplicateClientRef {
                    client_ref: request.client_ref.clone().unwrap_or_default(),
                };
            }
            _ => {}
        }
    }
    DomainError::LedgerError {
        message: err.to_string(),
    }
}

fn ledger_error(err: sqlx::Error) -> DomainError {
    DomainError::LedgerError {
        message: err.to_string(),
    }
}

fn row_to_request(row: &PgRow) -> std::result::Result<ProvisionRequest, sqlx::Error> {
    let db_host: Option<String> = row.try_get("db_host")?;
    let db_name: Option<String> = row.try_get("db_name")?;
    let db_user: Option<String> = row.try_get("db_user")?;
    let db_password: Option<String> = row.try_get("db_password")?;
    let db_port: Option<i32> = row.try_get("db_port")?;
    let database = match (db_host, db_name, db_user, db_password) {
        (Some(host), Some(name), Some(user), Some(password)) => Some(DatabaseConnection {
            host,
            name,
            user,
            password,
            port: db_port.unwrap_or(5432) as u16,
        }),
        _ => None,
    };

    let progress: String = row.try_get("progress")?;
    let health_attempts: i32 = row.try_get("health_attempts")?;

    Ok(ProvisionRequest {
        id: RequestId(row.try_get("id")?),
        client_ref: row.try_get("client_ref")?,
        client_name: row.try_get("client_name")?,
        subdomain: row.try_get("subdomain")?,
        email: row.try_get("email")?,
        company: row.try_get("company")?,
        admin_password: row.try_get("admin_password")?,
        backend_repo: row.try_get("backend_repo")?,
        frontend_repo: row.try_get("frontend_repo")?,
        status: row.try_get("status")?,
        detail: row.try_get("detail")?,
        progress: Progress::parse(&progress).unwrap_or(Progress::Pending),
        failed: row.try_get("failed")?,
        health_attempts: health_attempts.max(0) as u32,
        project_id: row.try_get("project_id")?,
        backend_app_id: row.try_get("backend_app_id")?,
        frontend_app_id: row.try_get("frontend_app_id")?,
        postgres_id: row.try_get("postgres_id")?,
        database,
        backend_domain: row.try_get("backend_domain")?,
        frontend_domain: row.try_get("frontend_domain")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ProvisionLedger for PgProvisionLedger {
    async fn save(&self, request: &ProvisionRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO provision_requests (
                id, client_ref, client_name, subdomain, email, company,
                admin_password, backend_repo, frontend_repo, status, detail,
                progress, failed, health_attempts, project_id, backend_app_id,
                frontend_app_id, postgres_id, db_host, db_name, db_user,
                db_password, db_port, backend_domain, frontend_domain,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27
            )
            "#,
        )
        .bind(request.id.0)
        .bind(&request.client_ref)
        .bind(&request.client_name)
        .bind(&request.subdomain)
        .bind(&request.email)
        .bind(&request.company)
        .bind(&request.admin_password)
        .bind(&request.backend_repo)
        .bind(&request.frontend_repo)
        .bind(&request.status)
        .bind(&request.detail)
        .bind(request.progress.as_str())
        .bind(request.failed)
        .bind(request.health_attempts as i32)
        .bind(&request.project_id)
        .bind(&request.backend_app_id)
        .bind(&request.frontend_app_id)
        .bind(&request.postgres_id)
        .bind(request.database.as_ref().map(|db| db.host.clone()))
        .bind(request.database.as_ref().map(|db| db.name.clone()))
        .bind(request.database.as_ref().map(|db| db.user.clone()))
        .bind(request.database.as_ref().map(|db| db.password.clone()))
        .bind(request.database.as_ref().map(|db| db.port as i32))
        .bind(&request.backend_domain)
        .bind(&request.frontend_domain)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| map_sqlx_error(err, request))?;
        Ok(())
    }

    async fn update(&self, request: &ProvisionRequest) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE provision_requests SET
                status = $2, detail = $3, progress = $4, failed = $5,
                health_attempts = $6, project_id = $7, backend_app_id = $8,
                frontend_app_id = $9, postgres_id = $10, db_host = $11,
                db_name = $12, db_user = $13, db_password = $14, db_port = $15,
                backend_domain = $16, frontend_domain = $17, updated_at = $18
            WHERE id = $1
            "#,
        )
        .bind(request.id.0)
        .bind(&request.status)
        .bind(&request.detail)
        .bind(request.progress.as_str())
        .bind(request.failed)
        .bind(request.health_attempts as i32)
        .bind(&request.project_id)
        .bind(&request.backend_app_id)
        .bind(&request.frontend_app_id)
        .bind(&request.postgres_id)
        .bind(request.database.as_ref().map(|db| db.host.clone()))
        .bind(request.database.as_ref().map(|db| db.name.clone()))
        .bind(request.database.as_ref().map(|db| db.user.clone()))
        .bind(request.database.as_ref().map(|db| db.password.clone()))
        .bind(request.database.as_ref().map(|db| db.port as i32))
        .bind(&request.backend_domain)
        .bind(&request.frontend_domain)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(ledger_error)?;
        Ok(())
    }

    async fn find_by_id(&self, request_id: &RequestId) -> Result<Option<ProvisionRequest>> {
        let row = sqlx::query(&format!("{SELECT} WHERE id = $1"))
            .bind(request_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(ledger_error)?;
        row.as_ref()
            .map(row_to_request)
            .transpose()
            .map_err(ledger_error)
    }

    async fn find_by_client_ref(&self, client_ref: &str) -> Result<Option<ProvisionRequest>> {
        let row = sqlx::query(&format!("{SELECT} WHERE client_ref = $1"))
            .bind(client_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(ledger_error)?;
        row.as_ref()
            .map(row_to_request)
            .transpose()
            .map_err(ledger_error)
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<ProvisionRequest>> {
        let row = sqlx::query(&format!("{SELECT} WHERE subdomain = $1"))
            .bind(subdomain)
            .fetch_optional(&self.pool)
            .await
            .map_err(ledger_error)?;
        row.as_ref()
            .map(row_to_request)
            .transpose()
            .map_err(ledger_error)
    }
}
