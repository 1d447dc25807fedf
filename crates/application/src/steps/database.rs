//! Database provisioning.
//!
//! Two-phase create-then-discover: the create call may answer a bare
//! acknowledgement, so the connection info is read back from the project
//! listing, picking the most recently created database of the project.

use super::{backend_host, generated_secret, short_suffix, StepOutcome};
use crate::orchestrator::Orchestrator;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tenantd_domain::platform::CreatePostgres;
use tenantd_domain::{DatabaseConnection, PlatformResponse, Progress, ProvisionRequest, Result};
use tracing::{debug, info};

/// Connection fields read back from the project listing. Any field the
/// listing omits falls back to the generated credentials.
#[derive(Debug, Default)]
pub(crate) struct DiscoveredDatabase {
    pub id: String,
    pub host: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
}

fn str_field(entry: &Value, key: &str) -> Option<String> {
    entry.get(key).and_then(Value::as_str).map(str::to_string)
}

fn entry_id(entry: &Value) -> Option<String> {
    for key in ["postgresId", "id", "_id"] {
        if let Some(id) = str_field(entry, key) {
            if !id.is_empty() {
                return Some(id);
            }
        }
    }
    None
}

fn created_at(entry: &Value) -> Option<DateTime<FixedOffset>> {
    entry
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// Most recently created entry; first entry when no timestamp parses.
fn newest_entry(entries: &[Value]) -> Option<&Value> {
    let mut best: Option<(&Value, DateTime<FixedOffset>)> = None;
    for entry in entries {
        if let Some(ts) = created_at(entry) {
            let newer = match &best {
                Some((_, best_ts)) => ts > *best_ts,
                None => true,
            };
            if newer {
                best = Some((entry, ts));
            }
        }
    }
    best.map(|(entry, _)| entry).or_else(|| entries.first())
}

/// Locate the project's newest database in the `list_projects` response.
pub(crate) fn discover_database(
    listing: &PlatformResponse,
    project_id: &str,
) -> Option<DiscoveredDatabase> {
    let projects = listing.as_json()?.as_array()?;
    let project = projects.iter().find(|p| {
        ["projectId", "id"]
            .iter()
            .any(|key| p.get(*key).and_then(Value::as_str) == Some(project_id))
    })?;
    let databases = project.get("postgres").and_then(Value::as_array)?;
    let entry = newest_entry(databases)?;

    Some(DiscoveredDatabase {
        id: entry_id(entry)?,
        host: str_field(entry, "appName"),
        name: str_field(entry, "databaseName"),
        user: str_field(entry, "databaseUser"),
        password: str_field(entry, "databasePassword"),
        port: entry.get("port").and_then(Value::as_u64).map(|p| p as u16),
    })
}

/// KEY=VALUE block written into the backend application.
fn backend_env_block(db: &DatabaseConnection, allowed_host: &str) -> String {
    [
        format!("DB_HOST={}", db.host),
        format!("DB_PORT={}", db.port),
        format!("DB_NAME={}", db.name),
        format!("DB_USER={}", db.user),
        format!("DB_PASSWORD={}", db.password),
        format!("SECRET_KEY={}", uuid::Uuid::new_v4().simple()),
        format!("ALLOWED_HOSTS={allowed_host}"),
    ]
    .join("\n")
}

impl Orchestrator {
    pub(crate) async fn create_database(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::DatabaseCreated) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(project_id) = request.project_id.clone() else {
            return self
                .missing_precondition(request, "create_database", "project_id")
                .await;
        };

        let suffix = short_suffix();
        let app_name = format!("{}-db-{}", request.subdomain, suffix);
        let database_name = format!("db_{suffix}");
        let database_user = format!("user_{suffix}");
        let database_password = generated_secret();

        let spec = CreatePostgres {
            project_id: project_id.clone(),
            name: format!("{}-db", request.subdomain),
            app_name: app_name.clone(),
            database_name: database_name.clone(),
            database_user: database_user.clone(),
            database_password: database_password.clone(),
            docker_image: self.settings.postgres_image.clone(),
        };
        if let Err(err) = self.platform.create_postgres(spec).await {
            return self.fail_step(request, "create_database", &err.to_string()).await;
        }

        debug!(request_id = %request.id, %project_id, "database created; discovering connection info");
        let listing = match self.platform.list_projects().await {
            Ok(listing) => listing,
            Err(err) => return self.fail_step(request, "create_database", &err.to_string()).await,
        };
        let Some(found) = discover_database(&listing, &project_id) else {
            return self
                .fail_step(
                    request,
                    "create_database",
                    "project listing did not expose the new database",
                )
                .await;
        };

        let postgres_id = found.id.clone();
        let connection = DatabaseConnection {
            host: found.host.unwrap_or(app_name),
            name: found.name.unwrap_or(database_name),
            user: found.user.unwrap_or(database_user),
            password: found.password.unwrap_or(database_password),
            port: found.port.unwrap_or(5432),
        };
        request.record_database(postgres_id.clone(), connection);
        request.advance(Progress::DatabaseCreated);
        request.append_detail(&format!("Database created and discovered: {postgres_id}"));
        self.ledger.update(request).await?;
        info!(request_id = %request.id, %postgres_id, "database provisioned");
        Ok(StepOutcome::Performed)
    }

    pub(crate) async fn write_backend_env(
        &self,
        request: &mut ProvisionRequest,
    ) -> Result<StepOutcome> {
        if request.reached(Progress::BackendEnvConfigured) {
            return Ok(StepOutcome::AlreadyDone);
        }
        let Some(application_id) = request.backend_app_id.clone() else {
            return self
                .missing_precondition(request, "write_backend_env", "backend_app_id")
                .await;
        };
        let Some(database) = request.database.clone() else {
            return self
                .missing_precondition(request, "write_backend_env", "database")
                .await;
        };

        let host = backend_host(&request.subdomain, &self.settings.base_domain);
        let env = backend_env_block(&database, &host);
        if let Err(err) = self.platform.save_environment(&application_id, &env).await {
            return self.fail_step(request, "write_backend_env", &err.to_string()).await;
        }

        request.advance(Progress::BackendEnvConfigured);
        request.append_detail("Backend environment configured");
        self.ledger.update(request).await?;
        Ok(StepOutcome::Performed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(databases: Value) -> PlatformResponse {
        PlatformResponse::Json(json!([
            {"projectId": "other", "postgres": [{"postgresId": "nope"}]},
            {"projectId": "proj-1", "postgres": databases},
        ]))
    }

    #[test]
    fn discovery_picks_newest_database() {
        let response = listing(json!([
            {"postgresId": "pg-old", "createdAt": "2026-01-01T00:00:00Z"},
            {"postgresId": "pg-new", "createdAt": "2026-03-01T00:00:00Z",
             "appName": "acme-db", "databaseName": "db_x", "databaseUser": "u_x",
             "databasePassword": "s3cret", "port": 5433},
        ]));
        let found = discover_database(&response, "proj-1").unwrap();
        assert_eq!(found.id, "pg-new");
        assert_eq!(found.host.as_deref(), Some("acme-db"));
        assert_eq!(found.port, Some(5433));
    }

    #[test]
    fn discovery_falls_back_to_first_without_timestamps() {
        let response = listing(json!([
            {"postgresId": "pg-a", "createdAt": "not a timestamp"},
            {"postgresId": "pg-b"},
        ]));
        let found = discover_database(&response, "proj-1").unwrap();
        assert_eq!(found.id, "pg-a");
    }

    #[test]
    fn discovery_fails_for_unknown_project_or_empty_list() {
        let response = listing(json!([]));
        assert!(discover_database(&response, "proj-1").is_none());
        assert!(discover_database(&response, "missing").is_none());
        assert!(discover_database(&PlatformResponse::Text("true".into()), "proj-1").is_none());
    }

    #[test]
    fn env_block_lists_connection_and_allowed_host() {
        let db = DatabaseConnection {
            host: "acme-db".into(),
            name: "db_x".into(),
            user: "u_x".into(),
            password: "pw".into(),
            port: 5432,
        };
        let env = backend_env_block(&db, "acme-api.apps.test");
        assert!(env.contains("DB_HOST=acme-db"));
        assert!(env.contains("DB_PORT=5432"));
        assert!(env.contains("ALLOWED_HOSTS=acme-api.apps.test"));
        assert!(env.contains("SECRET_KEY="));
    }
}
