//! Dependency wiring and server startup.

use crate::config::ServerConfig;
use crate::http::{self, AppState};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tenantd_application::{
    HealthMonitor, HealthSettings, Orchestrator, ProvisioningService, ProvisioningSettings,
    TenantEndpoint,
};
use tenantd_domain::{DeploymentPlatform, JobScheduler, ProvisionLedger};
use tenantd_infrastructure::endpoint::TenantEndpointConfig;
use tenantd_infrastructure::{
    DokployPlatformClient, HttpTenantEndpoint, InMemoryProvisionLedger, PgProvisionLedger,
    PlatformClientConfig, TokioJobScheduler,
};
use tracing::info;

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let ledger: Arc<dyn ProvisionLedger> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let ledger = PgProvisionLedger::new(pool);
            ledger.ensure_schema().await?;
            info!("ledger: postgres");
            Arc::new(ledger)
        }
        None => {
            info!("ledger: in-memory (no database_url configured)");
            Arc::new(InMemoryProvisionLedger::new())
        }
    };

    let scheduler: Arc<dyn JobScheduler> = Arc::new(TokioJobScheduler::new());

    let platform: Arc<dyn DeploymentPlatform> = Arc::new(DokployPlatformClient::new(
        PlatformClientConfig::new(
            config.platform_api_base.clone(),
            config.platform_api_key.clone(),
        ),
    )?);

    let endpoint: Arc<dyn TenantEndpoint> = Arc::new(HttpTenantEndpoint::new(
        TenantEndpointConfig::new(config.callback_token.clone()),
    )?);

    let health = Arc::new(HealthMonitor::new(
        Arc::clone(&ledger),
        endpoint,
        Arc::clone(&scheduler),
        HealthSettings {
            initial_delay: Duration::from_secs(config.health_initial_delay_secs),
            ..HealthSettings::default()
        },
    ));

    let settings = ProvisioningSettings {
        base_domain: config.base_domain.clone(),
        backend_repo: config.backend_repo.clone(),
        frontend_repo: config.frontend_repo.clone(),
        post_deploy_wait: Duration::from_secs(config.post_deploy_wait_secs),
        ..ProvisioningSettings::default()
    };
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&ledger),
        platform,
        health,
        settings,
    ));

    let service = Arc::new(
        ProvisioningService::new(ledger, scheduler, orchestrator)
            .with_first_run_delay(Duration::from_secs(config.first_run_delay_secs)),
    );

    let state = AppState {
        service,
        secret_1: config.provision_secret_1.clone(),
        secret_2: config.provision_secret_2.clone(),
    };

    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "tenantd server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to setup signal handler: {}", e);
    }
    info!("Shutting down gracefully...");
}
