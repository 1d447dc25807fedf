use serde::Deserialize;
use std::env;

/// Server configuration, merged from defaults, optional config files and
/// `TENANTD_`-prefixed environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// PostgreSQL URL for the ledger; in-memory store when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_platform_api_base")]
    pub platform_api_base: String,
    #[serde(default)]
    pub platform_api_key: String,

    #[serde(default = "default_base_domain")]
    pub base_domain: String,
    #[serde(default = "default_backend_repo")]
    pub backend_repo: String,
    #[serde(default = "default_frontend_repo")]
    pub frontend_repo: String,

    #[serde(default)]
    pub provision_secret_1: String,
    #[serde(default)]
    pub provision_secret_2: String,
    #[serde(default)]
    pub callback_token: String,

    #[serde(default = "default_post_deploy_wait_secs")]
    pub post_deploy_wait_secs: u64,
    #[serde(default = "default_health_initial_delay_secs")]
    pub health_initial_delay_secs: u64,
    #[serde(default = "default_first_run_delay_secs")]
    pub first_run_delay_secs: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_platform_api_base() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_base_domain() -> String {
    "apps.localhost".to_string()
}

fn default_backend_repo() -> String {
    "https://github.com/example/tenant-backend.git".to_string()
}

fn default_frontend_repo() -> String {
    "https://github.com/example/tenant-frontend.git".to_string()
}

fn default_post_deploy_wait_secs() -> u64 {
    120
}

fn default_health_initial_delay_secs() -> u64 {
    60
}

fn default_first_run_delay_secs() -> u64 {
    1
}

impl ServerConfig {
    pub fn new() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::Environment::with_prefix("TENANTD"))
            .build()?;

        s.try_deserialize()
    }
}
