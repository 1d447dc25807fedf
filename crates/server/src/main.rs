//! Tenantd Server
//!
//! Main entry point for the tenant provisioning platform server.

mod config;
mod http;
mod startup;

use clap::Parser;

/// CLI arguments for tenantd-server
#[derive(clap::Parser, Debug)]
#[command(name = "tenantd-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tenant Provisioning Server", long_about = None)]
struct Args {
    /// HTTP port (overrides configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    setup_logging(args.debug);

    let mut config = config::ServerConfig::new()?;
    if let Some(port) = args.port {
        config.port = port;
    }

    startup::run(config).await?;

    Ok(())
}

/// Setup logging based on debug flag.
fn setup_logging(debug: bool) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}
