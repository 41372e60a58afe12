//! Agent Key Gateway
//!
//! An API gateway that authenticates API keys, enforces per-key rate limits,
//! and records usage and billing aggregates in DynamoDB.

use agent_key_gateway::{
    config::{Environment, Settings},
    server::App,
};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Agent Key Gateway
///
/// API-key authentication, rate limiting, and usage accounting for an
/// agent-style HTTP service.
#[derive(Parser, Debug)]
#[command(name = "agent-key-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST env var)
    #[arg(long)]
    host: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,

    /// Service instance to authenticate keys for (overrides SERVICE_ID env var)
    #[arg(long)]
    service_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    // Override settings with CLI arguments
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }
    if let Some(service_id) = args.service_id {
        settings.service_id = service_id;
    }

    init_tracing(&settings.log_level, settings.environment);

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        service_id = %settings.service_id,
        host = %settings.host,
        port = %settings.port,
        rate_limit_enabled = settings.rate_limit.enabled,
        "Starting application"
    );

    // Build the application
    let app = App::new(settings).await?;

    // Run the server with graceful shutdown
    app.run_with_graceful_shutdown().await?;

    tracing::info!("Application shutdown complete");

    Ok(())
}

/// Initialize the tracing subscriber.
///
/// Development gets human-readable output; staging and production emit JSON
/// for log aggregation. RUST_LOG overrides the configured level.
fn init_tracing(log_level: &str, environment: Environment) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if environment == Environment::Development {
        let layer = fmt::layer().with_filter(filter);
        tracing_subscriber::registry().with(layer).init();
    } else {
        let layer = fmt::layer().json().with_filter(filter);
        tracing_subscriber::registry().with(layer).init();
    }
}
