//! Campaign Serve: eligibility and serving engine for the browser extension.
//!
//! Main entry point that wires the store, the live counter and the HTTP
//! server.

use campaign_api::{ApiServer, AppState};
use campaign_core::config::{AppConfig, Environment};
use campaign_realtime::ConnectionCounter;
use campaign_store::{CampaignRepository, InMemoryRepository, PgCampaignRepository};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-serve")]
#[command(about = "Ad, popup and notification serving engine for the browser extension")]
#[command(version)]
struct Cli {
    /// HTTP port (overrides config)
    #[arg(long, env = "CAMPAIGN_SERVE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// development or production (overrides config)
    #[arg(long, env = "CAMPAIGN_SERVE__ENVIRONMENT")]
    environment: Option<Environment>,

    /// Serve from a seeded in-memory store instead of PostgreSQL
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Skip Redis; live endpoints report zero connections
    #[arg(long, default_value_t = false)]
    no_realtime: bool,

    /// Count live connections in this process instead of Redis
    #[arg(long, default_value_t = false, conflicts_with = "no_realtime")]
    local_realtime: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_serve=info,campaign_engine=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Campaign Serve starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(environment) = cli.environment {
        config.environment = environment;
    }

    info!(
        environment = ?config.environment,
        http_port = config.api.http_port,
        in_memory = cli.in_memory,
        realtime = !cli.no_realtime,
        local_realtime = cli.local_realtime,
        admin_tokens = config.admin.api_tokens.len(),
        "Configuration loaded"
    );

    let repo: Arc<dyn CampaignRepository> = if cli.in_memory {
        info!("Using seeded in-memory campaign store");
        Arc::new(InMemoryRepository::with_demo_data())
    } else {
        match PgCampaignRepository::connect(&config.database).await {
            Ok(repo) => Arc::new(repo),
            Err(e) => {
                error!(error = %e, "Failed to connect to PostgreSQL");
                return Err(e);
            }
        }
    };

    let counter = if cli.no_realtime {
        info!("Realtime counter disabled");
        Arc::new(ConnectionCounter::disabled())
    } else if cli.local_realtime {
        info!("Realtime counter kept in process");
        Arc::new(ConnectionCounter::in_process())
    } else {
        Arc::new(ConnectionCounter::connect(&config.redis).await)
    };

    let state = AppState::new(&config, repo, counter);
    let api_server = ApiServer::new(config, state);

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Campaign Serve is ready to serve traffic");

    // Blocks until shutdown
    api_server.start_http().await?;

    Ok(())
}
