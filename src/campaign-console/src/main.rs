//! Campaign Console — marketing admin backend for the finance app.
//!
//! Main entry point that wires the audience store, email sender and
//! campaign service together and starts the server.

use campaign_api::ApiServer;
use campaign_channels::sender_from_config;
use campaign_core::config::AppConfig;
use campaign_core::CampaignError;
use campaign_management::{CampaignService, CampaignStore};
use campaign_segmentation::{
    AudienceStore, InMemoryAudienceStore, PgAudienceStore, SegmentEvaluator,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-console")]
#[command(about = "Segment previews and email campaigns for the marketing admin console")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "CAMPAIGN_CONSOLE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CAMPAIGN_CONSOLE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// PostgreSQL URL for the audience store (overrides config)
    #[arg(long, env = "CAMPAIGN_CONSOLE__DATABASE__URL")]
    database_url: Option<String>,

    /// Use the seeded in-memory audience store even if a database is configured
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_console=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Campaign Console starting up");

    let mut config = AppConfig::load()?;

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(url) = cli.database_url {
        config.database.url = Some(url);
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        database = config.database.url.is_some() && !cli.in_memory,
        "Configuration loaded"
    );

    if config.admin.token.trim().is_empty() {
        error!("No admin token configured (CAMPAIGN_CONSOLE__ADMIN__TOKEN); management API will reject every request");
    }

    let audience = audience_store(&config, cli.in_memory).await?;
    let sender = sender_from_config(&config.email).map_err(|e| CampaignError::Email(e.to_string()))?;

    let service = Arc::new(CampaignService::new(
        Arc::new(CampaignStore::new()),
        SegmentEvaluator::new(audience),
        sender,
    ));

    let api_server = ApiServer::new(config.clone(), service);

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Campaign Console is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}

async fn audience_store(
    config: &AppConfig,
    in_memory: bool,
) -> Result<Arc<dyn AudienceStore>, CampaignError> {
    match config.database.url.as_deref() {
        Some(url) if !in_memory => {
            let store = PgAudienceStore::connect(url, &config.database)
                .await
                .map_err(|e| CampaignError::Database(e.to_string()))?;
            Ok(Arc::new(store))
        }
        _ => {
            warn!("No audience database in use, serving seeded demo users");
            Ok(Arc::new(InMemoryAudienceStore::with_demo_data()))
        }
    }
}
