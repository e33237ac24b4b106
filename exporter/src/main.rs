//! OpenSearch Prometheus exporter
//!
//! Serves the cluster's statistics in the Prometheus text format on
//! `/_prometheus/metrics`; each scrape queries the cluster afresh.

use anyhow::{Context, Result};
use clap::Parser;
use osprom_exporter::{
    client::{ClusterClient, RestClusterClient},
    config::{ExporterConfig, LogFormat},
    handler::ScrapeHandler,
    server,
    settings::SettingsStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "osprom-exporter")]
#[command(about = "Prometheus exporter for OpenSearch cluster statistics", long_about = None)]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "OSPROM_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides the configuration)
    #[arg(long)]
    listen_addr: Option<String>,

    /// Cluster REST endpoint (overrides the configuration)
    #[arg(long)]
    cluster_url: Option<String>,
}

fn load_config(args: &Args) -> Result<ExporterConfig> {
    let mut config = ExporterConfig::load(args.config.as_deref()).context("Invalid configuration")?;
    if let Some(addr) = &args.listen_addr {
        config.listen_addr = addr.clone();
    }
    if let Some(url) = &args.cluster_url {
        config.cluster_url = url.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(config.log_format);

    let mut client = RestClusterClient::new(&config.cluster_url).context("Invalid cluster URL")?;
    if let Some((username, password)) = config.basic_auth() {
        client = client.with_basic_auth(username, password);
    }
    let client: Arc<dyn ClusterClient> = Arc::new(client);

    let settings = Arc::new(SettingsStore::new(config.prometheus.clone()));
    settings.subscribe(|updated| info!(settings = ?updated, "Exporter settings updated"));

    let handler = Arc::new(ScrapeHandler::new(
        client,
        settings,
        config.metric_prefix.clone(),
        config.scrape_timeout(),
    ));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal.cancel();
    });

    let addr = config.socket_addr().context("Invalid listen address")?;
    info!(
        "Starting exporter on {} for cluster {}",
        addr, config.cluster_url
    );
    server::serve(addr, handler, shutdown)
        .await
        .context("HTTP server error")?;

    info!("Exporter stopped");
    Ok(())
}
