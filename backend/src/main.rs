use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use spreadwatch::{
    config::AppConfig,
    exchange::BinanceClient,
    logger::init_tracing,
    metrics::{Counters, MetricsExporter, SnapshotStore},
    poller::SpreadPoller,
};

/// Binds the scrape endpoint and serves it in the background.
async fn start_exporter(
    cfg: &AppConfig,
    snapshots: SnapshotStore,
    counters: Counters,
) -> anyhow::Result<()> {
    let addr = cfg.metrics_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics endpoint on {addr}"))?;

    let exporter = MetricsExporter::new(snapshots, counters);

    tokio::spawn(async move {
        if let Err(e) = exporter.serve(listener).await {
            tracing::error!(error = ?e, "metrics exporter stopped");
        }
    });

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting spreadwatch...");

    let cfg = AppConfig::from_env().context("invalid configuration")?;

    tracing::info!(
        exchange = %cfg.exchange_base_url,
        authenticated = cfg.credentials.api_key.is_some(),
        signing = cfg.credentials.is_configured(),
        book_depth = cfg.book_depth,
        http_port = cfg.http_port,
        "configuration loaded"
    );

    let client = BinanceClient::new(
        cfg.exchange_base_url.clone(),
        &cfg.credentials,
        cfg.book_depth,
    )
    .context("failed to build exchange client")?;

    let snapshots = SnapshotStore::new();
    let counters = Counters::default();

    start_exporter(&cfg, snapshots.clone(), counters.clone()).await?;

    let poller = SpreadPoller::new(Arc::new(client), cfg.poller_config(), snapshots, counters);
    tokio::spawn(poller.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}
