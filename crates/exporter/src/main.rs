//! Validator dashboard rollup scheduler binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use valdash_core::config::AppConfig;
use valdash_exporter::{create_router, run_scheduler};
use valdash_rollup::RollupCoordinator;

/// Valdash - rolls per-epoch validator data into hourly, 24h and daily tables
#[derive(Parser, Debug)]
#[command(name = "valdash-exporter")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "VALDASH_CONFIG",
        default_value = "config/exporter.toml"
    )]
    config: String,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,
}

/// Load configuration from the optional file, overridden by `VALDASH_` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();

    if config_path.exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path,
            "No config file found, using defaults and environment variables"
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("VALDASH_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Valdash exporter v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    let clock = config.chain.clock().context("invalid chain timing")?;

    valdash_exporter::metrics::register_metrics();

    let store = valdash_store::from_config(&config.database)
        .await
        .context("failed to initialize rollup store")?;
    store
        .health_check()
        .await
        .context("rollup database health check failed")?;
    tracing::info!(backend = store.backend(), "Rollup store initialized");

    let coordinator = Arc::new(
        RollupCoordinator::from_config(store.clone(), clock, &config.rollup)
            .context("invalid rollup layout")?,
    );
    let layout = coordinator.partitions().layout();
    tracing::info!(
        hourly_width = layout.width(valdash_core::Granularity::Hourly),
        epochs_per_day = clock.epochs_per_day(),
        utc_offset = layout.utc_offset(),
        "Rollup layout configured"
    );

    if args.once {
        let report = valdash_exporter::run_tick(&coordinator).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(bind) = &config.scheduler.metrics_bind {
        let addr: SocketAddr = bind.parse().context("invalid metrics bind address")?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind to {}", addr))?;
        let app = create_router(store.clone());
        tracing::info!("Metrics listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Metrics server stopped");
            }
        });
    }

    run_scheduler(coordinator, config.scheduler.interval(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await;

    Ok(())
}
