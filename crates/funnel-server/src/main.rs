use anyhow::{Context, Result};
use clap::Parser;
use funnel_core::{Config, Funnel};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "mock-funnel")]
#[command(about = "Mock backend lines with tunable latency, errors, timeouts and night blocks")]
struct Args {
    /// Path to configuration file (built-in lines when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// Fixed RNG seed (overrides config)
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            info!("No config file given, using built-in lines");
            Config::default()
        }
    };

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(seed) = args.seed {
        config.rng.seed = Some(seed);
    }

    for (id, profile) in &config.lines {
        info!(
            "Line {}: enabled={} base={}ms jitter={}ms error_rate={} timeout_rate={} timeout={}ms night_block={} ({}-{})",
            id,
            profile.enabled,
            profile.base_latency_ms,
            profile.jitter_ms,
            profile.error_rate,
            profile.timeout_rate,
            profile.timeout_ms,
            profile.night_block_enabled,
            profile.night_block_window.start,
            profile.night_block_window.end,
        );
    }
    info!(
        "Metrics: ring_capacity={} window_secs={}",
        config.metrics.ring_capacity, config.metrics.window_secs
    );

    let funnel = Arc::new(Funnel::from_config(&config).context("Invalid configuration")?);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    funnel_server::serve(listener, funnel, shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
