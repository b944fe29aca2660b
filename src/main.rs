//! Free-events scraper service: binary entrypoint.
//! Loads config, wires sources into the orchestrator, runs it on a timer,
//! and serves health / metrics / status over HTTP until shut down.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use free_events_scraper::metrics::Metrics;
use free_events_scraper::scrape::scheduler::{spawn_scheduler, RunStatus, SchedulerCfg};
use free_events_scraper::scrape::sink::HttpIngestSink;
use free_events_scraper::scrape::sources::default_sources;
use free_events_scraper::{Orchestrator, RateLimiter, ScraperConfig};

/// `LOG_FORMAT=json` switches to JSON lines; filter via `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ScraperConfig::load().context("loading scraper config")?;
    info!(
        port = cfg.port,
        ingest_api_url = %cfg.ingest_api_url,
        interval_minutes = cfg.interval_minutes,
        max_concurrent = cfg.max_concurrent_scrapers,
        request_delay_ms = cfg.request_delay_ms,
        "configuration loaded"
    );

    let metrics = Metrics::init()?;

    let limiter = Arc::new(RateLimiter::new(cfg.request_delay(), cfg.rate_burst));
    let sink = Arc::new(HttpIngestSink::new(
        &cfg.ingest_api_url,
        &cfg.user_agent,
        std::time::Duration::from_secs(30),
    )?);
    let sources = default_sources(&cfg, Arc::clone(&limiter))?;
    let orchestrator = Arc::new(
        Orchestrator::new(sink, limiter, cfg.max_concurrent_scrapers).with_scrapers(sources),
    );
    info!(sources = ?orchestrator.scraper_names(), "scrapers registered");

    let shutdown = CancellationToken::new();
    let status = RunStatus::new(orchestrator.scraper_count());
    let scheduler = spawn_scheduler(
        Arc::clone(&orchestrator),
        SchedulerCfg {
            interval: cfg.interval(),
            run_timeout: cfg.run_timeout(),
        },
        status.clone(),
        shutdown.clone(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "http server listening");

    axum::serve(listener, metrics.router(status))
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("http server")?;

    shutdown.cancel();
    let _ = scheduler.await;
    info!("scraper service stopped");
    Ok(())
}
