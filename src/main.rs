//! Service entry point.
//!
//! Loads configuration, wires the subsystems together, and serves
//! until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use clickgate::admission::{AdmissionGate, RateLimiter};
use clickgate::config::{load_config, AppConfig};
use clickgate::dispatch::PostbackDispatcher;
use clickgate::geo::{GeoResolver, StaticGeoTable};
use clickgate::http::{AppState, HttpServer};
use clickgate::lifecycle::Shutdown;
use clickgate::observability::events::{EventSink, TracingSink};
use clickgate::observability::{logging, metrics};
use clickgate::products::ProductCatalog;
use clickgate::resilience::{BreakerRegistry, CircuitBreakerConfig};

#[derive(Debug, Parser)]
#[command(name = "clickgate", about = "Click-redirect and affiliate-tracking service")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init(&cfg.observability.log_level);
    if args.config.is_none() {
        tracing::info!("No config file given, running with defaults");
    }

    if cfg.observability.metrics_enabled {
        metrics::init_metrics(cfg.observability.metrics_address.parse()?);
    }

    let shutdown = Arc::new(Shutdown::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("SIGINT received, shutting down");
            signal_shutdown.trigger();
        }
    });

    let events: Arc<dyn EventSink> = Arc::new(TracingSink);

    let limiter = Arc::new(RateLimiter::new(
        cfg.admission.rate_limit.max,
        Duration::from_secs(cfg.admission.rate_limit.window_secs),
    ));
    let sweeper = limiter.spawn_sweeper(
        Duration::from_secs(cfg.admission.rate_limit.sweep_interval_secs),
        shutdown.subscribe(),
    );

    let geo: Option<Arc<dyn GeoResolver>> = if cfg.geo.entries.is_empty() {
        None
    } else {
        Some(Arc::new(StaticGeoTable::from_config(&cfg.geo.entries)))
    };

    let gate = Arc::new(AdmissionGate::new(
        cfg.admission.clone(),
        limiter,
        geo.clone(),
        events.clone(),
    ));

    let registry = Arc::new(BreakerRegistry::new(
        CircuitBreakerConfig {
            max_failures: cfg.breaker.max_failures,
            reset_timeout: Duration::from_secs(cfg.breaker.reset_timeout_secs),
        },
        events.clone(),
    ));
    let dispatcher = Arc::new(PostbackDispatcher::new(
        &cfg.postback,
        registry.clone(),
        events.clone(),
    )?);

    let catalog = Arc::new(ProductCatalog::new(cfg.products.clone()));
    if catalog.is_empty() {
        tracing::warn!("No products configured, clicks will get 404");
    }

    let state = AppState {
        gate,
        catalog,
        dispatcher,
        registry,
        geo,
        events,
    };

    let listener = TcpListener::bind(&cfg.listener.bind_address).await?;
    let server = HttpServer::new(
        state,
        Duration::from_secs(cfg.timeouts.request_secs),
        shutdown.clone(),
    );
    server.run(listener).await?;

    let _ = sweeper.await;
    tracing::info!("Shutdown complete");
    Ok(())
}
