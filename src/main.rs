//! ScrapeStream binary entrypoint.
//! Polls the configured sources and streams every newly published item to
//! all connected websocket subscribers.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scrapestream::broadcast::{self, SubscriberSet};
use scrapestream::dedup::DedupEngine;
use scrapestream::metrics::Metrics;
use scrapestream::store::StateStore;
use scrapestream::{api, poller, queue, sources};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scrapestream=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op where no file exists.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Configuration is the only startup-fatal error class.
    let cfg = sources::load_config_default().context("loading configuration")?;
    let descriptors = cfg.descriptors();
    tracing::info!(
        sources = descriptors.len(),
        bind = %cfg.server.bind,
        "scrapestream starting"
    );

    let metrics = Metrics::init()?;

    let store = Arc::new(StateStore::open(&cfg.state.path).context("opening state store")?);
    let dedup = Arc::new(DedupEngine::new(store));

    let (writer, rx) = queue::event_queue(&cfg.queue);
    let subscribers = Arc::new(SubscriberSet::new());

    // One task per source, one for the broadcaster; the ws server below
    // adds one per subscriber.
    let client = reqwest::Client::new();
    let _pollers = poller::spawn_pollers(descriptors, client, dedup, writer);

    let subs = subscribers.clone();
    tokio::spawn(async move { broadcast::run(rx, subs).await });

    let app = api::create_router(api::AppState { subscribers }).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving")?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM. New connections stop being accepted and the
/// process exits; in-flight sends are best-effort, and cursor writes are
/// transactional so nothing is half-flushed.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
