//! Warble Pipeline Server - Write-Behind Persistence Worker
//!
//! This is the main entry point for the pipeline worker process. It owns
//! the job queues and applies deferred mutations to the RocksDB store,
//! fanning follow and comment notifications out to the realtime channel
//! and the mail provider.
//!
//! Configuration is read from the environment:
//! - `DATA_DIR` - RocksDB directory (default `/data`)
//! - `MAIL_API_URL` - mail provider endpoint; unset disables email
//! - `MAIL_API_KEY` - bearer token for the mail provider
//! - `MAIL_SENDER` - sender address for outbound email
//! - `WORKER_CONCURRENCY` - handler invocations per job binding
//! - `HANDLER_TIMEOUT_SECONDS` - per-invocation handler timeout
//! - `RUST_LOG` - tracing filter (default `info,warble=debug`)

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warble_delivery::{
    Broadcaster, ChannelBroadcaster, HttpMailDispatcher, MailConfig, MailDispatcher,
    NoopMailDispatcher,
};
use warble_services::{Pipeline, PipelineConfig};
use warble_store::{MemoryUserCache, RocksStore, UserCache};

/// Builds the mail dispatcher from the environment. Without a provider
/// URL every email job degrades to a logged no-op.
fn mail_dispatcher() -> Arc<dyn MailDispatcher> {
    match std::env::var("MAIL_API_URL") {
        Ok(api_url) => {
            let defaults = MailConfig::default();
            let config = MailConfig {
                api_url,
                api_key: std::env::var("MAIL_API_KEY").unwrap_or_default(),
                sender: std::env::var("MAIL_SENDER").unwrap_or(defaults.sender),
                request_timeout_seconds: defaults.request_timeout_seconds,
            };
            tracing::info!(api_url = %config.api_url, sender = %config.sender, "Mail provider configured");
            Arc::new(HttpMailDispatcher::new(config))
        }
        Err(_) => {
            tracing::warn!("MAIL_API_URL not set; outbound email disabled");
            Arc::new(NoopMailDispatcher::new())
        }
    }
}

/// Logs realtime events until the channel closes. Stands in for the
/// socket layer, which is out of scope for this process.
async fn log_realtime_events(hub: Arc<ChannelBroadcaster>) {
    let mut events = hub.subscribe();
    loop {
        match events.recv().await {
            Ok(event) => {
                tracing::debug!(
                    event = %event.name,
                    recipient = %event.recipient,
                    "Realtime event"
                );
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Realtime event logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warble=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Warble Pipeline Server");

    // Load configuration from environment
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data".to_string());
    let mut config = PipelineConfig::default();
    if let Ok(raw) = std::env::var("WORKER_CONCURRENCY") {
        config.worker_concurrency = raw.parse()?;
    }
    if let Ok(raw) = std::env::var("HANDLER_TIMEOUT_SECONDS") {
        config.queue.handler_timeout_seconds = raw.parse()?;
    }

    // Initialize store
    let store = Arc::new(RocksStore::open(&data_dir)?);
    tracing::info!(data_dir = %data_dir, "Initialized RocksDB store");

    // Recipient lookups fall back to the store on every miss, so an
    // empty process-local cache is a correct starting state.
    let cache: Arc<dyn UserCache> = Arc::new(MemoryUserCache::new());

    let hub = Arc::new(ChannelBroadcaster::new());
    tokio::spawn(log_realtime_events(Arc::clone(&hub)));
    let broadcaster: Arc<dyn Broadcaster> = hub;

    let mail = mail_dispatcher();

    let pipeline = Pipeline::new(store, cache, broadcaster, mail, &config)?;
    tracing::info!(
        worker_concurrency = config.worker_concurrency,
        handler_timeout_seconds = config.queue.handler_timeout_seconds,
        "Pipeline running"
    );

    // Run until interrupted, then drain in-flight work before closing.
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received; draining queues");
    pipeline.await_idle().await;
    pipeline.shutdown();

    for (queue, metrics) in pipeline.metrics() {
        tracing::info!(
            queue = %queue,
            enqueued = metrics.enqueued,
            completed = metrics.completed,
            failed = metrics.failed,
            "Queue drained"
        );
    }

    Ok(())
}
