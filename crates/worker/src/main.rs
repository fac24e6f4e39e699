use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assetforge_events::EventBus;
use assetforge_pipeline::{MemoryStore, PipelineRequest, PipelineRunner};
use assetforge_tripo::TripoApi;
use assetforge_worker::{run_batch, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assetforge_worker=debug,assetforge_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;
    tracing::info!(api_url = %config.api_url, "Loaded worker configuration");

    let path = std::env::args()
        .nth(1)
        .context("usage: assetforge-worker <requests.json>")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let requests: Vec<PipelineRequest> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
    tracing::info!(count = requests.len(), "Loaded pipeline requests");

    let bus = Arc::new(EventBus::default());
    let runner = Arc::new(
        PipelineRunner::new(
            Arc::new(TripoApi::new(&config.api_url)),
            Arc::new(MemoryStore::new()),
            Arc::clone(&bus),
            config.api_key.clone(),
        )
        .with_poll_options(config.poll_options.clone()),
    );

    // Log pipeline events as they happen.
    let mut events = bus.subscribe();
    let event_logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(asset_id = %event.asset_id(), event = ?event, "Pipeline event");
        }
    });

    // Ctrl-C cancels in-flight pipelines; completed stages stay
    // persisted.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, cancelling in-flight pipelines");
            signal_cancel.cancel();
        }
    });

    let outcomes = run_batch(runner, requests, cancel).await;

    let mut failures = 0usize;
    for (asset_id, result) in &outcomes {
        match result {
            Ok(view) => println!("{}", serde_json::to_string(view)?),
            Err(error) => {
                failures += 1;
                tracing::error!(asset_id = %asset_id, error = %error, "Pipeline failed");
            }
        }
    }
    event_logger.abort();

    tracing::info!(
        total = outcomes.len(),
        failures,
        "Worker finished"
    );
    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
