use anyhow::{Context, Result};
use commanddeck::api::{create_router, ApiAppState};
use commanddeck::config::{load_config, DeckConfig};
use commanddeck::demo::DemoProducer;
use commanddeck::state::run_indicator_sweeper;
use commanddeck::{AgentStore, ConnectionManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commanddeck=info".into()),
        )
        .init();

    let config = read_config()?;

    match std::env::args().nth(1).as_deref() {
        None | Some("watch") => run_watch(config).await,
        Some("demo") => run_demo(config).await,
        Some(other) => anyhow::bail!("Unknown mode '{}', expected 'watch' or 'demo'", other),
    }
}

/// Config from COMMANDDECK_CONFIG, or defaults when unset or missing
fn read_config() -> Result<DeckConfig> {
    let Ok(path) = std::env::var("COMMANDDECK_CONFIG") else {
        info!("COMMANDDECK_CONFIG not set, using defaults");
        return Ok(DeckConfig::default());
    };

    if !std::path::Path::new(&path).exists() {
        warn!(path = %path, "Config file not found, using defaults");
        return Ok(DeckConfig::default());
    }

    let config = load_config(&path)?;
    info!(path = %path, "Configuration loaded");
    Ok(config)
}

/// Connect, reduce events into the store, expire indicators, serve the API
async fn run_watch(config: DeckConfig) -> Result<()> {
    info!(url = %config.connection.url, "CommandDeck starting...");

    let store = Arc::new(AgentStore::new(config.indicators.ttl()));

    let (events_tx, events_rx) = mpsc::channel(config.connection.event_buffer.max(1));
    let reducer_handle = tokio::spawn(Arc::clone(&store).run_reducer(events_rx));

    let sweeper_handle = tokio::spawn(run_indicator_sweeper(
        Arc::clone(&store),
        config.indicators.sweep_interval(),
    ));

    let connection = Arc::new(ConnectionManager::new(config.connection.clone(), events_tx));
    connection.connect().await;

    let server_handle = if config.api.enabled {
        let state = Arc::new(ApiAppState {
            store: Arc::clone(&store),
            connection: Arc::clone(&connection),
        });
        let router = create_router(state, &config.api.allowed_origins);
        let listener = tokio::net::TcpListener::bind(config.api.listen_addr)
            .await
            .context("Failed to bind API listener")?;
        info!(addr = %config.api.listen_addr, "Renderer API listening");

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "API server error");
            }
        }))
    } else {
        None
    };

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    // Graceful shutdown
    connection.shutdown().await;
    if let Some(handle) = server_handle {
        handle.abort();
    }
    sweeper_handle.abort();
    reducer_handle.abort();
    info!("CommandDeck stopped");

    Ok(())
}

/// Send a spawn then periodic random moves through the event source
async fn run_demo(config: DeckConfig) -> Result<()> {
    // Inbound events are not reduced in demo mode; keep the channel drained
    let (events_tx, mut events_rx) = mpsc::channel(config.connection.event_buffer.max(1));
    let drain_handle = tokio::spawn(async move { while events_rx.recv().await.is_some() {} });

    let connection = Arc::new(ConnectionManager::new(config.connection.clone(), events_tx));
    connection.connect().await;

    let producer = DemoProducer::with_random_id(&mut rand::thread_rng());
    info!(
        agent_id = %producer.agent_id(),
        url = %config.connection.url,
        "Demo producer starting, press Ctrl+C to stop"
    );

    tokio::select! {
        _ = producer.run(Arc::clone(&connection), Duration::from_secs(2)) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl_c signal")?;
            info!("Demo producer stopped");
        }
    }

    connection.shutdown().await;
    drain_handle.abort();

    Ok(())
}
