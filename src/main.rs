//! Perpetuals Order Client - Entry Point
//!
//! Initializes configuration, logging, chain and data connections,
//! and the price reconciler. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Connect signing provider (WALLET_PRIVATE_KEY) + contract bindings
//! 4. Create data client, ticker source and oracle stream
//! 5. Spawn metrics (/metrics) and health (/live + /ready) servers
//! 6. Spawn price reconciler (oracle push + ticker poll)
//! 7. Load market metadata, then request the oracle connection
//! 8. Spawn periodic user order refresh
//! 9. Wait for SIGINT → graceful shutdown
//!
//! This binary is headless. A front end attaches by holding the
//! `Arc<OrderService>` built in step 8 (submit, cancel, self-execute,
//! draft edits) and calling `notifier.subscribe()` for the toast,
//! page-title and order-list `UiEvent`s. Until one subscribes those
//! events are dropped.

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use perp_order_client::adapters::api::{DataClient, RestTickerSource};
use perp_order_client::adapters::chain::{ChainProvider, OrderContracts};
use perp_order_client::adapters::feeds::PythOracleStream;
use perp_order_client::adapters::metrics::{HealthServer, MetricsRegistry};
use perp_order_client::adapters::ui::BroadcastNotifier;
use perp_order_client::config;
use perp_order_client::domain::price::TickerKind;
use perp_order_client::usecases::{
    AppState, OrderService, PriceReconciler, ReconcilerCommand,
};

/// Config path override.
const CONFIG_ENV: &str = "PERP_CLIENT_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        markets = config.markets.len(),
        assets = config.assets.len(),
        "Starting perpetuals order client"
    );

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 3. Chain provider + contracts ───────────────────────
    let provider = Arc::new(
        ChainProvider::from_env(&config.chain)
            .await
            .context("Failed to connect chain provider")?,
    );
    let contracts = Arc::new(
        OrderContracts::new(
            Arc::clone(&provider),
            config::loader::contract_addresses(&config)?,
        )
        .await
        .context("Failed to bind exchange contracts")?,
    );

    // ── 4. Data client, tickers, oracle ─────────────────────
    let data_client = Arc::new(
        DataClient::new(config::loader::data_client_config(&config))
            .context("Failed to create data client")?,
    );
    let mut ticker_source = RestTickerSource::new(data_client);
    if let Some((url, token)) = config::loader::cap_subgraph(&config)? {
        ticker_source = ticker_source.with_cap_subgraph(url, token);
    }
    let tickers = Arc::new(ticker_source);
    let oracle = Arc::new(
        PythOracleStream::new(config.oracle.ws_url.clone())
            .with_reconnect_delay(Duration::from_millis(config.oracle.reconnect_delay_ms)),
    );

    let state = Arc::new(AppState::default());
    let notifier = Arc::new(BroadcastNotifier::default());

    // ── 5. Metrics + health servers ─────────────────────────
    let metrics = if config.metrics.enabled {
        let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
        let server = Arc::clone(&metrics);
        let bind = config.metrics.bind_address.clone();
        let rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server.serve(bind, rx).await {
                error!(error = %e, "Metrics server failed");
            }
        });
        Some(metrics)
    } else {
        None
    };

    let health = HealthServer::new(Arc::clone(&state), config.metrics.health_port);
    let health_rx = shutdown_tx.subscribe();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health.run(health_rx).await {
            error!(error = %e, "Health server failed");
        }
    });

    // ── 6. Price reconciler ─────────────────────────────────
    let mut reconciler = PriceReconciler::new(
        tickers,
        oracle,
        Arc::clone(&notifier),
        Arc::clone(&state),
        config::loader::reconciler_config(&config),
    );
    if let Some(m) = &metrics {
        reconciler = reconciler.with_metrics(Arc::clone(m));
    }

    let (command_tx, command_rx) = mpsc::channel(16);
    let reconciler_rx = shutdown_tx.subscribe();
    let reconciler_handle = tokio::spawn(async move {
        if let Err(e) = reconciler.run(command_rx, reconciler_rx).await {
            error!(error = %e, "Price reconciler failed");
        }
    });

    // ── 7. Market metadata, then oracle connection ──────────
    state
        .set_catalog(config::loader::build_catalog(&config)?)
        .await;
    send_command(&command_tx, ReconcilerCommand::Connect).await;
    if let Some(kind) = &config.data.ohlc_kind {
        send_command(&command_tx, ReconcilerCommand::RefreshTickers(TickerKind::Other(kind.clone()))).await;
    }

    // ── 8. Order service + periodic user order refresh ──────
    let mut service = OrderService::new(
        Arc::clone(&contracts),
        contracts,
        Arc::clone(&notifier),
        Arc::clone(&state),
    )
    .with_account(provider.account());
    if let Some(m) = &metrics {
        service = service.with_metrics(Arc::clone(m));
    }
    let service = Arc::new(service);

    let refresh_rx = shutdown_tx.subscribe();
    let refresh_handle = tokio::spawn(refresh_orders(
        Arc::clone(&service),
        Duration::from_secs(config.app.orders_refresh_seconds.max(1)),
        refresh_rx,
    ));

    info!("All tasks spawned, client is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());

    for (name, handle) in [
        ("reconciler", reconciler_handle),
        ("orders", refresh_handle),
        ("health", health_handle),
    ] {
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            warn!(task = name, "Task did not stop within 5s");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn send_command(tx: &mpsc::Sender<ReconcilerCommand>, command: ReconcilerCommand) {
    if tx.send(command).await.is_err() {
        warn!("Price reconciler is not running");
    }
}

/// Reload the wallet's open orders until shutdown.
async fn refresh_orders(
    service: Arc<OrderService<OrderContracts, OrderContracts, BroadcastNotifier>>,
    every: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                service.refresh_user_orders().await;
            }
        }
    }
}
