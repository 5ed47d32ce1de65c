//! Spreadwatch entry point.
//!
//! Wires the exchange adapters, state store, polling scheduler and alert
//! engine together, then waits for Ctrl+C to shut everything down.

use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

use spreadwatch::adapters::traits::{AlwaysOnline, FundingFeed, LinkMonitor, LogBeeper, SpotFeed};
use spreadwatch::adapters::{BinanceAdapter, CoinbaseAdapter};
use spreadwatch::config::{self, logging};
use spreadwatch::core::{alert_task, AlertEngine, PollScheduler, StateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    logging::init_logging();

    info!("spreadwatch starting");

    // A broken config file falls back to defaults; monitoring must come up
    let config = config::load_or_default(Path::new("config.yaml"));
    for symbol in &config.symbols {
        info!(
            symbol = %symbol.display_name,
            binance = %symbol.binance_symbol,
            coinbase = %symbol.coinbase_product,
            "[CONFIG] tracking symbol"
        );
    }
    info!(
        symbols = config.symbols.len(),
        price_refresh_ms = config.price_refresh_ms,
        funding_refresh_ms = config.funding_refresh_ms,
        spread_alert_pct = config.spread_alert_pct,
        "[CONFIG] loaded"
    );

    let store = StateStore::new(&config.symbols);
    let num_symbols = config.symbols.len();
    let shared_config = config.into_shared();

    let binance = Arc::new(BinanceAdapter::new()?);
    let coinbase = Arc::new(CoinbaseAdapter::new()?);
    let link: Arc<dyn LinkMonitor> = Arc::new(AlwaysOnline);

    let scheduler = PollScheduler::new(
        store.clone(),
        shared_config.clone(),
        binance.clone() as Arc<dyn SpotFeed>,
        coinbase as Arc<dyn SpotFeed>,
        binance as Arc<dyn FundingFeed>,
        link,
    )
    .await;

    let engine = AlertEngine::new(num_symbols, Arc::new(LogBeeper));

    // Create shutdown broadcast channel
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));
    let alert_handle = tokio::spawn(alert_task(
        engine,
        store,
        shared_config,
        shutdown_tx.subscribe(),
    ));

    // Spawn SIGINT handler task
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("[SHUTDOWN] Graceful shutdown initiated");
                let _ = shutdown_signal.send(());
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C signal: {err}");
            }
        }
    });

    info!("monitoring started, press Ctrl+C to stop");

    tokio::select! {
        _ = shutdown_rx.recv() => {
            info!("[SHUTDOWN] Shutdown signal received in main task");
        }
    }

    let _ = scheduler_handle.await;
    let _ = alert_handle.await;

    info!("[SHUTDOWN] Clean exit");
    Ok(())
}
