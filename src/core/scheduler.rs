//! Polling scheduler: the control loop that feeds the state store.
//!
//! One task drives two cadences (spot prices and funding rates) plus a
//! per-tick staleness evaluation. Every fetch is gated per symbol by an
//! exponential backoff controller; fetch failures are local events that
//! flip validity flags and grow the backoff, never fatal errors. The loop
//! runs until shutdown.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::adapters::traits::{FundingFeed, LinkMonitor, SpotFeed};
use crate::config::SharedConfig;
use crate::core::backoff::{Backoff, BackoffPolicy};
use crate::core::clock::{age_ms, now_ms, TickMs, IMPLAUSIBLE_AGE_MS};
use crate::core::spread::compute_spread;
use crate::core::state::{FundingReading, Quote, StateStore};

/// Scheduler tick interval; cadence checks and staleness run every tick.
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Interval between stability log lines.
const STABILITY_LOG_INTERVAL_MS: u32 = 60_000;

pub struct PollScheduler {
    store: StateStore,
    config: SharedConfig,
    binance: Arc<dyn SpotFeed>,
    coinbase: Arc<dyn SpotFeed>,
    funding: Arc<dyn FundingFeed>,
    link: Arc<dyn LinkMonitor>,
    price_backoff: Vec<Backoff>,
    funding_backoff: Vec<Backoff>,
    last_price_cycle_ms: TickMs,
    last_funding_cycle_ms: TickMs,
    last_stability_log_ms: TickMs,
    last_price_cycle_duration_ms: TickMs,
    last_funding_cycle_duration_ms: TickMs,
}

impl PollScheduler {
    /// Build a scheduler with one backoff controller per symbol per feed.
    /// The backoff arrays are sized once here; the symbol set is fixed for
    /// the process lifetime even though tunables may change at runtime.
    pub async fn new(
        store: StateStore,
        config: SharedConfig,
        binance: Arc<dyn SpotFeed>,
        coinbase: Arc<dyn SpotFeed>,
        funding: Arc<dyn FundingFeed>,
        link: Arc<dyn LinkMonitor>,
    ) -> Self {
        let num_symbols = config.read().await.symbols.len();
        let policy = BackoffPolicy::default();
        Self {
            store,
            config,
            binance,
            coinbase,
            funding,
            link,
            price_backoff: vec![Backoff::new(policy); num_symbols],
            funding_backoff: vec![Backoff::new(policy); num_symbols],
            last_price_cycle_ms: 0,
            last_funding_cycle_ms: 0,
            last_stability_log_ms: 0,
            last_price_cycle_duration_ms: 0,
            last_funding_cycle_duration_ms: 0,
        }
    }

    /// Fetch spot prices for every symbol whose backoff gate is open.
    /// Returns the number of symbols where both exchanges succeeded.
    pub async fn price_cycle(&mut self, now: TickMs) -> usize {
        let cycle_start = now_ms();
        let cfg = self.config.read().await.clone();
        let mut success_count = 0;

        for (i, symbol) in cfg.symbols.iter().enumerate() {
            let Some(backoff) = self.price_backoff.get_mut(i) else {
                break;
            };
            if !backoff.should_retry(now) {
                continue;
            }

            let snapshot = self.store.snapshot().await;
            let Some(mut record) = snapshot.symbols.get(i).cloned() else {
                break;
            };

            let (binance_result, coinbase_result) = tokio::join!(
                self.binance.fetch_spot(&symbol.binance_symbol),
                self.coinbase.fetch_spot(&symbol.coinbase_product),
            );

            let binance_ok = match binance_result {
                Ok(price) => {
                    record.binance_quote = Quote {
                        price,
                        valid: true,
                        last_update_ms: now,
                    };
                    true
                }
                Err(e) => {
                    // Keep the last price for display, only drop validity
                    record.binance_quote.valid = false;
                    debug!(symbol = %symbol.display_name, error = %e, "binance spot fetch failed");
                    false
                }
            };

            let coinbase_ok = match coinbase_result {
                Ok(price) => {
                    record.coinbase_quote = Quote {
                        price,
                        valid: true,
                        last_update_ms: now,
                    };
                    true
                }
                Err(e) => {
                    record.coinbase_quote.valid = false;
                    debug!(symbol = %symbol.display_name, error = %e, "coinbase spot fetch failed");
                    false
                }
            };

            if binance_ok && coinbase_ok {
                match compute_spread(record.binance_quote.price, record.coinbase_quote.price) {
                    Ok(spread) => {
                        record.spread_abs = spread.abs;
                        record.spread_pct = spread.pct;
                        record.spread_valid = true;
                    }
                    Err(e) => {
                        record.spread_valid = false;
                        warn!(symbol = %symbol.display_name, error = %e, "spread calculation rejected inputs");
                    }
                }
            } else {
                record.spread_valid = false;
            }

            if binance_ok || coinbase_ok {
                record.last_update_ms = now;
            }

            self.store.update_symbol(i, record).await;

            // Backoff succeeds only when both legs did; partial data is
            // stored and displayed but still counts as a failed attempt.
            let success = binance_ok && coinbase_ok;
            backoff.record_outcome(now, success);
            if success {
                success_count += 1;
            } else {
                warn!(
                    symbol = %symbol.display_name,
                    next_delay_ms = backoff.current_delay_ms(),
                    "price fetch failed, backing off"
                );
            }
        }

        self.last_price_cycle_duration_ms = age_ms(now_ms(), cycle_start);
        success_count
    }

    /// Fetch funding rates for every symbol whose backoff gate is open.
    /// Returns the number of successful fetches.
    pub async fn funding_cycle(&mut self, now: TickMs) -> usize {
        let cycle_start = now_ms();
        let cfg = self.config.read().await.clone();
        let mut success_count = 0;

        for (i, symbol) in cfg.symbols.iter().enumerate() {
            let Some(backoff) = self.funding_backoff.get_mut(i) else {
                break;
            };
            if !backoff.should_retry(now) {
                continue;
            }

            let snapshot = self.store.snapshot().await;
            let Some(mut record) = snapshot.symbols.get(i).cloned() else {
                break;
            };

            let success = match self.funding.fetch_funding(&symbol.binance_symbol).await {
                Ok(rate) => {
                    record.funding = FundingReading {
                        rate,
                        valid: true,
                        last_update_ms: now,
                    };
                    record.last_update_ms = now;
                    true
                }
                Err(e) => {
                    record.funding.valid = false;
                    debug!(symbol = %symbol.display_name, error = %e, "funding fetch failed");
                    false
                }
            };

            self.store.update_symbol(i, record).await;
            backoff.record_outcome(now, success);
            if success {
                success_count += 1;
            } else {
                warn!(
                    symbol = %symbol.display_name,
                    next_delay_ms = backoff.current_delay_ms(),
                    "funding fetch failed, backing off"
                );
            }
        }

        self.last_funding_cycle_duration_ms = age_ms(now_ms(), cycle_start);
        success_count
    }

    /// Re-derive the global staleness flag from per-symbol ages. Runs every
    /// tick; the scheduler is the sole writer of the flag, which stays set
    /// until a tick finds no stale symbol. Returns the evaluated value.
    pub async fn evaluate_staleness(&self, now: TickMs) -> bool {
        let stale_threshold = self.config.read().await.stale_ms;
        let snapshot = self.store.snapshot().await;

        let mut any_stale = false;
        for record in &snapshot.symbols {
            if record.last_update_ms == 0 {
                // Never updated
                any_stale = true;
                continue;
            }
            let age = age_ms(now, record.last_update_ms);
            if age > stale_threshold && age < IMPLAUSIBLE_AGE_MS {
                any_stale = true;
                debug!(symbol = %record.display_name, age_ms = age, "symbol data is stale");
            }
        }

        if any_stale != snapshot.data_stale {
            if any_stale {
                warn!("marking data as STALE");
            } else {
                info!("data fresh again");
            }
            self.store.set_stale(any_stale).await;
        }

        any_stale
    }

    /// One scheduler tick: refresh link/clock fields, run any cadence that
    /// is due (when the network is up), evaluate staleness.
    pub async fn tick(&mut self, now: TickMs) {
        let connected = self.link.is_connected();
        self.store
            .update_wifi(connected, self.link.signal_strength())
            .await;
        self.store
            .set_time_str(Local::now().format("%H:%M").to_string())
            .await;

        let (price_refresh_ms, funding_refresh_ms) = {
            let cfg = self.config.read().await;
            (cfg.price_refresh_ms, cfg.funding_refresh_ms)
        };

        if connected {
            if age_ms(now, self.last_price_cycle_ms) >= price_refresh_ms {
                self.last_price_cycle_ms = now;
                let successful = self.price_cycle(now).await;
                let total = self.price_backoff.len();
                info!(successful, total, "price fetch cycle complete");
            }

            if age_ms(now, self.last_funding_cycle_ms) >= funding_refresh_ms {
                self.last_funding_cycle_ms = now;
                let successful = self.funding_cycle(now).await;
                let total = self.funding_backoff.len();
                info!(successful, total, "funding fetch cycle complete");
            }
        } else {
            // Backoff timers keep elapsing while disconnected, so
            // reconnection does not stampede every symbol at once.
            debug!("network disconnected, skipping fetch cycles");
        }

        self.evaluate_staleness(now).await;

        if age_ms(now, self.last_stability_log_ms) >= STABILITY_LOG_INTERVAL_MS {
            self.last_stability_log_ms = now;
            info!(
                uptime_s = now / 1000,
                rssi = self.link.signal_strength(),
                last_price_cycle_ms = self.last_price_cycle_duration_ms,
                last_funding_cycle_ms = self.last_funding_cycle_duration_ms,
                "[STABILITY] scheduler health"
            );
        }
    }

    /// Run the scheduler loop until the shutdown signal arrives.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("scheduler task started");
        let mut tick_interval = interval(Duration::from_millis(TICK_INTERVAL_MS));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("scheduler task shutting down");
                    break;
                }
                _ = tick_interval.tick() => {
                    let now = now_ms();
                    self.tick(now).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::traits::mocks::{MockFunding, MockLink, MockSpot};
    use crate::config::{AppConfig, SymbolConfig};

    struct Harness {
        scheduler: PollScheduler,
        store: StateStore,
        binance: Arc<MockSpot>,
        coinbase: Arc<MockSpot>,
        funding: Arc<MockFunding>,
        link: Arc<MockLink>,
    }

    async fn harness(num_symbols: usize) -> Harness {
        let symbols: Vec<SymbolConfig> = (0..num_symbols)
            .map(|i| SymbolConfig {
                display_name: format!("SYM{i}/USDT"),
                binance_symbol: format!("SYM{i}USDT"),
                coinbase_product: format!("SYM{i}-USD"),
            })
            .collect();
        let config = AppConfig {
            symbols: symbols.clone(),
            ..AppConfig::default()
        };

        let store = StateStore::new(&symbols);
        let binance = Arc::new(MockSpot::new("binance", Some(100.0)));
        let coinbase = Arc::new(MockSpot::new("coinbase", Some(102.0)));
        let funding = Arc::new(MockFunding::new(Some(0.0001)));
        let link = Arc::new(MockLink::new(true));

        let scheduler = PollScheduler::new(
            store.clone(),
            config.into_shared(),
            binance.clone(),
            coinbase.clone(),
            funding.clone(),
            link.clone(),
        )
        .await;

        Harness {
            scheduler,
            store,
            binance,
            coinbase,
            funding,
            link,
        }
    }

    #[tokio::test]
    async fn test_price_cycle_full_success() {
        let mut h = harness(1).await;

        let successful = h.scheduler.price_cycle(10_000).await;
        assert_eq!(successful, 1);

        let record = &h.store.snapshot().await.symbols[0];
        assert!(record.binance_quote.valid);
        assert!(record.coinbase_quote.valid);
        assert!(record.spread_valid);
        assert!((record.spread_abs - 2.0).abs() < 1e-12);
        assert!((record.spread_pct - 1.9801980198).abs() < 1e-6);
        assert_eq!(record.last_update_ms, 10_000);
        assert_eq!(record.history.to_vec(), vec![100.0]);
    }

    #[tokio::test]
    async fn test_price_cycle_partial_success_stores_data_but_backs_off() {
        let mut h = harness(1).await;
        h.coinbase.set_price(None);

        let successful = h.scheduler.price_cycle(10_000).await;
        assert_eq!(successful, 0);

        let record = &h.store.snapshot().await.symbols[0];
        // Partial data is stored and displayed
        assert!(record.binance_quote.valid);
        assert!(!record.coinbase_quote.valid);
        assert!(!record.spread_valid);
        assert_eq!(record.last_update_ms, 10_000);
        // History still records the successful binance leg
        assert_eq!(record.history.to_vec(), vec![100.0]);

        // AND semantics: half-success still grows the price backoff,
        // gating both legs together
        assert!(!h.scheduler.price_backoff[0].should_retry(10_500));
        assert!(h.scheduler.price_backoff[0].should_retry(11_500));
    }

    #[tokio::test]
    async fn test_price_cycle_total_failure_keeps_last_update_at_never() {
        let mut h = harness(1).await;
        h.binance.set_price(None);
        h.coinbase.set_price(None);

        let successful = h.scheduler.price_cycle(10_000).await;
        assert_eq!(successful, 0);

        let record = &h.store.snapshot().await.symbols[0];
        assert!(!record.binance_quote.valid);
        assert!(!record.coinbase_quote.valid);
        assert!(!record.spread_valid);
        assert_eq!(record.last_update_ms, 0);
        assert!(record.history.is_empty());
    }

    #[tokio::test]
    async fn test_backoff_gates_next_attempt_after_failure() {
        let mut h = harness(1).await;
        h.binance.set_price(None);
        h.coinbase.set_price(None);

        h.scheduler.price_cycle(10_000).await;
        let calls_after_first = h.binance.call_count();
        assert_eq!(calls_after_first, 1);

        // Within the grown delay: no new attempt
        h.scheduler.price_cycle(10_800).await;
        assert_eq!(h.binance.call_count(), calls_after_first);

        // After the delay elapses the symbol retries
        h.scheduler.price_cycle(12_000).await;
        assert_eq!(h.binance.call_count(), calls_after_first + 1);
    }

    #[tokio::test]
    async fn test_success_after_failure_resets_backoff() {
        let mut h = harness(1).await;
        h.binance.set_price(None);
        h.scheduler.price_cycle(10_000).await;
        assert_eq!(h.scheduler.price_backoff[0].current_delay_ms(), 1500);

        h.binance.set_price(Some(100.0));
        h.scheduler.price_cycle(12_000).await;
        assert_eq!(h.scheduler.price_backoff[0].current_delay_ms(), 1000);
    }

    #[tokio::test]
    async fn test_funding_cycle_success_and_failure() {
        let mut h = harness(1).await;

        let successful = h.scheduler.funding_cycle(10_000).await;
        assert_eq!(successful, 1);
        let record = &h.store.snapshot().await.symbols[0];
        assert!(record.funding.valid);
        assert!((record.funding.rate - 0.0001).abs() < 1e-12);
        assert_eq!(record.last_update_ms, 10_000);

        h.funding.set_rate(None);
        let successful = h.scheduler.funding_cycle(80_000).await;
        assert_eq!(successful, 0);
        let record = &h.store.snapshot().await.symbols[0];
        assert!(!record.funding.valid);
        // Failure does not advance the symbol's freshness timestamp
        assert_eq!(record.last_update_ms, 10_000);
    }

    #[tokio::test]
    async fn test_funding_backoff_independent_from_price_backoff() {
        let mut h = harness(1).await;
        h.funding.set_rate(None);

        h.scheduler.funding_cycle(10_000).await;
        assert_eq!(h.scheduler.funding_backoff[0].current_delay_ms(), 1500);
        assert_eq!(h.scheduler.price_backoff[0].current_delay_ms(), 1000);

        // Price cycle still runs while funding is backing off
        let successful = h.scheduler.price_cycle(10_000).await;
        assert_eq!(successful, 1);
    }

    #[tokio::test]
    async fn test_staleness_never_updated_symbols_are_stale() {
        let h = harness(2).await;
        assert!(h.scheduler.evaluate_staleness(5000).await);
        assert!(h.store.snapshot().await.data_stale);
    }

    #[tokio::test]
    async fn test_staleness_set_then_cleared_by_fresh_data() {
        let mut h = harness(1).await;

        h.scheduler.price_cycle(10_000).await;
        assert!(!h.scheduler.evaluate_staleness(12_000).await);
        assert!(!h.store.snapshot().await.data_stale);

        // Age past the 15s threshold
        assert!(h.scheduler.evaluate_staleness(26_000).await);
        assert!(h.store.snapshot().await.data_stale);

        // Fresh fetch clears the flag on the next evaluation
        h.scheduler.price_cycle(27_000).await;
        assert!(!h.scheduler.evaluate_staleness(27_500).await);
        assert!(!h.store.snapshot().await.data_stale);
    }

    #[tokio::test]
    async fn test_staleness_one_stale_symbol_marks_global_flag() {
        let mut h = harness(2).await;

        h.scheduler.price_cycle(10_000).await;
        // Symbol 1 goes silent: only symbol 0 refreshes later
        h.binance.set_price(Some(100.0));
        h.scheduler.price_backoff[1].record_outcome(40_000, false);
        h.scheduler.price_cycle(40_000).await;

        // Symbol 0 fresh at 40s, symbol 1 last updated at 10s
        assert!(h.scheduler.evaluate_staleness(41_000).await);
        assert!(h.store.snapshot().await.data_stale);
    }

    #[tokio::test]
    async fn test_staleness_ignores_implausible_wrapped_age() {
        let mut h = harness(1).await;
        h.scheduler.price_cycle(10_000).await;

        // `now` appears to be behind the last update (wrapped subtraction
        // yields a huge age); must not be treated as stale
        assert!(!h.scheduler.evaluate_staleness(9_000).await);
        assert!(!h.store.snapshot().await.data_stale);
    }

    #[tokio::test]
    async fn test_tick_skips_fetches_while_disconnected() {
        let mut h = harness(1).await;
        h.link.set_connected(false);

        h.scheduler.tick(10_000).await;
        assert_eq!(h.binance.call_count(), 0);
        assert_eq!(h.funding.call_count(), 0);

        let snapshot = h.store.snapshot().await;
        assert!(!snapshot.wifi_connected);

        // Reconnect: the next due tick fetches again
        h.link.set_connected(true);
        h.scheduler.tick(20_000).await;
        assert!(h.binance.call_count() > 0);
        assert!(h.store.snapshot().await.wifi_connected);
    }

    #[tokio::test]
    async fn test_tick_respects_configured_intervals() {
        let mut h = harness(1).await;

        h.scheduler.tick(10_000).await;
        let calls = h.binance.call_count();
        assert_eq!(calls, 1);

        // 2s later: price interval (5s) not yet due
        h.scheduler.tick(12_000).await;
        assert_eq!(h.binance.call_count(), calls);

        h.scheduler.tick(15_000).await;
        assert_eq!(h.binance.call_count(), calls + 1);
    }

    #[tokio::test]
    async fn test_runtime_interval_change_applies_next_cycle() {
        let mut h = harness(1).await;
        let config = h.scheduler.config.clone();

        h.scheduler.tick(10_000).await;
        config.write().await.price_refresh_ms = 60_000;

        // Would have been due under the old 5s interval
        h.scheduler.tick(16_000).await;
        assert_eq!(h.binance.call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_shuts_down_on_signal() {
        let h = harness(1).await;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(h.scheduler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "scheduler task should shut down cleanly");
    }
}
