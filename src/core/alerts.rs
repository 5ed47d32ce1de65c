//! Alert engine: threshold evaluation over state snapshots.
//!
//! Runs on its own fast cadence, independent of the fetch cycles. Each
//! symbol carries two latched conditions (spread and funding) with a
//! per-condition cooldown; the beep fires once per cooldown window while
//! the latched flag tracks whether the condition currently holds. A global
//! staleness gate suppresses everything when data cannot be trusted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use crate::adapters::traits::AlertSink;
use crate::config::{AppConfig, SharedConfig};
use crate::core::clock::{age_ms, now_ms, TickMs};
use crate::core::state::{AppState, StateStore, SymbolRecord};

/// Evaluation cadence; much faster than any fetch interval so alerts
/// react within a fraction of a second of new data.
pub const ALERT_CHECK_INTERVAL_MS: u64 = 300;

// Beep patterns (on_ms, off_ms, count)
const SPREAD_BEEP: (u16, u16, u8) = (200, 100, 2);
const FUNDING_BEEP: (u16, u16, u8) = (300, 150, 3);

/// Per-symbol alert bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
struct CooldownState {
    last_spread_alert_ms: TickMs,
    last_funding_alert_ms: TickMs,
    spread_active: bool,
    funding_active: bool,
}

/// Shared read handle on the alert engine's output, for UI and diagnostics.
#[derive(Clone, Default)]
pub struct AlertStatus {
    active_count: Arc<AtomicUsize>,
}

impl AlertStatus {
    pub fn is_active(&self) -> bool {
        self.active_count() > 0
    }

    /// Number of symbols with at least one active alert condition.
    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    fn set(&self, count: usize) {
        self.active_count.store(count, Ordering::Relaxed);
    }
}

pub struct AlertEngine {
    cooldowns: Vec<CooldownState>,
    sink: Arc<dyn AlertSink>,
    status: AlertStatus,
}

impl AlertEngine {
    /// Cooldown timers start zeroed, so no alert can fire until one full
    /// cooldown window has elapsed after startup.
    pub fn new(num_symbols: usize, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            cooldowns: vec![CooldownState::default(); num_symbols],
            sink,
            status: AlertStatus::default(),
        }
    }

    pub fn status(&self) -> AlertStatus {
        self.status.clone()
    }

    /// Evaluate every symbol against the configured thresholds.
    ///
    /// When the snapshot is globally stale nothing is evaluated and the
    /// active count reads zero; latched conditions and cooldown timers are
    /// left as they are and resume once fresh data arrives.
    pub fn evaluate(&mut self, snapshot: &AppState, cfg: &AppConfig, now: TickMs) {
        if snapshot.data_stale {
            self.status.set(0);
            return;
        }

        let mut active = 0;
        for (record, cooldown) in snapshot.symbols.iter().zip(self.cooldowns.iter_mut()) {
            check_spread(record, cooldown, cfg, now, self.sink.as_ref());
            check_funding(record, cooldown, cfg, now, self.sink.as_ref());
            if cooldown.spread_active || cooldown.funding_active {
                active += 1;
            }
        }
        self.status.set(active);
    }
}

/// Cooldown check comes first: within the window the latched flag is held
/// as-is, whether or not the condition still holds. Outside the window a
/// breach beeps and restarts the cooldown; a non-breach clears the latch
/// without consuming it.
fn check_spread(
    record: &SymbolRecord,
    cooldown: &mut CooldownState,
    cfg: &AppConfig,
    now: TickMs,
    sink: &dyn AlertSink,
) {
    if age_ms(now, cooldown.last_spread_alert_ms) < cfg.alert_cooldown_ms {
        return;
    }

    if record.spread_valid && record.spread_pct.abs() > cfg.spread_alert_pct {
        info!(
            symbol = %record.display_name,
            spread_pct = record.spread_pct,
            threshold = cfg.spread_alert_pct,
            "[ALERT] spread threshold breached"
        );
        sink.beep(SPREAD_BEEP.0, SPREAD_BEEP.1, SPREAD_BEEP.2);
        cooldown.last_spread_alert_ms = now;
        cooldown.spread_active = true;
    } else if cooldown.spread_active {
        debug!(symbol = %record.display_name, "spread back below threshold");
        cooldown.spread_active = false;
    }
}

fn check_funding(
    record: &SymbolRecord,
    cooldown: &mut CooldownState,
    cfg: &AppConfig,
    now: TickMs,
    sink: &dyn AlertSink,
) {
    if age_ms(now, cooldown.last_funding_alert_ms) < cfg.alert_cooldown_ms {
        return;
    }

    if record.funding.valid && record.funding.rate.abs() > cfg.funding_alert_pct {
        info!(
            symbol = %record.display_name,
            funding_rate = record.funding.rate,
            threshold = cfg.funding_alert_pct,
            "[ALERT] funding rate threshold breached"
        );
        sink.beep(FUNDING_BEEP.0, FUNDING_BEEP.1, FUNDING_BEEP.2);
        cooldown.last_funding_alert_ms = now;
        cooldown.funding_active = true;
    } else if cooldown.funding_active {
        debug!(symbol = %record.display_name, "funding rate back below threshold");
        cooldown.funding_active = false;
    }
}

/// Run the alert loop until the shutdown signal arrives. Thresholds and
/// the cooldown window are re-read from the shared config every pass.
pub async fn alert_task(
    mut engine: AlertEngine,
    store: StateStore,
    config: SharedConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("alert task started");
    let mut check_interval = interval(Duration::from_millis(ALERT_CHECK_INTERVAL_MS));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("alert task shutting down");
                break;
            }
            _ = check_interval.tick() => {
                let snapshot = store.snapshot().await;
                let cfg = config.read().await.clone();
                engine.evaluate(&snapshot, &cfg, now_ms());
            }
        }
    }
}
