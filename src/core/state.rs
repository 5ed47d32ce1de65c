//! Shared application state: per-symbol market data behind one lock.
//!
//! The `StateStore` is the single source of truth. The polling scheduler is
//! the only writer; every other component (alert engine, UI, diagnostics)
//! receives an owned copy via `snapshot()` and never writes back. Critical
//! sections are pure memory copies, no I/O is ever performed under the lock.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::SymbolConfig;
use crate::core::clock::TickMs;

/// Number of recent valid Binance prices kept per symbol.
pub const HISTORY_CAPACITY: usize = 24;

/// One exchange's price reading for one symbol. Overwritten wholesale on
/// every fetch attempt; `valid` is false after a failed fetch.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Quote {
    pub price: f64,
    pub valid: bool,
    pub last_update_ms: TickMs,
}

/// One funding-rate reading. Same overwrite semantics as `Quote`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FundingReading {
    pub rate: f64,
    pub valid: bool,
    pub last_update_ms: TickMs,
}

/// Fixed-capacity ring of recent valid Binance prices, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct PriceHistory {
    values: [f64; HISTORY_CAPACITY],
    head: usize,
    count: usize,
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self {
            values: [0.0; HISTORY_CAPACITY],
            head: 0,
            count: 0,
        }
    }
}

impl PriceHistory {
    pub fn push(&mut self, price: f64) {
        self.values[self.head] = price;
        self.head = (self.head + 1) % HISTORY_CAPACITY;
        if self.count < HISTORY_CAPACITY {
            self.count += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Entries in chronological order, oldest first.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.count);
        let start = (self.head + HISTORY_CAPACITY - self.count) % HISTORY_CAPACITY;
        for i in 0..self.count {
            out.push(self.values[(start + i) % HISTORY_CAPACITY]);
        }
        out
    }
}

/// Full market state for one tracked symbol.
///
/// Invariant: `spread_valid` is true iff both quotes were valid when the
/// spread was last computed. When it is false, `spread_abs`/`spread_pct`
/// hold stale values; consumers must check the flag.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolRecord {
    // Identity, immutable after configuration load
    pub display_name: String,
    pub binance_symbol: String,
    pub coinbase_product: String,

    pub binance_quote: Quote,
    pub coinbase_quote: Quote,
    pub funding: FundingReading,

    pub spread_abs: f64,
    pub spread_pct: f64,
    pub spread_valid: bool,

    /// Tick of the most recent successful fetch of any field; 0 = never.
    pub last_update_ms: TickMs,

    pub history: PriceHistory,
}

impl SymbolRecord {
    pub fn new(symbol: &SymbolConfig) -> Self {
        Self {
            display_name: symbol.display_name.clone(),
            binance_symbol: symbol.binance_symbol.clone(),
            coinbase_product: symbol.coinbase_product.clone(),
            binance_quote: Quote::default(),
            coinbase_quote: Quote::default(),
            funding: FundingReading::default(),
            spread_abs: 0.0,
            spread_pct: 0.0,
            spread_valid: false,
            last_update_ms: 0,
            history: PriceHistory::default(),
        }
    }
}

/// Root application state, copied out as one unit by `snapshot()`.
#[derive(Debug, Clone, Serialize)]
pub struct AppState {
    pub symbols: Vec<SymbolRecord>,
    pub selected_symbol: usize,
    pub data_stale: bool,
    pub wifi_connected: bool,
    pub wifi_rssi: i32,
    pub time_str: String,
}

impl AppState {
    fn new(symbols: &[SymbolConfig]) -> Self {
        Self {
            symbols: symbols.iter().map(SymbolRecord::new).collect(),
            selected_symbol: 0,
            data_stale: false,
            wifi_connected: false,
            wifi_rssi: 0,
            time_str: String::new(),
        }
    }
}

/// Handle to the shared state. Cheap to clone; all clones see one state.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<RwLock<AppState>>,
}

impl StateStore {
    pub fn new(symbols: &[SymbolConfig]) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AppState::new(symbols))),
        }
    }

    /// Owned copy of the entire state at one consistent instant.
    pub async fn snapshot(&self) -> AppState {
        self.inner.read().await.clone()
    }

    /// Install a new record for one symbol.
    ///
    /// The caller's record does not own two categories of data, which are
    /// preserved from the stored record: the immutable identity strings and
    /// the price-history ring. Everything else is replaced wholesale. A
    /// valid Binance quote from a new fetch (update tick differs from the
    /// stored one) is appended to the history; failures and writebacks of
    /// unchanged quotes leave the ring untouched.
    pub async fn update_symbol(&self, index: usize, mut record: SymbolRecord) {
        let mut state = self.inner.write().await;
        let Some(stored) = state.symbols.get_mut(index) else {
            warn!(index, "update_symbol: index out of range, dropping update");
            return;
        };

        record.display_name = stored.display_name.clone();
        record.binance_symbol = stored.binance_symbol.clone();
        record.coinbase_product = stored.coinbase_product.clone();
        record.history = stored.history.clone();

        let is_new_binance_price = record.binance_quote.valid
            && record.binance_quote.price > 0.0
            && record.binance_quote.last_update_ms != stored.binance_quote.last_update_ms;
        if is_new_binance_price {
            record.history.push(record.binance_quote.price);
        }

        *stored = record;
    }

    pub async fn get_selected(&self) -> usize {
        self.inner.read().await.selected_symbol
    }

    pub async fn set_selected(&self, index: usize) {
        let mut state = self.inner.write().await;
        if index < state.symbols.len() {
            debug!(index, symbol = %state.symbols[index].display_name, "selected symbol");
            state.selected_symbol = index;
        } else {
            warn!(index, "set_selected: index out of range, ignoring");
        }
    }

    pub async fn set_stale(&self, stale: bool) {
        self.inner.write().await.data_stale = stale;
    }

    pub async fn update_wifi(&self, connected: bool, rssi: i32) {
        let mut state = self.inner.write().await;
        state.wifi_connected = connected;
        state.wifi_rssi = rssi;
    }

    pub async fn set_time_str(&self, time_str: String) {
        self.inner.write().await.time_str = time_str;
    }
}
