//! Core domain logic: clock, spread math, backoff, shared state,
//! the polling scheduler, and the alert engine.

pub mod alerts;
pub mod backoff;
pub mod clock;
pub mod scheduler;
pub mod spread;
pub mod state;

pub use alerts::{alert_task, AlertEngine, AlertStatus};
pub use backoff::{Backoff, BackoffPolicy};
pub use scheduler::PollScheduler;
pub use spread::{compute_spread, Spread};
pub use state::{AppState, StateStore, SymbolRecord};
