//! Process-wide replaceable clock
//!
//! Inlet handlers stamp every batch with [`now`]. Tests swap the clock with
//! [`set`] to get deterministic `_ts` tags.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

/// A source of "current time"
pub type ClockFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

static CLOCK: Lazy<RwLock<Option<ClockFn>>> = Lazy::new(|| RwLock::new(None));

/// The current time according to the installed clock (system time by default)
pub fn now() -> DateTime<Utc> {
    let guard = CLOCK.read().unwrap_or_else(PoisonError::into_inner);
    match guard.as_ref() {
        Some(clock) => clock(),
        None => Utc::now(),
    }
}

/// Replace the process-wide clock
pub fn set(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) {
    let mut guard = CLOCK.write().unwrap_or_else(PoisonError::into_inner);
    *guard = Some(Arc::new(clock));
}

/// Restore the system clock
pub fn reset() {
    let mut guard = CLOCK.write().unwrap_or_else(PoisonError::into_inner);
    *guard = None;
}
