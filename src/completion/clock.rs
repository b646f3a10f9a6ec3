//! Injectable wall clock
//!
//! Recency scores are a pure function of "now", so every component that
//! needs the time reads it through a [`Clock`]. Production code uses
//! [`SystemClock`]; tests freeze time with [`FixedClock`].

use parking_lot::Mutex;
use std::sync::Arc;

/// Source of the current time as fractional unix seconds
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> f64;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Manually driven clock
#[derive(Debug, Default)]
pub struct FixedClock {
    now: Mutex<f64>,
}

impl FixedClock {
    pub fn new(now: f64) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }

    pub fn advance_hours(&self, hours: f64) {
        *self.now.lock() += hours * 3600.0;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}
