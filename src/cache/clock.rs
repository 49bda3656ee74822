//! Time source for TTL arithmetic.

use chrono::Utc;

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
  fn now_ms(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_ms(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
  use super::Clock;
  use std::sync::atomic::{AtomicI64, Ordering};

  /// Clock that only moves when told to.
  #[derive(Debug, Default)]
  pub struct ManualClock {
    now: AtomicI64,
  }

  impl ManualClock {
    pub fn at(now_ms: i64) -> Self {
      Self {
        now: AtomicI64::new(now_ms),
      }
    }

    pub fn advance(&self, ms: i64) {
      self.now.fetch_add(ms, Ordering::SeqCst);
    }
  }

  impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
      self.now.load(Ordering::SeqCst)
    }
  }
}
