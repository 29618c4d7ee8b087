//! # Call Context & Time
//!
//! Every contract operation receives a [`CallContext`]: the caller's address
//! and the host's current time, captured once when the call begins. All
//! window comparisons inside one call therefore see the same instant.
//!
//! The host reads time from a [`Clock`]. Production hosts use
//! [`SystemClock`]; tests drive a [`ManualClock`] forward explicitly.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use crate::address::Address;

/// Source of the host's current time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time via [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Creates a clock frozen at the given Unix timestamp (seconds).
    /// Out-of-range timestamps fall back to the Unix epoch.
    pub fn at_timestamp(secs: i64) -> Self {
        let start = Utc
            .timestamp_opt(secs, 0)
            .single()
            .unwrap_or_default();
        Self::new(start)
    }

    /// Jumps to `instant`. Moving backwards is allowed; tests sometimes need it.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }

    /// Moves forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Who is calling, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Address that initiated the call.
    pub caller: Address,
    /// Host time at the start of the call.
    pub now: DateTime<Utc>,
}

impl CallContext {
    /// A context at an explicit instant.
    pub fn at(caller: Address, now: DateTime<Utc>) -> Self {
        Self { caller, now }
    }

    /// A context stamped with the given clock's current time.
    pub fn from_clock(caller: Address, clock: &dyn Clock) -> Self {
        Self {
            caller,
            now: clock.now(),
        }
    }
}
