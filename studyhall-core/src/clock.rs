/// Timezone-aware "now" source
///
/// Every component takes its notion of time from a [`Clock`] rather than
/// calling `Utc::now()` directly, so reminder windows, stacking arithmetic,
/// and calendar-day buckets can all be exercised in tests with a
/// [`ManualClock`] pinned to an exact instant.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use studyhall_core::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(
///     Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
///     "+05:00".parse().unwrap(),
/// );
/// clock.advance(chrono::Duration::hours(3));
/// assert_eq!(clock.now().format("%H:%M").to_string(), "15:00");
/// ```
use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::time;

/// Timezone-aware clock
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Configured deployment offset
    fn offset(&self) -> FixedOffset;

    /// Current calendar day in the configured offset
    fn today(&self) -> NaiveDate {
        time::local_day(self.now(), self.offset())
    }
}

/// Production clock backed by the system time
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Creates a system clock reporting days in the given offset
    pub fn new(offset: FixedOffset) -> Self {
        SystemClock { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Settable clock for tests and demos
///
/// Follows the same shipped-mock convention as the notifier: a first-class
/// implementation rather than test-only scaffolding, so integration tests in
/// other crates can drive it.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    /// Creates a manual clock pinned to `now`
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        ManualClock {
            now: Mutex::new(now),
            offset,
        }
    }

    /// Pins the clock to a new instant
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    /// Moves the clock forward (or backward, with a negative duration)
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}
