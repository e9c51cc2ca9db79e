//! Time source for timestamps and calendar-day arithmetic

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Offset, Utc};

/// Clock used by the stores
///
/// `Default` reads the system time and splits days in the machine's local
/// zone. `Fixed` carries its own offset, so calendar-day behavior does not
/// depend on where the tests run.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed { at: DateTime<Utc>, offset: FixedOffset },
}

impl Clock {
    /// A clock frozen at the given instant, with days split at UTC midnight
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::fixed_in(at, Utc.fix())
    }

    /// A clock frozen at the given instant, with days split in `offset`
    pub fn fixed_in(at: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self::Fixed { at, offset }
    }

    /// Current instant
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed { at, .. } => *at,
        }
    }

    /// Calendar date of `at` in this clock's zone
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            Clock::Default => calendar_day(at),
            Clock::Fixed { offset, .. } => at.with_timezone(offset).date_naive(),
        }
    }

    /// Today's calendar date in this clock's zone
    pub fn today(&self) -> NaiveDate {
        self.day_of(self.now())
    }

    /// Move a fixed clock forward. No effect on the system clock.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed { at, .. } = self {
            *at += delta;
        }
    }
}

/// Local calendar date of a timestamp
pub fn calendar_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}
