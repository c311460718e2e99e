//! Time source for lock maturity and temporary freezes

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::types::LedgerError;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Move the clock forward. Only test and replay clocks support this.
    fn advance(&self, _by: Duration) -> Result<(), LedgerError> {
        Err(LedgerError::ClockNotAdjustable)
    }
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn advance(&self, by: Duration) -> Result<(), LedgerError> {
        let mut now = self.now.lock();
        *now = now
            .checked_add_signed(by)
            .ok_or_else(|| LedgerError::invalid_duration(by.num_seconds()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);

        clock.advance(Duration::hours(1)).unwrap();
        assert_eq!(clock.now(), start + Duration::hours(1));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_manual_clock_refuses_to_leave_calendar_range() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);

        assert_eq!(
            clock.advance(Duration::seconds(9_000_000_000_000)),
            Err(LedgerError::InvalidDuration {
                seconds: 9_000_000_000_000
            })
        );
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_system_clock_cannot_advance() {
        assert_eq!(
            SystemClock.advance(Duration::seconds(1)),
            Err(LedgerError::ClockNotAdjustable)
        );
    }
}
