//! Wall-clock time source, injectable so duty checks and trigger delays can
//! be tested against a fixed instant.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync {
    /// Current local date-time in the care home's time zone.
    fn now(&self) -> NaiveDateTime;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use chrono_tz::US::Central;

    use super::*;

    #[test]
    fn test_fixed_clock_moves_only_when_told() {
        let start = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::minutes(45));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(45));

        clock.set(start);
        assert_eq!(Arc::new(clock).now(), start);
    }

    #[test]
    fn test_system_clock_reports_local_time_of_zone() {
        let clock = SystemClock::new(Central);
        let local = clock.now();
        let utc_now = Utc::now();
        let expected = Central.from_utc_datetime(&utc_now.naive_utc()).naive_local();

        assert!((expected - local).num_seconds().abs() < 5);
    }
}
