use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShiftError {
    #[error("shift must end after it starts (start {start}, end {end})")]
    EndNotAfterStart {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// A contiguous interval of local wall-clock time. Immutable once built.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "ShiftRecord")]
pub struct Shift {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

#[derive(Deserialize)]
struct ShiftRecord {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TryFrom<ShiftRecord> for Shift {
    type Error = ShiftError;

    fn try_from(record: ShiftRecord) -> Result<Self, Self::Error> {
        Shift::new(record.start, record.end)
    }
}

impl Shift {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, ShiftError> {
        if end <= start {
            return Err(ShiftError::EndNotAfterStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// Convenience for a shift inside one day, e.g. `on(date, 8, 16)`.
    /// An `end_hour` of 24 ends at midnight of the following day.
    pub fn on(date: NaiveDate, start_hour: u32, end_hour: u32) -> Result<Self, ShiftError> {
        let start = date.and_time(NaiveTime::MIN) + chrono::Duration::hours(start_hour.into());
        let end = date.and_time(NaiveTime::MIN) + chrono::Duration::hours(end_hour.into());
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_minutes() as f64 / 60.
    }

    pub fn calendar_day(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn day_of_week(&self) -> Weekday {
        self.start.weekday()
    }

    /// Boundary-inclusive on both ends.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at <= self.end
    }

    /// True when the shift spans `from..=to` on its own start day.
    pub fn covers_window(&self, from: NaiveTime, to: NaiveTime) -> bool {
        let day = self.calendar_day();
        self.start <= day.and_time(from) && self.end >= day.and_time(to)
    }
}
