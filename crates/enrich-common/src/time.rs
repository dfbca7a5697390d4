//! Calendar-day ranges over UTC dates.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// An inclusive range of UTC calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DayRange {
    /// Returns `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Range covering the UTC dates of two timestamps.
    pub fn from_timestamps(first: DateTime<Utc>, last: DateTime<Utc>) -> Option<Self> {
        Self::new(first.date_naive(), last.date_naive())
    }

    /// Number of days in the range (inclusive).
    pub fn len_days(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Iterate the range one day at a time, oldest first.
    pub fn days(&self) -> Days {
        Days {
            next: Some(self.start),
            end: self.end,
        }
    }
}

impl IntoIterator for DayRange {
    type Item = NaiveDate;
    type IntoIter = Days;

    fn into_iter(self) -> Days {
        self.days()
    }
}

/// Forward iterator over the dates of a [`DayRange`].
#[derive(Debug, Clone)]
pub struct Days {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for Days {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        if current > self.end {
            self.next = None;
            return None;
        }
        self.next = current.succ_opt();
        Some(current)
    }
}

/// UTC instant at `hour:minute` on `date`.
pub fn at_hour(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&midnight)
        + Duration::hours(hour as i64)
        + Duration::minutes(minute as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_rejects_inverted() {
        assert!(DayRange::new(date(2024, 1, 2), date(2024, 1, 1)).is_none());
        assert!(DayRange::new(date(2024, 1, 1), date(2024, 1, 1)).is_some());
    }

    #[test]
    fn test_days_cross_month_and_leap_day() {
        let range = DayRange::new(date(2024, 2, 28), date(2024, 3, 1)).unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(days, vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]);
        assert_eq!(range.len_days(), 3);
    }

    #[test]
    fn test_from_timestamps_uses_utc_dates() {
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 23, 30, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 5, 3, 0, 15, 0).unwrap();
        let range = DayRange::from_timestamps(first, last).unwrap();
        assert_eq!(range.start, date(2024, 5, 1));
        assert_eq!(range.end, date(2024, 5, 3));
        assert!(range.contains(date(2024, 5, 2)));
    }

    #[test]
    fn test_at_hour() {
        let ts = at_hour(date(2024, 3, 20), 13, 30);
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 20, 13, 30, 0).unwrap());
    }
}
