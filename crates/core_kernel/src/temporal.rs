//! Calendar and clock types
//!
//! This module provides the date handling shared by invoicing and recurrence:
//! - `Timezone`: the shop's local timezone, used to turn calendar days into instants
//! - `CalendarMonth`: a validated (year, month) billing period
//! - `Clock`: an injectable source of "now" so schedule math is testable

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;
use thiserror::Error;

/// Timezone wrapper for shop jurisdictions
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::UnknownTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Converts a UTC datetime to the local calendar date
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        utc.with_timezone(&self.0).date_naive()
    }

    /// Gets the first instant of `date` in this timezone as UTC
    ///
    /// When local midnight falls in a DST gap the first existing local
    /// instant of that day is used.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        self.resolve(midnight)
            .or_else(|| self.resolve(midnight + Duration::hours(1)))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    }

    fn resolve(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        local
            .and_local_timezone(self.0)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

/// Errors related to calendar operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid calendar month {month}/{year}")]
    InvalidMonth {
        month: u32,
        year: i32,
    },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Number of days in the given month, or 0 for an invalid month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match next {
        Some(next) => (next - first).num_days() as u32,
        None => 31,
    }
}

/// A calendar month used as a billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarMonth {
    year: i32,
    month: u32,
}

impl CalendarMonth {
    /// Creates a calendar month, rejecting months outside 1..=12
    pub fn new(year: i32, month: u32) -> Result<Self, TemporalError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(TemporalError::InvalidMonth { month, year });
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, days_in_month(self.year, self.month))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Half-open UTC bounds `[start, end)` of this month in `tz`
    pub fn utc_bounds(&self, tz: &Timezone) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            tz.start_of_day(self.first_day()),
            tz.start_of_day(self.next().first_day()),
        )
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

/// Source of the current time
///
/// Every time-dependent operation reads the clock through this trait so
/// tests can pin "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Today's calendar date in `tz`
    fn today_in(&self, tz: &Timezone) -> NaiveDate {
        tz.local_date(self.now())
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// A clock pinned to noon UTC on `date`
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(Utc.from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN))))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(FixedClock::at_date(date).now());
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_in_february() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2100, 2), 28);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 13), 0);
    }

    #[test]
    fn test_calendar_month_bounds() {
        let march = CalendarMonth::new(2025, 3).unwrap();
        assert_eq!(march.first_day(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(march.last_day(), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
        assert_eq!(march.to_string(), "3/2025");
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert!(matches!(
            CalendarMonth::new(2025, 0),
            Err(TemporalError::InvalidMonth { month: 0, year: 2025 })
        ));
        assert!(CalendarMonth::new(2025, 13).is_err());
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let december = CalendarMonth::new(2024, 12).unwrap();
        assert_eq!(december.next(), CalendarMonth::new(2025, 1).unwrap());
    }

    #[test]
    fn test_utc_bounds_respect_timezone() {
        let tz: Timezone = "Asia/Dhaka".parse().unwrap();
        let (start, end) = CalendarMonth::new(2025, 3).unwrap().utc_bounds(&tz);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 2, 28, 18, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 31, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        clock.advance(Duration::days(15));
        assert_eq!(
            clock.today_in(&Timezone::default()),
            NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()
        );
    }
}
