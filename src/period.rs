//! Reporting period arithmetic
//!
//! A period is a half-open `[start, end)` interval of whole UTC days. The
//! default is the calendar month before the run date.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportingPeriod {
    /// Build a custom period; `end` is exclusive and must be after `start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// The whole calendar month containing `year`/`month`
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = first_of_next_month(start)?;
        Some(Self { start, end })
    }

    /// The calendar month before the one containing `today`
    pub fn previous_month(today: NaiveDate) -> Self {
        let first_of_current = today.with_day(1).unwrap_or(today);
        let last_of_previous = first_of_current - Duration::days(1);
        Self {
            start: last_of_previous.with_day(1).unwrap_or(last_of_previous),
            end: first_of_current,
        }
    }

    /// Parse a `YYYY-MM` month argument
    pub fn parse_month(value: &str) -> Option<Self> {
        let (year, month) = value.trim().split_once('-')?;
        Self::month(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive end date
    pub fn end_date(&self) -> NaiveDate {
        self.end
    }

    pub fn start(&self) -> DateTime<Utc> {
        midnight_utc(self.start)
    }

    pub fn end(&self) -> DateTime<Utc> {
        midnight_utc(self.end)
    }

    /// Whether the period covers exactly one calendar month
    pub fn is_calendar_month(&self) -> bool {
        self.start.day() == 1 && first_of_next_month(self.start) == Some(self.end)
    }

    /// Period of the same shape immediately before this one
    pub fn previous(&self) -> Self {
        if self.is_calendar_month() {
            return Self::previous_month(self.start);
        }
        let length = self.end - self.start;
        Self {
            start: self.start - length,
            end: self.start,
        }
    }

    /// Human label, e.g. "March 2024" or "2024-03-01 to 2024-03-15"
    pub fn label(&self) -> String {
        if self.is_calendar_month() {
            self.start.format("%B %Y").to_string()
        } else {
            format!(
                "{} to {}",
                self.start.format("%Y-%m-%d"),
                self.last_day().format("%Y-%m-%d")
            )
        }
    }

    /// Filename-safe slug, e.g. "2024-03" or "2024-03-01_2024-03-15"
    pub fn slug(&self) -> String {
        if self.is_calendar_month() {
            self.start.format("%Y-%m").to_string()
        } else {
            format!(
                "{}_{}",
                self.start.format("%Y-%m-%d"),
                self.last_day().format("%Y-%m-%d")
            )
        }
    }

    fn last_day(&self) -> NaiveDate {
        self.end - Duration::days(1)
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
