//! Parsing of date/time strings bound for `DATE` and `TIMESTAMP` columns.
//!
//! Layouts are tried in order and the first match wins. Values carrying an
//! offset keep their wall-clock time: `2022-09-01T23:00:00-05:00` is stored
//! as `2022-09-01 23:00:00`. Layouts without a date (`3:04PM`) or without a
//! year (`Jan  2 15:04:05`) resolve to year 0.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
enum Layout {
    Rfc3339,
    /// RFC 1123 style, with a numeric offset or one of the RFC 2822 zone names
    Rfc2822,
    /// Format with a numeric offset (`%z`)
    Offset(&'static str),
    Naive(&'static str),
    Date(&'static str),
    /// Time of day only
    Clock(&'static str),
    /// Month, day and time without a year
    NoYear(&'static str),
}

const LAYOUTS: &[Layout] = &[
    Layout::Rfc3339,
    Layout::Naive("%Y-%m-%dT%H:%M:%S%.f"),
    Layout::Naive("%Y-%m-%d %H:%M:%S%.f"),
    Layout::Date("%Y-%m-%d"),
    // 01/02 03:04:05PM '06 -0700
    Layout::Offset("%m/%d %I:%M:%S%p '%y %z"),
    // Mon Jan _2 15:04:05 2006
    Layout::Naive("%a %b %e %H:%M:%S %Y"),
    // Mon Jan 02 15:04:05 -0700 2006
    Layout::Offset("%a %b %d %H:%M:%S %z %Y"),
    // 02 Jan 06 15:04 -0700
    Layout::Offset("%d %b %y %H:%M %z"),
    Layout::Rfc2822,
    // 3:04PM
    Layout::Clock("%I:%M%p"),
    // Jan _2 15:04:05[.000]
    Layout::NoYear("%b %e %H:%M:%S%.f"),
];

impl Layout {
    fn parse(self, value: &str) -> Option<NaiveDateTime> {
        match self {
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local()),
            Layout::Rfc2822 => DateTime::parse_from_rfc2822(value)
                .ok()
                .map(|dt| dt.naive_local()),
            Layout::Offset(fmt) => DateTime::parse_from_str(value, fmt)
                .ok()
                .map(|dt| dt.naive_local()),
            Layout::Naive(fmt) => NaiveDateTime::parse_from_str(value, fmt).ok(),
            Layout::Date(fmt) => NaiveDate::parse_from_str(value, fmt)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN)),
            Layout::Clock(fmt) => {
                let time = NaiveTime::parse_from_str(value, fmt).ok()?;
                Some(NaiveDate::from_ymd_opt(0, 1, 1)?.and_time(time))
            }
            Layout::NoYear(fmt) => {
                NaiveDateTime::parse_from_str(&format!("0000 {value}"), &format!("%Y {fmt}")).ok()
            }
        }
    }
}

/// Parse `value` with the first matching layout.
pub fn parse_time(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(trimmed))
        .ok_or_else(|| Error::InvalidTimeLayout {
            value: value.to_string(),
        })
}
