//! Day-granularity date helpers. Everything here works on `NaiveDate`; there is
//! no time of day and no timezone past `today()`.

use chrono::{Duration, Local, NaiveDate};

use crate::error::{EngineError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| EngineError::InvalidDate(s.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Adds a signed number of days, saturating at the calendar bounds.
pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    match date.checked_add_signed(Duration::days(days)) {
        Some(d) => d,
        None if days < 0 => NaiveDate::MIN,
        None => NaiveDate::MAX,
    }
}

/// Whole days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// Strict comparison used for every "overdue" decision.
pub fn is_before(date: NaiveDate, other: NaiveDate) -> bool {
    date < other
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
