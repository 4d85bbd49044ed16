//! # Time
//!
//! Two concerns live here:
//!
//! - [`Clock`], the injectable source of "now" used by the comparator cache
//!   (TTL) and by exception expiry. [`SystemClock`] is the production
//!   implementation; [`ManualClock`] lets tests move time explicitly.
//! - [`parse_document_date`], the lenient parser for dates extracted from
//!   trade documents, which arrive in whatever format the issuing bank used.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;

use crate::error::ValidationError;

/// Source of the current UTC time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Set the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%Y/%m/%d",
];

/// Parse a date as it appears on a trade document.
///
/// Accepts ISO dates (optionally followed by a time component), RFC 3339
/// timestamps, the day-first numeric forms common on credits, spelled-out
/// month forms, and the compact SWIFT forms `YYMMDD` (MT700 field 31D) and
/// `YYYYMMDD`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidDate`] when no format matches.
pub fn parse_document_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ValidationError::InvalidDate(raw.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).date_naive());
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        let parsed = match s.len() {
            6 => NaiveDate::parse_from_str(s, "%y%m%d").ok(),
            8 => NaiveDate::parse_from_str(s, "%Y%m%d").ok(),
            _ => None,
        };
        return parsed.ok_or_else(|| ValidationError::InvalidDate(raw.to_string()));
    }

    // "2024-03-15T00:00:00" without an offset.
    if s.len() > 10 && s.as_bytes().get(10) == Some(&b'T') {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Ok(d);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| ValidationError::InvalidDate(raw.to_string()))
}
