//! Timezone-aware stay-window construction.
//!
//! Raw arrival / departure values arrive in whatever shape the booking
//! platform felt like sending: full RFC 3339 timestamps (with `Z` or an
//! offset), zoneless datetimes, or bare calendar dates. Whatever
//! time-of-day the source supplied is discarded: the date is rewritten to
//! the property's configured local check-in / check-out clock time.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use slk_schemas::StayWindow;

/// Errors from window construction. These are validation failures: the
/// caller reports them without touching the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The arrival or departure value was absent or blank.
    MissingDate { field: &'static str },
    /// The value could not be parsed as a timestamp or calendar date.
    InvalidDate { field: &'static str, raw: String },
    /// Departure was not strictly after arrival once the local clock times
    /// were applied.
    InvalidWindow { starts_at: String, ends_at: String },
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowError::MissingDate { field } => {
                write!(f, "missing {field} date")
            }
            WindowError::InvalidDate { field, raw } => {
                write!(f, "invalid {field} date: '{raw}'")
            }
            WindowError::InvalidWindow { starts_at, ends_at } => {
                write!(
                    f,
                    "checkout must be after checkin: starts_at={starts_at} ends_at={ends_at}"
                )
            }
        }
    }
}

impl std::error::Error for WindowError {}

/// Parse a raw arrival/departure value into the property's timezone.
///
/// Accepted shapes, in order:
/// 1. RFC 3339 with `Z` or an explicit offset, converted into `tz`.
/// 2. A zoneless `YYYY-MM-DDTHH:MM[:SS]` datetime, interpreted as local
///    to `tz`.
/// 3. A bare `YYYY-MM-DD` date: midnight local to `tz`.
///
/// DST-ambiguous local times resolve to the earlier offset.
fn parse_local(value: &str, tz: Tz) -> Option<DateTime<Tz>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&tz));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return resolve_local(naive, tz);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return resolve_local(date.and_hms_opt(0, 0, 0)?, tz);
    }

    None
}

fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt),
        chrono::LocalResult::Ambiguous(earlier, _) => Some(earlier),
        // Spring-forward gap: shift into the valid range by taking the
        // instant after the transition.
        chrono::LocalResult::None => {
            tz.from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .earliest()
        }
    }
}

/// Rewrite a parsed value's time-of-day to the configured local clock,
/// seconds zeroed.
fn apply_clock(dt: DateTime<Tz>, clock: NaiveTime, tz: Tz) -> Option<DateTime<Tz>> {
    resolve_local(dt.date_naive().and_time(clock), tz)
}

/// Build the stay window for a booking.
///
/// Both raw values are parsed into `tz`, rewritten to the check-in /
/// check-out clock times, and validated: the departure must be strictly
/// after the arrival.
pub fn build_window(
    arrival_raw: Option<&str>,
    departure_raw: Option<&str>,
    tz: Tz,
    checkin: NaiveTime,
    checkout: NaiveTime,
) -> Result<StayWindow, WindowError> {
    let arrival_raw = non_blank(arrival_raw).ok_or(WindowError::MissingDate { field: "arrival" })?;
    let departure_raw =
        non_blank(departure_raw).ok_or(WindowError::MissingDate { field: "departure" })?;

    let arrival = parse_local(arrival_raw, tz).ok_or_else(|| WindowError::InvalidDate {
        field: "arrival",
        raw: arrival_raw.to_string(),
    })?;
    let departure = parse_local(departure_raw, tz).ok_or_else(|| WindowError::InvalidDate {
        field: "departure",
        raw: departure_raw.to_string(),
    })?;

    let starts_at = apply_clock(arrival, checkin, tz).ok_or_else(|| WindowError::InvalidDate {
        field: "arrival",
        raw: arrival_raw.to_string(),
    })?;
    let ends_at = apply_clock(departure, checkout, tz).ok_or_else(|| WindowError::InvalidDate {
        field: "departure",
        raw: departure_raw.to_string(),
    })?;

    let starts_at = starts_at.fixed_offset();
    let ends_at = ends_at.fixed_offset();

    StayWindow::new(starts_at, ends_at).ok_or_else(|| WindowError::InvalidWindow {
        starts_at: starts_at.to_rfc3339(),
        ends_at: ends_at.to_rfc3339(),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    match value {
        Some(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}
