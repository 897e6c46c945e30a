//! Shared record types for the access-code sync pipeline.
//!
//! Everything here is plain data: no I/O, no remote calls, no config reads.
//! The reconcile engine is the only writer of [`IdempotencyRecord`]s.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// A booking event after normalization. Constructed fresh per event and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub booking_id: String,
    /// Resolved platform property id, when one could be found.
    pub property_id: Option<String>,
    /// Display name as supplied by the event, if any.
    pub property_name: Option<String>,
    pub guest_name: String,
    /// Raw phone value; may be empty. Mask before logging.
    pub guest_phone: String,
    /// Arrival / departure exactly as the source supplied them.
    pub arrival_raw: Option<String>,
    pub departure_raw: Option<String>,
    /// Trimmed, lowercased booking status.
    pub status: String,
    /// Trimmed, lowercased action / event label.
    pub action: String,
}

/// Where a 4-digit code value came from. Diagnostics only; never used
/// for matching decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSource {
    Phone,
    BookingId,
    BookingIdFallback,
    Existing,
    BookingIdFallbackExisting,
}

impl CodeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeSource::Phone => "phone",
            CodeSource::BookingId => "booking_id",
            CodeSource::BookingIdFallback => "booking_id_fallback",
            CodeSource::Existing => "existing",
            CodeSource::BookingIdFallbackExisting => "booking_id_fallback_existing",
        }
    }
}

/// A stay window in the property's local timezone, with the configured
/// check-in / check-out clock times already applied.
///
/// Invariant: `ends_at > starts_at`. Enforced by [`StayWindow::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayWindow {
    pub starts_at: DateTime<FixedOffset>,
    pub ends_at: DateTime<FixedOffset>,
}

impl StayWindow {
    /// Returns `None` when the departure is not strictly after the arrival.
    pub fn new(starts_at: DateTime<FixedOffset>, ends_at: DateTime<FixedOffset>) -> Option<Self> {
        if ends_at > starts_at {
            Some(Self { starts_at, ends_at })
        } else {
            None
        }
    }

    /// Both edges (start against start, end against end) within
    /// `tolerance_minutes` of the other window. Midpoints are never compared.
    pub fn matches(&self, other: &StayWindow, tolerance_minutes: i64) -> bool {
        within_minutes(self.starts_at, other.starts_at, tolerance_minutes)
            && within_minutes(self.ends_at, other.ends_at, tolerance_minutes)
    }
}

/// `|a - b| <= minutes`, comparing instants (offsets are irrelevant).
pub fn within_minutes(
    a: DateTime<FixedOffset>,
    b: DateTime<FixedOffset>,
    minutes: i64,
) -> bool {
    let delta = if a >= b { a - b } else { b - a };
    delta <= Duration::minutes(minutes)
}

/// Parse a timestamp as the lock service renders them: RFC 3339, with a
/// bare `Z` accepted for UTC. Returns `None` for anything else.
pub fn parse_offset_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(trimmed).ok()
}

/// Persisted memory of the last code the engine believes is live for a
/// booking. Best-effort only: it can drift from the remote system, so every
/// consequential decision re-validates against the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub booking_id: String,
    pub property_id: String,
    pub device_id: String,
    /// Remote identifier, once the service reported one.
    pub access_code_id: Option<String>,
    pub code: String,
    pub starts_at: DateTime<FixedOffset>,
    pub ends_at: DateTime<FixedOffset>,
    pub guest_name: String,
    pub code_source: CodeSource,
    pub updated_at: DateTime<Utc>,
    /// Epoch seconds after which the record may be reaped, when a TTL is
    /// configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl IdempotencyRecord {
    pub fn window(&self) -> StayWindow {
        StayWindow {
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        }
    }
}

/// Terminal status of one processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Handled (including "nothing to do" no-ops and skips).
    Accepted,
    /// Input failed validation; no remote call was attempted.
    Rejected,
    /// The lock service failed; re-delivery of the same event may retry.
    RemoteFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub status: ProcessStatus,
    pub message: String,
}

impl ProcessOutcome {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            status: ProcessStatus::Accepted,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: ProcessStatus::Rejected,
            message: message.into(),
        }
    }

    pub fn remote_failure(message: impl Into<String>) -> Self {
        Self {
            status: ProcessStatus::RemoteFailure,
            message: message.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ProcessStatus::Accepted
    }
}

/// Aggregate over a batch. `Accepted` only when every positional result
/// was accepted; one bad item never stops the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Accepted,
    PartialFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    pub results: Vec<ProcessOutcome>,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<ProcessOutcome>) -> Self {
        let status = if results.iter().all(ProcessOutcome::is_accepted) {
            BatchStatus::Accepted
        } else {
            BatchStatus::PartialFailure
        };
        Self { status, results }
    }
}
