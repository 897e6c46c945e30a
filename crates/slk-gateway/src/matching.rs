//! Pure matching helpers over listed codes. No I/O; the gateway's
//! `find_matching` and the engine's cancellation / sweep filters are built
//! on these.

use slk_schemas::{parse_offset_timestamp, within_minutes, StayWindow};

use crate::types::RemoteCode;

/// First entry whose code value matches exactly and whose start and end
/// each fall within `tolerance_minutes` of the desired window's edges,
/// both edges independently, never the midpoint. Entries with unparsable
/// timestamps are skipped.
pub fn find_matching<'a>(
    codes: &'a [RemoteCode],
    code: &str,
    window: &StayWindow,
    tolerance_minutes: i64,
) -> Option<&'a RemoteCode> {
    codes.iter().find(|entry| {
        if entry.code != code {
            return false;
        }
        let starts = entry.starts_at.as_deref().and_then(parse_offset_timestamp);
        let ends = entry.ends_at.as_deref().and_then(parse_offset_timestamp);
        match (starts, ends) {
            (Some(s), Some(e)) => {
                within_minutes(s, window.starts_at, tolerance_minutes)
                    && within_minutes(e, window.ends_at, tolerance_minutes)
            }
            _ => false,
        }
    })
}

/// Managed / time-bound classification filters.
///
/// A code explicitly flagged `is_managed == false` fails the managed-only
/// filter; an absent flag passes. The time-bound filter admits codes whose
/// `type` is `"time_bound"` or absent.
pub fn passes_type_filters(code: &RemoteCode, only_managed: bool, only_timebound: bool) -> bool {
    if only_managed && code.is_managed == Some(false) {
        return false;
    }
    if only_timebound {
        if let Some(kind) = &code.kind {
            if kind != "time_bound" {
                return false;
            }
        }
    }
    true
}
