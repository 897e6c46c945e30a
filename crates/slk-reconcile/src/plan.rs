//! Pure transition planning for the per-booking state machine.
//!
//! Deterministic, no I/O, no clock reads: the policy is testable without
//! a gateway or store in sight. The engine feeds in what it believes
//! (the stored record) and what it wants (the desired code) and gets back
//! the action to perform.

use slk_schemas::{IdempotencyRecord, StayWindow};

/// The code the engine wants live for a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredCode {
    pub device_id: String,
    pub code: String,
    pub window: StayWindow,
}

/// Conceptual per-booking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeState {
    /// No record: nothing is believed live.
    Absent,
    /// The stored record matches the desired code within tolerance.
    Provisioned,
    /// A record exists but its device, code, or window differs.
    Stale,
}

/// The side-effecting action the engine must perform next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    /// Already up to date: zero gateway calls.
    Keep,
    /// Delete the previously provisioned code, then create the desired one.
    ReplaceThenCreate,
    /// Create the desired code.
    Create,
}

/// Compare the stored record against the desired code. Device and code
/// value must match exactly; the window edges match within
/// `tolerance_minutes` each.
pub fn classify(
    existing: Option<&IdempotencyRecord>,
    desired: &DesiredCode,
    tolerance_minutes: i64,
) -> CodeState {
    let Some(record) = existing else {
        return CodeState::Absent;
    };

    let window_matches = record
        .window()
        .matches(&desired.window, tolerance_minutes);
    if record.device_id == desired.device_id && record.code == desired.code && window_matches {
        CodeState::Provisioned
    } else {
        CodeState::Stale
    }
}

/// The transition table. Kept separate from [`classify`] so both halves
/// stay trivially testable.
pub fn next_action(state: CodeState) -> PlannedAction {
    match state {
        CodeState::Provisioned => PlannedAction::Keep,
        CodeState::Stale => PlannedAction::ReplaceThenCreate,
        CodeState::Absent => PlannedAction::Create,
    }
}
