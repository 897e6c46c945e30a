//! slk-reconcile
//!
//! The access-code reconciliation engine: for each booking event, decide
//! whether a code must be created, left alone, replaced, or deleted, and
//! drive the gateway / store / notifier to make it so.
//!
//! Architectural decisions:
//! - The per-booking state machine (`absent` / `provisioned` / `stale`)
//!   is explicit and pure: [`plan`] has no I/O and is tested on its own.
//! - Validation failures never reach the gateway.
//! - Gateway failures leave the idempotency record untouched so a
//!   re-delivered event can retry cleanly.
//! - Store failures are logged and swallowed; the engine degrades to
//!   always attempting creation / deletion.
//! - No internal retry beyond the single duplicate/fallback attempt;
//!   correctness under re-delivery comes from idempotency, not locking.

mod cleanup;
mod engine;
mod plan;

pub use engine::{EngineOutcome, ReconcileEngine};
pub use plan::{classify, next_action, CodeState, DesiredCode, PlannedAction};
