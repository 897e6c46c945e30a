//! Inbound event boundary and booking normalization.
//!
//! This crate turns loosely-structured booking-platform payloads into the
//! fixed-shape records the engine consumes:
//!
//! - [`event`] resolves the single-object / array / cleanup-trigger
//!   discrimination exactly once, at the boundary.
//! - [`booking`] applies the ordered per-attribute precedence lists to
//!   produce a canonical [`slk_schemas::Booking`].
//! - [`identity`] derives 4-digit code values from phone numbers and
//!   booking ids.
//! - [`window`] builds timezone-aware stay windows with the configured
//!   local check-in / check-out clock times applied.
//!
//! No network calls, no store access, no config reads.

pub mod booking;
pub mod event;
pub mod identity;
pub mod window;

pub use booking::normalize;
pub use event::{EventError, InboundEvent};
pub use identity::{derive_code, digits_only, last_four, mask_phone};
pub use window::{build_window, WindowError};
