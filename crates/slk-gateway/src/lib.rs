//! Access-control gateway: the only module that talks to the remote lock
//! service.
//!
//! Responsibilities:
//! - issue paginated list, create, and delete calls over HTTP,
//! - normalize the service's inconsistent response shapes,
//! - classify outcomes (created / duplicate / already-gone / error),
//! - locate codes by value + window tolerance.
//!
//! The gateway never persists state; the idempotency store belongs to the
//! engine. Callers must treat a short or empty listing as "search was
//! inconclusive", never as "no codes exist".

mod gateway;
mod matching;
mod transport;
mod types;

pub use gateway::{AccessBackend, HttpAccessGateway};
pub use matching::{find_matching, passes_type_filters};
pub use transport::{HttpLockTransport, HttpReply, LockTransport, TransportError};
pub use types::{CreateCodeRequest, CreateOutcome, DeleteOutcome, RemoteCode};
