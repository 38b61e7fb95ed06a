//! Identifier utilities for the visit engine.
//!
//! Ratchet hands out two kinds of identifiers:
//!
//! - **Canonical UUIDs** ([`UuidService`]): 32 lowercase hexadecimal characters, no hyphens.
//!   Visit sessions are keyed by these. Externally supplied identifiers must already be in
//!   canonical form; [`UuidService::parse`] rejects anything else.
//! - **Timestamp UUIDs** ([`TimestampUuid`]): `YYYYMMDDTHHMMSS.mmmZ-<canonical_uuid>`. Every
//!   entry in a session write log carries one. When generated inside the session's write lock
//!   with the previous identifier, they sort in the order the writes were committed.
//!
//! Short human-facing codes such as `ORD-1A2B3C4D` are derived from a canonical UUID with
//! [`UuidService::short_code`].

mod service;

// Re-export public types
pub use service::{TimestampUuid, Uuid, UuidService};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("invalid identifier: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
