//! Typed error taxonomy for the coordinator core.
//!
//! Store and coordinator operations return these as values; the web layer
//! maps them onto response codes and the live channel mirrors them as
//! `ok: false` result messages. Nothing in the core panics across the
//! transport boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Item or cut absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not valid for the item's current lifecycle state,
    /// e.g. cutting an item that is already in flight.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Acknowledgment presented a token that does not match the open cut.
    /// Stale or forged acks are rejected, never retried.
    #[error("cut token mismatch")]
    TokenMismatch,

    /// Missing or malformed request field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Blob copy/move/delete failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata encode/decode failure.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
