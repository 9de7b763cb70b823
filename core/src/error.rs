//! The scan error taxonomy.
//!
//! Every way a scan can fail maps to exactly one variant and one
//! human-readable reason string. Expected validation failures are values,
//! never panics; the session surfaces `reason()` in its `Failed` phase and
//! every failure is recoverable via reset.

use crate::store::DocumentStoreError;
use crate::token::TokenFormatError;
use thiserror::Error;

/// Why a scan was rejected or could not be committed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The payload is not a well-formed token. Locally detected, never
    /// retried, and reported before any store access.
    #[error("malformed token")]
    Format(#[from] TokenFormatError),

    /// The token references a registration the store does not have.
    #[error("registration not found")]
    NotFound,

    /// The registration was already scanned in (anti-replay guard).
    #[error("already scanned")]
    Replay,

    /// The presented token does not byte-for-byte match the stored one.
    /// Defends against forged or altered tokens referencing a real id.
    #[error("token mismatch")]
    Mismatch,

    /// Transport or backend failure. Potentially retryable by the caller,
    /// never automatically retried by this core.
    #[error("store failure: {0}")]
    Store(#[from] DocumentStoreError),
}

impl ScanError {
    /// The single human-readable reason shown for a failed scan.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
