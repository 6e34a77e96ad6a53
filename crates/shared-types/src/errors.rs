//! # Error Types
//!
//! Defines error types used across crates.

use thiserror::Error;

/// Errors from decoding chain payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Raw transaction bytes are not a canonical `Transaction`.
    #[error("malformed transaction payload: {0}")]
    Payload(String),

    /// Encoding a transaction failed.
    #[error("failed to encode transaction: {0}")]
    Encoding(String),

    /// A hash string was not 32 bytes of hex.
    #[error("malformed hash: {0}")]
    Hash(String),

    /// A JSON document (genesis, round state) did not match its schema.
    #[error("malformed JSON document: {0}")]
    Json(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}
